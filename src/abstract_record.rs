//! Abstract: a polymorphic record type selectable by discriminator.
//!
//! An abstract type names an open set of concrete record descendants. The
//! input selects one of them through the `TYPE` discriminator key, and the
//! chosen record's schema validates the remaining fields. Descendants
//! register themselves against the abstract's registry entry when they
//! close, possibly before or after the abstract itself closes; the
//! `lazy_finish` pass validates the resulting graph.

use crate::node::{AttributeMap, SchemaNode, TypeKind, TypeRef};
use crate::record::{push_key, push_key_unchecked, DefaultValue, Key};
use crate::registry::Registry;
use crate::scalar::StringType;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Name of the discriminator key selecting the concrete descendant.
pub const DISCRIMINATOR_KEY: &str = "TYPE";

/// Frozen payload of a closed abstract type.
#[derive(Debug, Clone)]
pub struct AbstractData {
    name: String,
    description: String,
    keys: Vec<Key>,
    key_to_index: HashMap<String, usize>,
}

impl AbstractData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Shared keys every descendant inherits, discriminator included.
    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter()
    }

    /// Rebuild with a replacement key sequence (generic substitution).
    pub(crate) fn with_keys(&self, keys: Vec<Key>) -> Self {
        let key_to_index = keys.iter().map(|k| (k.name.clone(), k.index)).collect();
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            keys,
            key_to_index,
        }
    }
}

/// Open builder for an abstract type.
#[derive(Debug, Clone)]
pub struct Abstract {
    data: AbstractData,
    attributes: AttributeMap,
    closed: Option<Arc<SchemaNode>>,
}

impl Abstract {
    /// A new abstract type; the obligatory `TYPE` discriminator key is
    /// declared implicitly.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let mut data = AbstractData {
            name: name.into(),
            description: description.into(),
            keys: Vec::new(),
            key_to_index: HashMap::new(),
        };
        let owner = data.name.clone();
        push_key_unchecked(
            &owner,
            &mut data.keys,
            &mut data.key_to_index,
            DISCRIMINATOR_KEY,
            StringType::new().into(),
            DefaultValue::Obligatory,
            "Discriminator naming the concrete descendant type.",
        );
        Self {
            data,
            attributes: AttributeMap::new(),
            closed: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Declare a key shared by every descendant.
    pub fn declare_key(
        mut self,
        name: &str,
        type_ref: impl Into<TypeRef>,
        default: DefaultValue,
        description: &str,
    ) -> Self {
        self.assert_open("declare_key");
        let owner = self.data.name.clone();
        push_key(
            &owner,
            &mut self.data.keys,
            &mut self.data.key_to_index,
            name,
            type_ref.into(),
            default,
            description,
        );
        self
    }

    /// Attach an introspection attribute (value must be valid JSON text).
    pub fn add_attribute(mut self, name: &str, json: &str) -> Self {
        self.assert_open("add_attribute");
        self.attributes.add(name, json);
        self
    }

    /// Close the abstract type and register it by name. The descendant set
    /// stays open: records deriving from this type keep registering until
    /// `lazy_finish` runs. Idempotent.
    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        if let Some(node) = &self.closed {
            return node.clone();
        }

        let mut attributes = self.attributes.clone();
        attributes.add("input_type", "\"Abstract\"");
        attributes.add("name", &json!(self.data.name).to_string());
        attributes.add("description", &json!(self.data.description).to_string());

        let node =
            registry.add_abstract(SchemaNode::closed(TypeKind::Abstract(self.data.clone()), attributes));
        self.closed = Some(node.clone());
        node
    }

    fn assert_open(&self, operation: &str) {
        assert!(
            self.closed.is_none(),
            "{} on closed abstract type '{}'",
            operation,
            self.data.name
        );
    }
}
