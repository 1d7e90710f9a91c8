//! Record and Tuple: keyed heterogeneous schema types.
//!
//! A record is an ordered sequence of named, typed keys, each with a
//! default specification. A tuple is a positional record: the same key
//! sequence, read by index from a sequence node instead of by name from a
//! map node. Records may derive from an abstract type, inheriting its keys
//! and registering themselves as a selectable descendant.

use crate::error::SchemaError;
use crate::hash::HashBuilder;
use crate::node::{is_valid_identifier, AttributeMap, SchemaNode, TypeKind, TypeRef};
use crate::registry::Registry;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Default specification of a record key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// The input must provide a value.
    Obligatory,
    /// The key may be absent with no substitute.
    Optional,
    /// Textual default fixed at declaration, validated against the key type.
    Declaration(String),
    /// Value supplied by the reader at access time; the payload documents
    /// where it comes from.
    ReadTime(String),
}

impl DefaultValue {
    pub fn is_obligatory(&self) -> bool {
        matches!(self, Self::Obligatory)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional)
    }

    pub fn has_value_at_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }

    pub fn has_value_at_read_time(&self) -> bool {
        matches!(self, Self::ReadTime(_))
    }

    pub(crate) fn hash_into(&self, builder: &mut HashBuilder) {
        match self {
            Self::Obligatory => builder.text("obligatory"),
            Self::Optional => builder.text("optional"),
            Self::Declaration(value) => {
                builder.text("declaration");
                builder.text(value);
            }
            Self::ReadTime(source) => {
                builder.text("read_time");
                builder.text(source);
            }
        }
    }
}

/// One declared key of a record, tuple or abstract type.
#[derive(Debug, Clone)]
pub struct Key {
    pub index: usize,
    pub name: String,
    pub type_ref: TypeRef,
    pub default: DefaultValue,
    pub description: String,
}

/// Append a key declaration, enforcing the shared contract: valid
/// identifier, unique name. `TYPE` is reserved for the abstract
/// discriminator and inserted internally, bypassing the identifier rule.
pub(crate) fn push_key(
    owner: &str,
    keys: &mut Vec<Key>,
    key_to_index: &mut HashMap<String, usize>,
    name: &str,
    type_ref: TypeRef,
    default: DefaultValue,
    description: &str,
) {
    assert!(
        is_valid_identifier(name),
        "key name '{}' in type '{}' is not a valid identifier (lowercase, digits, underscores)",
        name,
        owner
    );
    push_key_unchecked(owner, keys, key_to_index, name, type_ref, default, description);
}

pub(crate) fn push_key_unchecked(
    owner: &str,
    keys: &mut Vec<Key>,
    key_to_index: &mut HashMap<String, usize>,
    name: &str,
    type_ref: TypeRef,
    default: DefaultValue,
    description: &str,
) {
    assert!(
        !key_to_index.contains_key(name),
        "key '{}' already declared in type '{}'",
        name,
        owner
    );
    let index = keys.len();
    key_to_index.insert(name.to_string(), index);
    keys.push(Key {
        index,
        name: name.to_string(),
        type_ref,
        default,
        description: description.to_string(),
    });
}

/// Frozen payload of a closed record or tuple type.
#[derive(Debug, Clone)]
pub struct RecordData {
    name: String,
    description: String,
    keys: Vec<Key>,
    key_to_index: HashMap<String, usize>,
    parent: Option<String>,
    auto_conversion_key: Option<String>,
}

impl RecordData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name of the abstract type this record derives from, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Key that non-map input is wrapped into, if auto conversion is on.
    pub fn auto_conversion_key(&self) -> Option<&str> {
        self.auto_conversion_key.as_deref()
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

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
            parent: self.parent.clone(),
            auto_conversion_key: self.auto_conversion_key.clone(),
        }
    }

    /// Resolve a key by name; absence is a distinct error from any type
    /// mismatch discovered later.
    pub fn key(&self, name: &str) -> crate::error::Result<&Key> {
        self.key_to_index
            .get(name)
            .map(|idx| &self.keys[*idx])
            .ok_or_else(|| SchemaError::KeyNotFound {
                key: name.to_string(),
                record: self.name.clone(),
            })
    }
}

/// Open builder for a record type.
#[derive(Debug, Clone)]
pub struct Record {
    data: RecordData,
    attributes: AttributeMap,
    closed: Option<Arc<SchemaNode>>,
}

impl Record {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            data: RecordData {
                name: name.into(),
                description: description.into(),
                keys: Vec::new(),
                key_to_index: HashMap::new(),
                parent: None,
                auto_conversion_key: None,
            },
            attributes: AttributeMap::new(),
            closed: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Declare a key. Panics on a closed receiver, a duplicate name, or an
    /// invalid identifier.
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

    /// Inherit the key declarations of a closed abstract type and become
    /// one of its selectable descendants.
    pub fn derive_from(mut self, parent: &Arc<SchemaNode>) -> Self {
        self.assert_open("derive_from");
        let abstract_data = parent.as_abstract().unwrap_or_else(|| {
            panic!(
                "record '{}' can only derive from an abstract type, got {}",
                self.data.name,
                parent.kind().kind_name()
            )
        });
        let owner = self.data.name.clone();
        for key in abstract_data.keys() {
            push_key_unchecked(
                &owner,
                &mut self.data.keys,
                &mut self.data.key_to_index,
                &key.name,
                key.type_ref.clone(),
                key.default.clone(),
                &key.description,
            );
        }
        self.data.parent = Some(abstract_data.name().to_string());
        self
    }

    /// Let a bare scalar (or other non-map) input stand in for the whole
    /// record by wrapping it into the named key. All other keys must then
    /// have a default or be optional; checked at close.
    pub fn allow_auto_conversion(mut self, key: &str) -> Self {
        self.assert_open("allow_auto_conversion");
        self.data.auto_conversion_key = Some(key.to_string());
        self
    }

    /// Attach an introspection attribute (value must be valid JSON text).
    pub fn add_attribute(mut self, name: &str, json: &str) -> Self {
        self.assert_open("add_attribute");
        self.attributes.add(name, json);
        self
    }

    /// Close the record: validate declaration defaults and the auto
    /// conversion contract, register by content hash, record pending
    /// forward references and descendant edges. Idempotent.
    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        self.close_impl(registry, false)
    }

    fn assert_open(&self, operation: &str) {
        assert!(
            self.closed.is_none(),
            "{} on closed record '{}'",
            operation,
            self.data.name
        );
    }

    fn close_impl(&mut self, registry: &Registry, tuple: bool) -> Arc<SchemaNode> {
        if let Some(node) = &self.closed {
            return node.clone();
        }

        self.validate_declaration_defaults();
        self.validate_auto_conversion();
        if tuple {
            self.validate_tuple_ordering();
        }

        let mut attributes = self.attributes.clone();
        let input_type = if tuple { "Tuple" } else { "Record" };
        attributes.add("input_type", &json!(input_type).to_string());
        attributes.add("name", &json!(self.data.name).to_string());
        attributes.add("description", &json!(self.data.description).to_string());
        if let Some(parent) = &self.data.parent {
            attributes.add("parent", &json!(parent).to_string());
        }

        let kind = if tuple {
            TypeKind::Tuple(self.data.clone())
        } else {
            TypeKind::Record(self.data.clone())
        };
        let node = registry.add_record(SchemaNode::closed(kind, attributes));

        for key in &self.data.keys {
            if let TypeRef::Deferred(name) = &key.type_ref {
                registry.note_deferred(name, &self.data.name);
            }
        }
        if let Some(parent) = &self.data.parent {
            registry.add_descendant(parent, node.clone());
        }

        self.closed = Some(node.clone());
        node
    }

    fn validate_declaration_defaults(&self) {
        for key in &self.data.keys {
            if let (DefaultValue::Declaration(raw), TypeRef::Closed(ty)) =
                (&key.default, &key.type_ref)
            {
                if let Err(err) = ty.validate_default(raw) {
                    panic!(
                        "invalid default for key '{}' of record '{}': {}",
                        key.name, self.data.name, err
                    );
                }
            }
        }
    }

    fn validate_auto_conversion(&self) {
        let Some(auto_key) = &self.data.auto_conversion_key else {
            return;
        };
        assert!(
            self.data.key_to_index.contains_key(auto_key),
            "auto conversion key '{}' is not declared in record '{}'",
            auto_key,
            self.data.name
        );
        for key in &self.data.keys {
            assert!(
                &key.name == auto_key || !key.default.is_obligatory(),
                "record '{}' allows auto conversion through '{}', so key '{}' cannot be obligatory",
                self.data.name,
                auto_key,
                key.name
            );
        }
    }

    fn validate_tuple_ordering(&self) {
        let mut seen_non_obligatory = false;
        for key in &self.data.keys {
            if key.default.is_obligatory() {
                assert!(
                    !seen_non_obligatory,
                    "obligatory key '{}' of tuple '{}' follows a non-obligatory key",
                    key.name, self.data.name
                );
            } else {
                seen_non_obligatory = true;
            }
        }
    }
}

/// Open builder for a tuple type: a record read positionally from a
/// sequence node. Obligatory keys must precede optional ones.
#[derive(Debug, Clone)]
pub struct Tuple {
    inner: Record,
}

impl Tuple {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            inner: Record::new(name, description),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn declare_key(
        mut self,
        name: &str,
        type_ref: impl Into<TypeRef>,
        default: DefaultValue,
        description: &str,
    ) -> Self {
        self.inner = self.inner.declare_key(name, type_ref, default, description);
        self
    }

    pub fn add_attribute(mut self, name: &str, json: &str) -> Self {
        self.inner = self.inner.add_attribute(name, json);
        self
    }

    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        self.inner.close_impl(registry, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{IntegerType, StringType};

    #[test]
    fn test_key_lookup() {
        let registry = Registry::new();
        let node = Record::new("Solver", "")
            .declare_key("tolerance", IntegerType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let rec = node.as_record().unwrap();
        assert_eq!(rec.key("tolerance").unwrap().index, 0);
        assert!(matches!(
            rec.key("missing"),
            Err(SchemaError::KeyNotFound { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "already declared")]
    fn test_duplicate_key_panics() {
        let _ = Record::new("R", "")
            .declare_key("x", IntegerType::new(), DefaultValue::Obligatory, "")
            .declare_key("x", StringType::new(), DefaultValue::Obligatory, "");
    }

    #[test]
    #[should_panic(expected = "not a valid identifier")]
    fn test_invalid_key_name_panics() {
        let _ = Record::new("R", "").declare_key(
            "BadKey",
            IntegerType::new(),
            DefaultValue::Obligatory,
            "",
        );
    }

    #[test]
    #[should_panic(expected = "declare_key on closed record")]
    fn test_declare_after_close_panics() {
        let registry = Registry::new();
        let mut rec = Record::new("R", "");
        rec.close(&registry);
        let _ = rec.declare_key("x", IntegerType::new(), DefaultValue::Obligatory, "");
    }

    #[test]
    #[should_panic(expected = "invalid default")]
    fn test_bad_declaration_default_panics() {
        let registry = Registry::new();
        let mut rec = Record::new("R", "").declare_key(
            "x",
            IntegerType::bounded(0, 10),
            DefaultValue::Declaration("99".to_string()),
            "",
        );
        rec.close(&registry);
    }

    #[test]
    fn test_structural_hash_equality() {
        let registry = Registry::new();
        let build = || {
            Record::new("Mesh", "mesh input")
                .declare_key("file", StringType::new(), DefaultValue::Obligatory, "path")
                .declare_key(
                    "regions",
                    IntegerType::new(),
                    DefaultValue::Declaration("1".to_string()),
                    "",
                )
        };
        let a = build().close(&registry);
        let b = build().close(&registry);
        assert_eq!(a.content_hash(), b.content_hash());
        // Structural dedup: one canonical instance.
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_hash_changes_with_key_order_type_and_attributes() {
        let registry = Registry::new();
        let base = Record::new("R", "")
            .declare_key("a", IntegerType::new(), DefaultValue::Obligatory, "")
            .declare_key("b", StringType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let reordered = Record::new("R", "")
            .declare_key("b", StringType::new(), DefaultValue::Obligatory, "")
            .declare_key("a", IntegerType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let retyped = Record::new("R", "")
            .declare_key("a", IntegerType::bounded(0, 1), DefaultValue::Obligatory, "")
            .declare_key("b", StringType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let attributed = Record::new("R", "")
            .declare_key("a", IntegerType::new(), DefaultValue::Obligatory, "")
            .declare_key("b", StringType::new(), DefaultValue::Obligatory, "")
            .add_attribute("unit", "\"m\"")
            .close(&registry);
        assert_ne!(base.content_hash(), reordered.content_hash());
        assert_ne!(base.content_hash(), retyped.content_hash());
        assert_ne!(base.content_hash(), attributed.content_hash());
    }

    #[test]
    fn test_close_is_idempotent() {
        let registry = Registry::new();
        let mut rec =
            Record::new("R", "").declare_key("x", IntegerType::new(), DefaultValue::Obligatory, "");
        let first = rec.close(&registry);
        let second = rec.close(&registry);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    #[should_panic(expected = "cannot be obligatory")]
    fn test_auto_conversion_needs_defaults_elsewhere() {
        let registry = Registry::new();
        let mut rec = Record::new("R", "")
            .declare_key("value", IntegerType::new(), DefaultValue::Obligatory, "")
            .declare_key("extra", StringType::new(), DefaultValue::Obligatory, "")
            .allow_auto_conversion("value");
        rec.close(&registry);
    }

    #[test]
    #[should_panic(expected = "follows a non-obligatory key")]
    fn test_tuple_ordering_enforced() {
        let registry = Registry::new();
        let mut tup = Tuple::new("T", "")
            .declare_key("a", IntegerType::new(), DefaultValue::Optional, "")
            .declare_key("b", IntegerType::new(), DefaultValue::Obligatory, "");
        tup.close(&registry);
    }

    #[test]
    fn test_record_and_tuple_hash_differ() {
        let registry = Registry::new();
        let rec = Record::new("Point", "")
            .declare_key("x", IntegerType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let tup = Tuple::new("Point", "")
            .declare_key("x", IntegerType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        assert_ne!(rec.content_hash(), tup.content_hash());
    }
}
