//! Generic schema templates: Parameter placeholders and their Instance
//! substitution.
//!
//! A schema author builds a template containing [`Parameter`] placeholders,
//! then produces concrete types from it by closing an [`Instance`] with a
//! binding for every reachable parameter. The substituted copy records the
//! binding map in `attributes["parameters"]` and the template's hash in
//! `attributes["generic_type"]`, so its content hash differs from both the
//! template's and any other binding's.

use crate::array::ArrayData;
use crate::hash::TypeHash;
use crate::node::{SchemaNode, TypeKind, TypeRef};
use crate::registry::Registry;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Typed placeholder carrying only a symbolic name. Trivially closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Open builder binding a generic template to concrete parameter types.
#[derive(Debug, Clone)]
pub struct Instance {
    template: Arc<SchemaNode>,
    bindings: Vec<(String, Arc<SchemaNode>)>,
    closed: Option<Arc<SchemaNode>>,
}

impl Instance {
    pub fn new(template: &Arc<SchemaNode>) -> Self {
        Self {
            template: template.clone(),
            bindings: Vec::new(),
            closed: None,
        }
    }

    /// Bind a parameter name to a concrete closed type.
    pub fn bind(mut self, name: impl Into<String>, concrete: impl Into<TypeRef>) -> Self {
        assert!(self.closed.is_none(), "bind on closed instance");
        let name = name.into();
        let concrete = match concrete.into() {
            TypeRef::Closed(node) => node,
            TypeRef::Deferred(deferred) => panic!(
                "parameter '{}' cannot be bound to deferred type '{}'",
                name, deferred
            ),
        };
        self.bindings.push((name, concrete));
        self
    }

    /// Close the instance: substitute every reachable parameter, stamp the
    /// substitution map into the attributes and register the concrete
    /// copy. A reachable parameter without a binding panics. Idempotent.
    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        if let Some(node) = &self.closed {
            return node.clone();
        }

        let mut used: BTreeMap<String, TypeHash> = BTreeMap::new();
        let substituted = substitute(&self.template, &self.bindings, &mut used);

        let parameters: Vec<_> = used
            .iter()
            .map(|(name, hash)| json!({ name: hash.as_str() }))
            .collect();
        let node = SchemaNode::with_attributes(
            &substituted,
            [
                ("parameters".to_string(), json!(parameters).to_string()),
                (
                    "generic_type".to_string(),
                    json!(self.template.content_hash().as_str()).to_string(),
                ),
            ],
        );

        // Substituted abstracts are not re-registered by name: the template
        // already owns the name entry and descendant dispatch goes through it.
        let node = match node.kind() {
            TypeKind::Record(_) | TypeKind::Tuple(_) => registry.add_record(node),
            TypeKind::Selection(_) => registry.add_selection(node),
            _ => node,
        };
        self.closed = Some(node.clone());
        node
    }
}

/// Replace every reachable `Parameter` with its binding, rebuilding the
/// composite nodes along the path. Non-generic subtrees are shared as-is.
fn substitute(
    node: &Arc<SchemaNode>,
    bindings: &[(String, Arc<SchemaNode>)],
    used: &mut BTreeMap<String, TypeHash>,
) -> Arc<SchemaNode> {
    if !node.is_generic() {
        return node.clone();
    }

    match node.kind() {
        TypeKind::Parameter(parameter) => {
            let bound = bindings
                .iter()
                .find(|(name, _)| name == &parameter.name)
                .map(|(_, concrete)| concrete)
                .unwrap_or_else(|| {
                    panic!(
                        "no binding for parameter '{}' while instantiating a generic type",
                        parameter.name
                    )
                });
            used.insert(parameter.name.clone(), bound.content_hash().clone());
            bound.clone()
        }
        TypeKind::Array(array) => {
            let element = substitute_ref(&array.element, bindings, used);
            SchemaNode::closed(
                TypeKind::Array(ArrayData {
                    min_size: array.min_size,
                    max_size: array.max_size,
                    element,
                }),
                node.attributes().clone(),
            )
        }
        TypeKind::Record(record) | TypeKind::Tuple(record) => {
            let keys = record
                .keys()
                .map(|key| {
                    let mut key = key.clone();
                    key.type_ref = substitute_ref(&key.type_ref, bindings, used);
                    key
                })
                .collect();
            let data = record.with_keys(keys);
            let kind = if matches!(node.kind(), TypeKind::Tuple(_)) {
                TypeKind::Tuple(data)
            } else {
                TypeKind::Record(data)
            };
            SchemaNode::closed(kind, node.attributes().clone())
        }
        TypeKind::Abstract(abstract_data) => {
            let keys = abstract_data
                .keys()
                .map(|key| {
                    let mut key = key.clone();
                    key.type_ref = substitute_ref(&key.type_ref, bindings, used);
                    key
                })
                .collect();
            SchemaNode::closed(
                TypeKind::Abstract(abstract_data.with_keys(keys)),
                node.attributes().clone(),
            )
        }
        // is_generic() is false for every other kind
        _ => node.clone(),
    }
}

fn substitute_ref(
    type_ref: &TypeRef,
    bindings: &[(String, Arc<SchemaNode>)],
    used: &mut BTreeMap<String, TypeHash>,
) -> TypeRef {
    match type_ref {
        TypeRef::Closed(child) => TypeRef::Closed(substitute(child, bindings, used)),
        TypeRef::Deferred(_) => type_ref.clone(),
    }
}
