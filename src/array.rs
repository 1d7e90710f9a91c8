//! Array: a homogeneous sequence type with size bounds.

use crate::node::{AttributeMap, SchemaNode, TypeKind, TypeRef};
use crate::registry::Registry;
use serde_json::json;
use std::sync::Arc;

/// Frozen payload of a closed array type.
#[derive(Debug, Clone)]
pub struct ArrayData {
    pub min_size: usize,
    pub max_size: usize,
    pub element: TypeRef,
}

impl ArrayData {
    /// Size bound check.
    pub fn match_size(&self, size: usize) -> bool {
        size >= self.min_size && size <= self.max_size
    }
}

/// Open builder for an array type.
///
/// The element type must already be closed when the array is constructed;
/// the two exceptions are a [`Parameter`](crate::generic::Parameter)
/// placeholder, which makes the array generic, and a deferred abstract
/// handle, which resolves at `lazy_finish`.
#[derive(Debug, Clone)]
pub struct Array {
    data: ArrayData,
    attributes: AttributeMap,
    closed: Option<Arc<SchemaNode>>,
}

impl Array {
    /// Array with `min_size ..= max_size` elements; panics unless
    /// `min_size <= max_size`.
    pub fn new(element: impl Into<TypeRef>, min_size: usize, max_size: usize) -> Self {
        assert!(
            min_size <= max_size,
            "wrong size limits for array: min {min_size}, max {max_size}"
        );
        Self {
            data: ArrayData {
                min_size,
                max_size,
                element: element.into(),
            },
            attributes: AttributeMap::new(),
            closed: None,
        }
    }

    /// Array of any length.
    pub fn any(element: impl Into<TypeRef>) -> Self {
        Self::new(element, 0, usize::MAX)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Attach an introspection attribute (value must be valid JSON text).
    pub fn add_attribute(mut self, name: &str, json: &str) -> Self {
        assert!(
            self.closed.is_none(),
            "attribute '{}' added to closed array",
            name
        );
        self.attributes.add(name, json);
        self
    }

    /// Close the array. Arrays are identified purely by content, so they
    /// are not kept in a registry repository, but a deferred element
    /// reference is recorded for the resolution pass.
    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        if let Some(node) = &self.closed {
            return node.clone();
        }

        let mut attributes = self.attributes.clone();
        attributes.add("input_type", "\"Array\"");
        attributes.add(
            "range",
            &json!([self.data.min_size, self.data.max_size]).to_string(),
        );

        let node = SchemaNode::closed(TypeKind::Array(self.data.clone()), attributes);
        if let TypeRef::Deferred(name) = &self.data.element {
            registry.note_deferred(name, &node.type_name());
        }
        self.closed = Some(node.clone());
        node
    }
}
