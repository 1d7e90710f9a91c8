//! Selection: an enumerated scalar type mapping symbolic keys to integers.
//!
//! The open [`Selection`] builder accumulates `(value, key, description)`
//! entries; both the key set and the value set must stay collision-free.
//! Colliding insertions are reported and skipped so the remaining
//! declarations can run and the conflict surfaces in the logs. Closing
//! freezes the table, publishes it through `attributes["values"]` and
//! registers the type by content hash.

use crate::error::{Result, SchemaError};
use crate::node::{AttributeMap, SchemaNode, TypeKind};
use crate::registry::Registry;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One entry of a selection's symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionKey {
    pub index: usize,
    pub key: String,
    pub description: String,
    pub value: i64,
}

/// Frozen symbol table of a closed selection.
#[derive(Debug, Clone)]
pub struct SelectionData {
    name: String,
    description: String,
    keys: Vec<SelectionKey>,
    key_to_index: HashMap<String, usize>,
    value_to_index: BTreeMap<i64, usize>,
}

impl SelectionData {
    fn new(name: String, description: String) -> Self {
        Self {
            name,
            description,
            keys: Vec::new(),
            key_to_index: HashMap::new(),
            value_to_index: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SelectionKey> {
        self.keys.iter()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.key_to_index.contains_key(key)
    }

    /// Look a symbolic key up, returning its integer value.
    pub fn name_to_int(&self, key: &str) -> Result<i64> {
        self.key_to_index
            .get(key)
            .map(|idx| self.keys[*idx].value)
            .ok_or_else(|| SchemaError::SelectionKeyNotFound {
                key: key.to_string(),
                selection: self.name.clone(),
                known: self.key_list(),
            })
    }

    /// Look an integer value up, returning its symbolic key.
    pub fn int_to_name(&self, value: i64) -> Result<&str> {
        self.value_to_index
            .get(&value)
            .map(|idx| self.keys[*idx].key.as_str())
            .ok_or_else(|| SchemaError::SelectionValueNotFound {
                value,
                selection: self.name.clone(),
            })
    }

    /// Parse a textual default value, which must name a declared key.
    pub fn from_default(&self, raw: &str) -> Result<i64> {
        self.name_to_int(raw)
            .map_err(|_| SchemaError::WrongDefault {
                value: raw.to_string(),
                type_name: format!("{} with values: {}", self.name, self.key_list()),
            })
    }

    /// Space-separated list of quoted keys, for diagnostics.
    pub fn key_list(&self) -> String {
        self.keys
            .iter()
            .map(|k| format!("'{}'", k.key))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Insert an entry; collisions are reported and the insertion skipped.
    fn add_value(&mut self, value: i64, key: &str, description: &str) {
        if let Some(idx) = self.key_to_index.get(key) {
            tracing::error!(
                selection = %self.name,
                key,
                previous_value = self.keys[*idx].value,
                "key already exists in selection, insertion skipped"
            );
            return;
        }
        if let Some(idx) = self.value_to_index.get(&value) {
            tracing::error!(
                selection = %self.name,
                value,
                new_key = key,
                previous_key = %self.keys[*idx].key,
                "value of new key conflicts with value of previous key, insertion skipped"
            );
            return;
        }

        let index = self.keys.len();
        self.key_to_index.insert(key.to_string(), index);
        self.value_to_index.insert(value, index);
        self.keys.push(SelectionKey {
            index,
            key: key.to_string(),
            description: description.to_string(),
            value,
        });
    }
}

/// Open builder for a selection type.
#[derive(Debug, Clone)]
pub struct Selection {
    data: SelectionData,
    attributes: AttributeMap,
    closed: Option<Arc<SchemaNode>>,
}

impl Selection {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            data: SelectionData::new(name.into(), description.into()),
            attributes: AttributeMap::new(),
            closed: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    /// Declare one `(value, key, description)` entry.
    ///
    /// Key and value collisions are reported and skipped; the first
    /// insertion stays authoritative. Declaring on a closed selection is a
    /// contract violation and panics.
    pub fn add_value(mut self, value: i64, key: &str, description: &str) -> Self {
        assert!(
            self.closed.is_none(),
            "declaration of new key '{}' in closed selection '{}'",
            key,
            self.data.name
        );
        self.data.add_value(value, key, description);
        self
    }

    /// Merge the entries of another, already closed selection.
    ///
    /// An imported value that collides with an existing one is shifted to
    /// the next free integer instead of being rejected, unlike
    /// [`add_value`](Self::add_value).
    pub fn copy_values(mut self, other: &SelectionData) -> Self {
        assert!(
            self.closed.is_none(),
            "copy_values into closed selection '{}'",
            self.data.name
        );
        for entry in other.keys() {
            let mut value = entry.value;
            while self.data.value_to_index.contains_key(&value) {
                value += 1;
            }
            self.data.add_value(value, &entry.key, &entry.description);
        }
        self
    }

    /// Attach an introspection attribute (value must be valid JSON text).
    pub fn add_attribute(mut self, name: &str, json: &str) -> Self {
        assert!(
            self.closed.is_none(),
            "attribute '{}' added to closed selection '{}'",
            name,
            self.data.name
        );
        self.attributes.add(name, json);
        self
    }

    /// Close the selection: freeze the table, publish the introspection
    /// attributes, register by content hash. Idempotent; a second call
    /// returns the identical registered instance.
    pub fn close(&mut self, registry: &Registry) -> Arc<SchemaNode> {
        if let Some(node) = &self.closed {
            return node.clone();
        }

        let mut attributes = self.attributes.clone();
        attributes.add("input_type", "\"Selection\"");
        attributes.add("name", &json!(self.data.name).to_string());
        attributes.add("description", &json!(self.data.description).to_string());
        let values: Vec<_> = self
            .data
            .keys()
            .map(|k| {
                json!({
                    "name": k.key,
                    "description": k.description,
                    "value": k.value,
                })
            })
            .collect();
        attributes.add("values", &json!(values).to_string());

        let node = SchemaNode::closed(TypeKind::Selection(self.data.clone()), attributes);
        let node = registry.add_selection(node);
        self.closed = Some(node.clone());
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb() -> Selection {
        Selection::new("Color", "test colors")
            .add_value(0, "red", "")
            .add_value(1, "green", "")
            .add_value(2, "blue", "")
    }

    #[test]
    fn test_lookups_are_bijective() {
        let registry = Registry::new();
        let node = rgb().close(&registry);
        let sel = node.as_selection().unwrap();
        assert_eq!(sel.name_to_int("green").unwrap(), 1);
        assert_eq!(sel.int_to_name(2).unwrap(), "blue");
        assert!(matches!(
            sel.name_to_int("cyan"),
            Err(SchemaError::SelectionKeyNotFound { .. })
        ));
        assert!(matches!(
            sel.int_to_name(9),
            Err(SchemaError::SelectionValueNotFound { .. })
        ));
    }

    #[test]
    fn test_value_collision_keeps_first() {
        let registry = Registry::new();
        let node = Selection::new("S", "")
            .add_value(0, "a", "first")
            .add_value(0, "b", "colliding value")
            .close(&registry);
        let sel = node.as_selection().unwrap();
        assert_eq!(sel.size(), 1);
        assert_eq!(sel.int_to_name(0).unwrap(), "a");
        assert!(!sel.has_key("b"));
    }

    #[test]
    fn test_key_collision_keeps_first() {
        let registry = Registry::new();
        let node = Selection::new("S", "")
            .add_value(0, "a", "first")
            .add_value(1, "a", "colliding key")
            .close(&registry);
        let sel = node.as_selection().unwrap();
        assert_eq!(sel.size(), 1);
        assert_eq!(sel.name_to_int("a").unwrap(), 0);
    }

    #[test]
    fn test_copy_values_shifts_colliding_value() {
        let registry = Registry::new();
        let mut base = Selection::new("Base", "").add_value(0, "x", "");
        let base_node = base.close(&registry);

        let node = Selection::new("Merged", "")
            .add_value(0, "a", "")
            .copy_values(base_node.as_selection().unwrap())
            .close(&registry);
        let sel = node.as_selection().unwrap();
        // "x" carried value 0, which is taken, so it lands on 1.
        assert_eq!(sel.name_to_int("x").unwrap(), 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let registry = Registry::new();
        let mut sel = rgb();
        let first = sel.close(&registry);
        let second = sel.close(&registry);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.content_hash(), second.content_hash());
    }

    #[test]
    fn test_values_attribute_is_json() {
        let registry = Registry::new();
        let node = rgb().close(&registry);
        let raw = node.attributes().get("values").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
    }

    #[test]
    #[should_panic(expected = "closed selection")]
    fn test_add_value_after_close_panics() {
        let registry = Registry::new();
        let mut sel = rgb();
        sel.close(&registry);
        let _ = sel.add_value(3, "white", "");
    }

    #[test]
    fn test_default_must_name_a_key() {
        let registry = Registry::new();
        let node = rgb().close(&registry);
        let sel = node.as_selection().unwrap();
        assert_eq!(sel.from_default("red").unwrap(), 0);
        let err = sel.from_default("cyan").unwrap_err();
        match err {
            SchemaError::WrongDefault { type_name, .. } => {
                assert!(type_name.contains("'red'"));
                assert!(type_name.contains("'blue'"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
