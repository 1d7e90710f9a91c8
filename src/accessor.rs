//! Typed accessors over a parsed data tree.
//!
//! Accessors pair a closed schema node with a position inside a
//! format-agnostic data tree (a [`serde_json::Value`] produced by some
//! external parser) and expose type-checked values. They borrow the tree
//! and the registry; all operations are synchronous, bounded lookups.
//!
//! Every failure an accessor can produce is a validation error returned to
//! the caller: the tree is user input, never trusted. The one exception is
//! calling `val` on a key whose default specification requires `val_or` or
//! `opt_val` — that is a contract violation in the consuming code and
//! panics.

use crate::abstract_record::DISCRIMINATOR_KEY;
use crate::error::{Result, SchemaError};
use crate::factory::Factory;
use crate::node::{SchemaNode, TypeKind};
use crate::record::Key;
use crate::registry::Registry;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Short label for the shape of a tree node, for diagnostics.
fn storage_kind(tree: &Value) -> &'static str {
    match tree {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "map",
    }
}

fn storage_mismatch(expected: &str, tree: &Value) -> SchemaError {
    SchemaError::StorageMismatch {
        expected: expected.to_string(),
        found: storage_kind(tree).to_string(),
    }
}

fn type_mismatch(requested: &str, declared: &SchemaNode) -> SchemaError {
    SchemaError::TypeMismatch {
        requested: requested.to_string(),
        declared: declared.type_name(),
    }
}

/// Conversion from a tree position, checked against the declared schema
/// node. Implemented for native scalars and for the nested accessors.
pub trait FromTree<'a>: Sized {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self>;

    /// Parse a declared textual default instead of a tree value.
    fn from_default_str(schema: &Arc<SchemaNode>, raw: &str) -> Result<Self> {
        Err(SchemaError::WrongDefault {
            value: raw.to_string(),
            type_name: schema.type_name(),
        })
    }
}

impl<'a> FromTree<'a> for bool {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, _registry: &'a Registry) -> Result<Self> {
        match schema.kind() {
            TypeKind::Bool(_) => tree.as_bool().ok_or_else(|| storage_mismatch("bool", tree)),
            _ => Err(type_mismatch("Bool", schema)),
        }
    }

    fn from_default_str(schema: &Arc<SchemaNode>, raw: &str) -> Result<Self> {
        match schema.kind() {
            TypeKind::Bool(b) => b.from_default(raw),
            _ => Err(type_mismatch("Bool", schema)),
        }
    }
}

impl<'a> FromTree<'a> for i64 {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, _registry: &'a Registry) -> Result<Self> {
        match schema.kind() {
            TypeKind::Integer(integer) => {
                let value = tree.as_i64().ok_or_else(|| storage_mismatch("integer", tree))?;
                if integer.matches(value) {
                    Ok(value)
                } else {
                    Err(SchemaError::OutOfBounds {
                        value: value.to_string(),
                        type_name: "Integer".to_string(),
                    })
                }
            }
            TypeKind::Selection(selection) => match tree {
                Value::String(name) => selection.name_to_int(name),
                Value::Number(_) => {
                    let value = tree.as_i64().ok_or_else(|| storage_mismatch("integer", tree))?;
                    selection.int_to_name(value)?;
                    Ok(value)
                }
                other => Err(storage_mismatch("string", other)),
            },
            _ => Err(type_mismatch("Integer", schema)),
        }
    }

    fn from_default_str(schema: &Arc<SchemaNode>, raw: &str) -> Result<Self> {
        match schema.kind() {
            TypeKind::Integer(integer) => integer.from_default(raw),
            TypeKind::Selection(selection) => selection.from_default(raw),
            _ => Err(type_mismatch("Integer", schema)),
        }
    }
}

impl<'a> FromTree<'a> for f64 {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, _registry: &'a Registry) -> Result<Self> {
        match schema.kind() {
            TypeKind::Double(double) => {
                let value = tree.as_f64().ok_or_else(|| storage_mismatch("number", tree))?;
                if double.matches(value) {
                    Ok(value)
                } else {
                    Err(SchemaError::OutOfBounds {
                        value: value.to_string(),
                        type_name: "Double".to_string(),
                    })
                }
            }
            _ => Err(type_mismatch("Double", schema)),
        }
    }

    fn from_default_str(schema: &Arc<SchemaNode>, raw: &str) -> Result<Self> {
        match schema.kind() {
            TypeKind::Double(double) => double.from_default(raw),
            _ => Err(type_mismatch("Double", schema)),
        }
    }
}

impl<'a> FromTree<'a> for String {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, _registry: &'a Registry) -> Result<Self> {
        let text = tree.as_str().ok_or_else(|| storage_mismatch("string", tree))?;
        match schema.kind() {
            TypeKind::Str(_) => Ok(text.to_string()),
            TypeKind::FileName(file) => {
                if file.matches(text) {
                    Ok(text.to_string())
                } else {
                    Err(SchemaError::InvalidValue {
                        value: text.to_string(),
                        type_name: file.type_name().to_string(),
                    })
                }
            }
            TypeKind::Selection(selection) => {
                // Validated membership; the symbolic name is returned.
                selection.name_to_int(text)?;
                Ok(text.to_string())
            }
            _ => Err(type_mismatch("String", schema)),
        }
    }

    fn from_default_str(schema: &Arc<SchemaNode>, raw: &str) -> Result<Self> {
        match schema.kind() {
            TypeKind::Str(s) => s.from_default(raw),
            TypeKind::FileName(file) => file.from_default(raw),
            TypeKind::Selection(selection) => {
                selection.from_default(raw)?;
                Ok(raw.to_string())
            }
            _ => Err(type_mismatch("String", schema)),
        }
    }
}

impl<'a> FromTree<'a> for RecordAccessor<'a> {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        RecordAccessor::new(schema, tree, registry)
    }
}

impl<'a> FromTree<'a> for ArrayAccessor<'a> {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        ArrayAccessor::new(schema, tree, registry)
    }
}

impl<'a> FromTree<'a> for AbstractAccessor<'a> {
    fn from_tree(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        AbstractAccessor::new(schema, tree, registry)
    }
}

/// Accessor over a record (or tuple) position in the tree.
#[derive(Debug, Clone)]
pub struct RecordAccessor<'a> {
    schema: Arc<SchemaNode>,
    tree: &'a Value,
    registry: &'a Registry,
}

impl<'a> RecordAccessor<'a> {
    /// Pair a closed record or tuple schema with a tree position. The tree
    /// node must be a map (a sequence for tuples), unless the record
    /// allows auto conversion of a bare value.
    pub fn new(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        let data = match schema.kind() {
            TypeKind::Record(data) | TypeKind::Tuple(data) => data,
            _ => return Err(type_mismatch("Record", schema)),
        };
        let shape_ok = match tree {
            Value::Object(_) => true,
            Value::Array(_) => matches!(schema.kind(), TypeKind::Tuple(_)),
            _ => data.auto_conversion_key().is_some(),
        };
        if !shape_ok {
            return Err(storage_mismatch("map", tree));
        }
        Ok(Self {
            schema: schema.clone(),
            tree,
            registry,
        })
    }

    fn data(&self) -> &crate::record::RecordData {
        match self.schema.kind() {
            TypeKind::Record(data) | TypeKind::Tuple(data) => data,
            _ => unreachable!("constructor admits only record kinds"),
        }
    }

    pub fn type_name(&self) -> String {
        self.schema.type_name()
    }

    /// Child tree node for a key, honoring tuple positions and auto
    /// conversion. Explicit nulls count as absent.
    fn child(&self, key: &Key) -> Option<&'a Value> {
        let found = match self.tree {
            Value::Object(map) => map.get(&key.name),
            Value::Array(items) => items.get(key.index),
            other => {
                if self.data().auto_conversion_key() == Some(key.name.as_str()) {
                    Some(other)
                } else {
                    None
                }
            }
        };
        found.filter(|v| !v.is_null())
    }

    /// Read the value of an obligatory or declaration-defaulted key.
    ///
    /// An absent obligatory value is an error, never silently defaulted;
    /// an absent declaration-defaulted value parses the declared default.
    /// Calling this on an optional or read-time key panics — use
    /// [`opt_val`](Self::opt_val) or [`val_or`](Self::val_or).
    pub fn val<T: FromTree<'a>>(&self, key_name: &str) -> Result<T> {
        let key = self.data().key(key_name)?;
        assert!(
            key.default.is_obligatory() || key.default.has_value_at_declaration(),
            "key '{}' of record '{}' is {}; use opt_val or val_or",
            key_name,
            self.data().name(),
            if key.default.is_optional() { "optional" } else { "read-time defaulted" },
        );
        let ty = key.type_ref.resolve(self.registry, self.data().name())?;
        match self.child(key) {
            Some(child) => T::from_tree(&ty, child, self.registry),
            None => match &key.default {
                crate::record::DefaultValue::Declaration(raw) => T::from_default_str(&ty, raw),
                _ => Err(SchemaError::MissingValue {
                    key: key_name.to_string(),
                    record: self.data().name().to_string(),
                }),
            },
        }
    }

    /// Read a read-time-defaulted key, substituting `default` when the
    /// tree has no entry. Calling this on any other default spec panics.
    pub fn val_or<T: FromTree<'a>>(&self, key_name: &str, default: T) -> Result<T> {
        let key = self.data().key(key_name)?;
        assert!(
            key.default.has_value_at_read_time(),
            "key '{}' of record '{}' has no read-time default; use val or opt_val",
            key_name,
            self.data().name(),
        );
        let ty = key.type_ref.resolve(self.registry, self.data().name())?;
        match self.child(key) {
            Some(child) => T::from_tree(&ty, child, self.registry),
            None => Ok(default),
        }
    }

    /// Non-panicking read of any key: `Ok(None)` when the tree has no
    /// entry and no declared default supplies one.
    pub fn opt_val<T: FromTree<'a>>(&self, key_name: &str) -> Result<Option<T>> {
        let key = self.data().key(key_name)?;
        let ty = key.type_ref.resolve(self.registry, self.data().name())?;
        match self.child(key) {
            Some(child) => T::from_tree(&ty, child, self.registry).map(Some),
            None => match &key.default {
                crate::record::DefaultValue::Declaration(raw) => {
                    T::from_default_str(&ty, raw).map(Some)
                }
                _ => Ok(None),
            },
        }
    }

    /// Whether the tree supplies a value for the key (declared defaults
    /// count as present).
    pub fn has_value(&self, key_name: &str) -> Result<bool> {
        let key = self.data().key(key_name)?;
        Ok(self.child(key).is_some() || key.default.has_value_at_declaration())
    }
}

/// Accessor over an array position in the tree.
#[derive(Debug, Clone)]
pub struct ArrayAccessor<'a> {
    schema: Arc<SchemaNode>,
    items: &'a [Value],
    registry: &'a Registry,
}

impl<'a> ArrayAccessor<'a> {
    /// Pair a closed array schema with a tree position. The tree node must
    /// be a sequence whose length satisfies the schema's size bounds.
    pub fn new(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        let data = match schema.kind() {
            TypeKind::Array(data) => data,
            _ => return Err(type_mismatch("Array", schema)),
        };
        let items = match tree {
            Value::Array(items) => items.as_slice(),
            other => return Err(storage_mismatch("sequence", other)),
        };
        if !data.match_size(items.len()) {
            return Err(SchemaError::ArraySize {
                len: items.len(),
                min: data.min_size,
                max: data.max_size,
            });
        }
        Ok(Self {
            schema: schema.clone(),
            items,
            registry,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The resolved element schema.
    pub fn element_type(&self) -> Result<Arc<SchemaNode>> {
        let data = match self.schema.kind() {
            TypeKind::Array(data) => data,
            _ => unreachable!("constructor admits only arrays"),
        };
        data.element.resolve(self.registry, &self.schema.type_name())
    }

    /// Iterate the elements as `T`, validating each against the element
    /// schema.
    pub fn iter<T: FromTree<'a>>(&self) -> Result<ArrayIter<'a, T>> {
        Ok(ArrayIter {
            element: self.element_type()?,
            items: self.items.iter(),
            registry: self.registry,
            _marker: PhantomData,
        })
    }

    /// Drain the validated elements into a caller-provided vector,
    /// replacing its contents. Stops at the first invalid element.
    pub fn collect_into<T: FromTree<'a>>(&self, out: &mut Vec<T>) -> Result<()> {
        out.clear();
        for item in self.iter()? {
            out.push(item?);
        }
        Ok(())
    }
}

/// Iterator over array elements, advancing a position inside the tree.
pub struct ArrayIter<'a, T> {
    element: Arc<SchemaNode>,
    items: std::slice::Iter<'a, Value>,
    registry: &'a Registry,
    _marker: PhantomData<T>,
}

impl<'a, T: FromTree<'a>> Iterator for ArrayIter<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.items.next()?;
        Some(T::from_tree(&self.element, item, self.registry))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

/// Accessor over an abstract (polymorphic record) position in the tree.
///
/// The `TYPE` discriminator in the map selects the concrete descendant
/// record, whose schema then validates the remaining fields.
#[derive(Debug, Clone)]
pub struct AbstractAccessor<'a> {
    schema: Arc<SchemaNode>,
    tree: &'a Value,
    registry: &'a Registry,
}

impl<'a> AbstractAccessor<'a> {
    pub fn new(schema: &Arc<SchemaNode>, tree: &'a Value, registry: &'a Registry) -> Result<Self> {
        if schema.as_abstract().is_none() {
            return Err(type_mismatch("Abstract", schema));
        }
        if !tree.is_object() {
            return Err(storage_mismatch("map", tree));
        }
        Ok(Self {
            schema: schema.clone(),
            tree,
            registry,
        })
    }

    fn abstract_name(&self) -> &str {
        self.schema
            .as_abstract()
            .map(|a| a.name())
            .unwrap_or_default()
    }

    /// The discriminator value naming the concrete descendant.
    pub fn discriminator(&self) -> Result<&'a str> {
        self.tree
            .get(DISCRIMINATOR_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::MissingDiscriminator {
                abstract_name: self.abstract_name().to_string(),
                discriminator: DISCRIMINATOR_KEY.to_string(),
            })
    }

    /// The concrete descendant record schema selected by the tree.
    pub fn record_type(&self) -> Result<Arc<SchemaNode>> {
        let name = self.discriminator()?;
        self.registry
            .descendant(self.abstract_name(), name)
            .ok_or_else(|| SchemaError::UnknownDescendant {
                descendant: name.to_string(),
                abstract_name: self.abstract_name().to_string(),
            })
    }

    /// Re-view the same tree position through the selected descendant.
    pub fn descend(&self) -> Result<RecordAccessor<'a>> {
        let record = self.record_type()?;
        RecordAccessor::new(&record, self.tree, self.registry)
    }

    /// Construct a native value by dispatching to the constructor
    /// registered for the selected descendant's type name.
    pub fn factory<T>(&self, factory: &Factory<T>) -> Result<T> {
        let record = self.descend()?;
        factory.create(self.discriminator()?, &record)
    }
}
