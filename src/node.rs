//! The schema node: one closed vertex of the declarative type graph.
//!
//! A [`SchemaNode`] is immutable. It is produced by closing a builder
//! (`Selection`, `Record`, `Tuple`, `Abstract`, `Array`, `Instance`) or by
//! converting a scalar type, and it lives in the [`Registry`] for the rest
//! of the process. Composite nodes reference children through [`TypeRef`]
//! handles, which may be forward references to abstracts that do not exist
//! yet; `Registry::lazy_finish` verifies that every handle resolves.

use crate::abstract_record::AbstractData;
use crate::array::ArrayData;
use crate::error::{Result, SchemaError};
use crate::generic::Parameter;
use crate::hash::{HashBuilder, TypeHash};
use crate::record::RecordData;
use crate::registry::Registry;
use crate::scalar::{BoolType, DoubleType, FileNameType, IntegerType, StringType};
use crate::selection::SelectionData;
use indexmap::IndexMap;
use std::sync::Arc;

/// Append-only map of introspection attributes. Values must be valid JSON
/// text; invalid entries are reported and skipped, never inserted.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    entries: IndexMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an attribute after validating that `json` parses as JSON.
    pub fn add(&mut self, name: &str, json: &str) {
        if serde_json::from_str::<serde_json::Value>(json).is_err() {
            tracing::error!(attribute = name, "invalid JSON format of attribute, skipped");
            return;
        }
        self.entries.insert(name.to_string(), json.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mix the attribute content into a digest, in name order so that the
    /// hash does not depend on insertion order.
    pub(crate) fn hash_into(&self, builder: &mut HashBuilder) {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        for name in names {
            builder.text(name);
            builder.text(&self.entries[name]);
        }
    }
}

/// Reference from a composite type to a child type.
///
/// `Deferred` is the forward-reference handle: it names an abstract type
/// that may not have been declared yet and resolves through the registry.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Closed(Arc<SchemaNode>),
    Deferred(String),
}

impl TypeRef {
    /// Forward reference to an abstract type by name.
    pub fn deferred(name: impl Into<String>) -> Self {
        Self::Deferred(name.into())
    }

    /// Name of the referenced type, without resolving it.
    pub fn type_name(&self) -> String {
        match self {
            Self::Closed(node) => node.type_name(),
            Self::Deferred(name) => name.clone(),
        }
    }

    /// Resolve to a closed node, looking deferred names up in the registry.
    pub fn resolve(&self, registry: &Registry, referrer: &str) -> Result<Arc<SchemaNode>> {
        match self {
            Self::Closed(node) => Ok(node.clone()),
            Self::Deferred(name) => registry.abstract_by_name(name).ok_or_else(|| {
                SchemaError::UnresolvedReference {
                    name: name.clone(),
                    referrer: referrer.to_string(),
                }
            }),
        }
    }

    pub(crate) fn hash_into(&self, builder: &mut HashBuilder) {
        match self {
            Self::Closed(node) => builder.child(node.content_hash()),
            Self::Deferred(name) => {
                builder.text("deferred");
                builder.text(name);
            }
        }
    }

    fn is_generic(&self) -> bool {
        match self {
            Self::Closed(node) => node.is_generic(),
            Self::Deferred(_) => false,
        }
    }
}

impl From<Arc<SchemaNode>> for TypeRef {
    fn from(node: Arc<SchemaNode>) -> Self {
        Self::Closed(node)
    }
}

impl From<&Arc<SchemaNode>> for TypeRef {
    fn from(node: &Arc<SchemaNode>) -> Self {
        Self::Closed(node.clone())
    }
}

macro_rules! scalar_type_ref {
    ($ty:ty, $kind:ident) => {
        impl From<$ty> for TypeRef {
            fn from(scalar: $ty) -> Self {
                Self::Closed(SchemaNode::closed(TypeKind::$kind(scalar), AttributeMap::new()))
            }
        }
    };
}

scalar_type_ref!(BoolType, Bool);
scalar_type_ref!(IntegerType, Integer);
scalar_type_ref!(DoubleType, Double);
scalar_type_ref!(StringType, Str);
scalar_type_ref!(FileNameType, FileName);
scalar_type_ref!(Parameter, Parameter);

/// Variant payload of a closed schema node.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Bool(BoolType),
    Integer(IntegerType),
    Double(DoubleType),
    Str(StringType),
    FileName(FileNameType),
    Selection(SelectionData),
    Array(ArrayData),
    Record(RecordData),
    Tuple(RecordData),
    Abstract(AbstractData),
    Parameter(Parameter),
}

impl TypeKind {
    /// Short kind label used in type-mismatch diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Integer(_) => "Integer",
            Self::Double(_) => "Double",
            Self::Str(_) => "String",
            Self::FileName(_) => "FileName",
            Self::Selection(_) => "Selection",
            Self::Array(_) => "Array",
            Self::Record(_) => "Record",
            Self::Tuple(_) => "Tuple",
            Self::Abstract(_) => "Abstract",
            Self::Parameter(_) => "Parameter",
        }
    }
}

/// One closed node of the declarative type graph.
#[derive(Debug)]
pub struct SchemaNode {
    kind: TypeKind,
    attributes: AttributeMap,
    hash: TypeHash,
}

impl SchemaNode {
    /// Freeze a kind payload and its attributes into a closed node.
    pub(crate) fn closed(kind: TypeKind, attributes: AttributeMap) -> Arc<Self> {
        let hash = Self::compute_hash(&kind, &attributes);
        Arc::new(Self {
            kind,
            attributes,
            hash,
        })
    }

    /// Clone a node with extra attributes appended; the hash is recomputed.
    pub(crate) fn with_attributes(
        node: &SchemaNode,
        extra: impl IntoIterator<Item = (String, String)>,
    ) -> Arc<Self> {
        let mut attributes = node.attributes.clone();
        for (name, json) in extra {
            attributes.add(&name, &json);
        }
        Self::closed(node.kind.clone(), attributes)
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// Structural content digest. Final once the node exists; forward
    /// references contribute their symbolic name.
    pub fn content_hash(&self) -> &TypeHash {
        &self.hash
    }

    /// Structural name of the type.
    pub fn type_name(&self) -> String {
        match &self.kind {
            TypeKind::Bool(_) => "Bool".to_string(),
            TypeKind::Integer(_) => "Integer".to_string(),
            TypeKind::Double(_) => "Double".to_string(),
            TypeKind::Str(_) => "String".to_string(),
            TypeKind::FileName(f) => f.type_name().to_string(),
            TypeKind::Selection(s) => s.name().to_string(),
            TypeKind::Array(a) => format!("array_of_{}", a.element.type_name()),
            TypeKind::Record(r) | TypeKind::Tuple(r) => r.name().to_string(),
            TypeKind::Abstract(a) => a.name().to_string(),
            TypeKind::Parameter(p) => p.name.clone(),
        }
    }

    /// A type is generic while a `Parameter` placeholder is reachable
    /// through closed child references.
    pub fn is_generic(&self) -> bool {
        match &self.kind {
            TypeKind::Parameter(_) => true,
            TypeKind::Array(a) => a.element.is_generic(),
            TypeKind::Record(r) | TypeKind::Tuple(r) => {
                r.keys().any(|key| key.type_ref.is_generic())
            }
            TypeKind::Abstract(a) => a.keys().any(|key| key.type_ref.is_generic()),
            _ => false,
        }
    }

    /// Validate a textual default value against this type.
    pub fn validate_default(&self, raw: &str) -> Result<()> {
        match &self.kind {
            TypeKind::Bool(b) => b.from_default(raw).map(|_| ()),
            TypeKind::Integer(i) => i.from_default(raw).map(|_| ()),
            TypeKind::Double(d) => d.from_default(raw).map(|_| ()),
            TypeKind::Str(s) => s.from_default(raw).map(|_| ()),
            TypeKind::FileName(f) => f.from_default(raw).map(|_| ()),
            TypeKind::Selection(s) => s.from_default(raw).map(|_| ()),
            TypeKind::Array(a) => {
                // A scalar default is accepted where a single-element array is.
                if a.match_size(1) {
                    match &a.element {
                        TypeRef::Closed(elem) => elem.validate_default(raw),
                        TypeRef::Deferred(_) => self.wrong_default(raw),
                    }
                } else {
                    self.wrong_default(raw)
                }
            }
            TypeKind::Record(r) | TypeKind::Tuple(r) => {
                // Auto-convertible records defer to their conversion key.
                match r.auto_conversion_key().and_then(|k| r.key(k).ok()) {
                    Some(key) => match &key.type_ref {
                        TypeRef::Closed(ty) => ty.validate_default(raw),
                        TypeRef::Deferred(_) => self.wrong_default(raw),
                    },
                    None => self.wrong_default(raw),
                }
            }
            TypeKind::Abstract(_) | TypeKind::Parameter(_) => self.wrong_default(raw),
        }
    }

    fn wrong_default(&self, raw: &str) -> Result<()> {
        Err(SchemaError::WrongDefault {
            value: raw.to_string(),
            type_name: self.type_name(),
        })
    }

    pub fn as_selection(&self) -> Option<&SelectionData> {
        match &self.kind {
            TypeKind::Selection(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordData> {
        match &self.kind {
            TypeKind::Record(r) | TypeKind::Tuple(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_abstract(&self) -> Option<&AbstractData> {
        match &self.kind {
            TypeKind::Abstract(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayData> {
        match &self.kind {
            TypeKind::Array(a) => Some(a),
            _ => None,
        }
    }

    fn compute_hash(kind: &TypeKind, attributes: &AttributeMap) -> TypeHash {
        match kind {
            TypeKind::Bool(_) => HashBuilder::new("Bool").finish(),
            TypeKind::Integer(i) => {
                let mut hb = HashBuilder::new("Integer");
                hb.int(i.lower_bound);
                hb.int(i.upper_bound);
                hb.finish()
            }
            TypeKind::Double(d) => {
                let mut hb = HashBuilder::new("Double");
                hb.float(d.lower_bound);
                hb.float(d.upper_bound);
                hb.finish()
            }
            TypeKind::Str(_) => HashBuilder::new("String").finish(),
            TypeKind::FileName(f) => {
                let mut hb = HashBuilder::new("FileName");
                hb.text(f.type_name());
                hb.finish()
            }
            TypeKind::Selection(s) => {
                let mut hb = HashBuilder::new("Selection");
                hb.text(s.name());
                hb.text(s.description());
                // Key order is semantically significant and hashed as-is.
                for key in s.keys() {
                    hb.text(&key.key);
                    hb.text(&key.description);
                    hb.int(key.value);
                }
                hb.finish()
            }
            TypeKind::Array(a) => {
                let mut hb = HashBuilder::new("Array");
                hb.uint(a.min_size as u64);
                hb.uint(a.max_size as u64);
                a.element.hash_into(&mut hb);
                attributes.hash_into(&mut hb);
                hb.finish()
            }
            TypeKind::Record(r) | TypeKind::Tuple(r) => {
                let tag = if matches!(kind, TypeKind::Tuple(_)) {
                    "Tuple"
                } else {
                    "Record"
                };
                let mut hb = HashBuilder::new(tag);
                Self::hash_record_data(&mut hb, r);
                attributes.hash_into(&mut hb);
                hb.finish()
            }
            TypeKind::Abstract(a) => {
                let mut hb = HashBuilder::new("Abstract");
                hb.text(a.name());
                hb.text(a.description());
                for key in a.keys() {
                    hb.text(&key.name);
                    hb.text(&key.description);
                    key.default.hash_into(&mut hb);
                    key.type_ref.hash_into(&mut hb);
                }
                attributes.hash_into(&mut hb);
                hb.finish()
            }
            TypeKind::Parameter(p) => {
                let mut hb = HashBuilder::new("Parameter");
                hb.text(&p.name);
                hb.finish()
            }
        }
    }

    fn hash_record_data(hb: &mut HashBuilder, r: &RecordData) {
        hb.text(r.name());
        hb.text(r.description());
        hb.text(r.parent().unwrap_or(""));
        hb.text(r.auto_conversion_key().unwrap_or(""));
        // Key order is semantically significant and hashed as-is.
        for key in r.keys() {
            hb.text(&key.name);
            hb.text(&key.description);
            key.default.hash_into(hb);
            key.type_ref.hash_into(hb);
        }
    }
}

impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for SchemaNode {}

/// Key names must be lowercase identifiers: `[a-z0-9_]+`.
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifier() {
        assert!(is_valid_identifier("mesh_file"));
        assert!(is_valid_identifier("a1_2"));
        assert!(!is_valid_identifier("Mesh"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_scalar_hash_stability() {
        let a: TypeRef = IntegerType::bounded(0, 10).into();
        let b: TypeRef = IntegerType::bounded(0, 10).into();
        let c: TypeRef = IntegerType::bounded(0, 11).into();
        let (a, b, c) = match (a, b, c) {
            (TypeRef::Closed(a), TypeRef::Closed(b), TypeRef::Closed(c)) => (a, b, c),
            _ => unreachable!(),
        };
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_attribute_map_rejects_invalid_json() {
        let mut attrs = AttributeMap::new();
        attrs.add("good", "\"text\"");
        attrs.add("bad", "not json at all {");
        assert_eq!(attrs.get("good"), Some("\"text\""));
        assert_eq!(attrs.get("bad"), None);
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_attribute_hash_order_independent() {
        let mut a = AttributeMap::new();
        a.add("x", "1");
        a.add("y", "2");
        let mut b = AttributeMap::new();
        b.add("y", "2");
        b.add("x", "1");
        let mut ha = HashBuilder::new("t");
        a.hash_into(&mut ha);
        let mut hb = HashBuilder::new("t");
        b.hash_into(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }
}
