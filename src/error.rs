//! Error types for schema validation.
//!
//! Only *validation* failures surface here: bad default values, lookups with
//! the wrong type, missing obligatory values, unresolved forward references.
//! Declaration-time contract violations (declaring on a closed type,
//! duplicate record keys, unbound generic parameters) are defects in the
//! declaring program and panic at the point of misuse instead.

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("wrong default value '{value}' for type {type_name}")]
    WrongDefault { value: String, type_name: String },

    #[error("value '{value}' out of bounds for type {type_name}")]
    OutOfBounds { value: String, type_name: String },

    #[error("value '{value}' does not match type {type_name}")]
    InvalidValue { value: String, type_name: String },

    #[error("key '{key}' not found in record {record}")]
    KeyNotFound { key: String, record: String },

    #[error("no value for obligatory key '{key}' of record {record}")]
    MissingValue { key: String, record: String },

    #[error("type mismatch: requested {requested}, key is declared as {declared}")]
    TypeMismatch { requested: String, declared: String },

    #[error("storage mismatch: expected {expected} node, found {found}")]
    StorageMismatch { expected: String, found: String },

    #[error("array of length {len} violates size bounds [{min}, {max}]")]
    ArraySize { len: usize, min: usize, max: usize },

    #[error("key '{key}' not found in selection {selection}; valid keys: {known}")]
    SelectionKeyNotFound {
        key: String,
        selection: String,
        known: String,
    },

    #[error("value {value} not found in selection {selection}")]
    SelectionValueNotFound { value: i64, selection: String },

    #[error("unresolved reference to abstract type '{name}' (referenced by {referrer})")]
    UnresolvedReference { name: String, referrer: String },

    #[error("missing '{discriminator}' discriminator for abstract type {abstract_name}")]
    MissingDiscriminator {
        abstract_name: String,
        discriminator: String,
    },

    #[error("'{descendant}' is not a registered descendant of abstract type {abstract_name}")]
    UnknownDescendant {
        descendant: String,
        abstract_name: String,
    },

    #[error("no constructor registered for type name '{type_name}'")]
    FactoryNotRegistered { type_name: String },
}
