//! Declarative input schemas with typed access to parsed data trees.
//!
//! This crate separates reading structured input into three layers:
//!
//! 1. **Declaration** — builders ([`Record`], [`Tuple`], [`Selection`],
//!    [`Array`], [`Abstract`], the scalar types) assemble a schema while
//!    open, then `close()` freezes each type into an immutable
//!    [`SchemaNode`] identified by a content hash.
//! 2. **Registry** — every closed type is published into an explicit
//!    [`Registry`], which deduplicates structurally identical types,
//!    tracks abstract descendants and resolves forward references in a
//!    single [`Registry::lazy_finish`] pass.
//! 3. **Access** — accessors ([`RecordAccessor`], [`ArrayAccessor`],
//!    [`AbstractAccessor`]) pair a closed schema with a position in a
//!    format-agnostic parsed tree and hand out validated native values.
//!
//! Misusing the declaration API (duplicate keys, closing with an invalid
//! default, mutating a closed builder) panics: those are defects in the
//! consuming code. Everything discovered while reading input is a typed
//! [`SchemaError`] returned to the caller.
//!
//! ```
//! use input_schema::{
//!     DefaultValue, IntegerType, Record, RecordAccessor, Registry,
//! };
//!
//! let registry = Registry::new();
//! let schema = Record::new("solver", "Linear solver settings.")
//!     .declare_key(
//!         "max_it",
//!         IntegerType::bounded(1, 100_000),
//!         DefaultValue::Declaration("1000".to_string()),
//!         "Iteration limit.",
//!     )
//!     .close(&registry);
//! registry.lazy_finish().unwrap();
//!
//! let tree = serde_json::json!({ "max_it": 200 });
//! let solver = RecordAccessor::new(&schema, &tree, &registry).unwrap();
//! assert_eq!(solver.val::<i64>("max_it").unwrap(), 200);
//! ```

pub mod abstract_record;
pub mod accessor;
pub mod array;
pub mod error;
pub mod factory;
pub mod generic;
pub mod hash;
pub mod node;
pub mod record;
pub mod registry;
pub mod scalar;
pub mod selection;

pub use abstract_record::{Abstract, AbstractData, DISCRIMINATOR_KEY};
pub use accessor::{AbstractAccessor, ArrayAccessor, ArrayIter, FromTree, RecordAccessor};
pub use array::{Array, ArrayData};
pub use error::{Result, SchemaError};
pub use factory::Factory;
pub use generic::{Instance, Parameter};
pub use hash::TypeHash;
pub use node::{AttributeMap, SchemaNode, TypeKind, TypeRef};
pub use record::{DefaultValue, Key, Record, RecordData, Tuple};
pub use registry::Registry;
pub use scalar::{BoolType, DoubleType, FileKind, FileNameType, IntegerType, StringType};
pub use selection::{Selection, SelectionData, SelectionKey};
