//! Constructor dispatch for abstract types.
//!
//! A [`Factory`] maps descendant type names to closures building a native
//! value from a validated [`RecordAccessor`]. The accessor's
//! [`factory`](crate::accessor::AbstractAccessor::factory) method resolves
//! the discriminator and dispatches here.

use crate::accessor::RecordAccessor;
use crate::error::{Result, SchemaError};
use std::collections::HashMap;

type Constructor<T> = Box<dyn for<'a> Fn(&RecordAccessor<'a>) -> Result<T> + Send + Sync>;

/// Registry of per-descendant constructors for one abstract type.
pub struct Factory<T> {
    constructors: HashMap<String, Constructor<T>>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Factory<T> {
    pub fn new() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register the constructor for a descendant type name, replacing any
    /// previous registration.
    pub fn register<F>(&mut self, type_name: impl Into<String>, constructor: F)
    where
        F: for<'a> Fn(&RecordAccessor<'a>) -> Result<T> + Send + Sync + 'static,
    {
        self.constructors
            .insert(type_name.into(), Box::new(constructor));
    }

    /// Build a value through the constructor registered for `type_name`.
    pub fn create(&self, type_name: &str, record: &RecordAccessor<'_>) -> Result<T> {
        let constructor =
            self.constructors
                .get(type_name)
                .ok_or_else(|| SchemaError::FactoryNotRegistered {
                    type_name: type_name.to_string(),
                })?;
        constructor(record)
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DefaultValue, Record};
    use crate::registry::Registry;
    use crate::scalar::IntegerType;
    use serde_json::json;

    #[test]
    fn test_dispatch_and_missing_registration() {
        let registry = Registry::new();
        let schema = Record::new("Cg", "")
            .declare_key("max_it", IntegerType::new(), DefaultValue::Obligatory, "")
            .close(&registry);
        let tree = json!({ "max_it": 30 });
        let record = RecordAccessor::new(&schema, &tree, &registry).unwrap();

        let mut factory: Factory<i64> = Factory::new();
        factory.register("Cg", |rec: &RecordAccessor| rec.val::<i64>("max_it"));

        assert!(factory.is_registered("Cg"));
        assert_eq!(factory.create("Cg", &record).unwrap(), 30);
        assert!(matches!(
            factory.create("Gmres", &record),
            Err(SchemaError::FactoryNotRegistered { .. })
        ));
    }
}
