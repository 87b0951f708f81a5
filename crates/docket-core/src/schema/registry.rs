//! Schema registry -- the set of block schemas, keyed by block key.
//!
//! The registry is a plain value: build it with
//! [`SchemaRegistry::standard`] wherever it is needed. There is no global
//! instance.

use std::collections::HashMap;

use super::{BlockSchema, ImplementationStatusSchema, ObjectiveHeaderSchema, PlanHeaderSchema};
use crate::error::{DocketError, Result};
use crate::metadata::BlockData;

/// A collection of registered [`BlockSchema`] implementations, keyed by
/// block key.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Box<dyn BlockSchema>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every schema this crate defines.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(PlanHeaderSchema);
        registry.register(ObjectiveHeaderSchema);
        registry.register(ImplementationStatusSchema);
        registry
    }

    /// Register a schema under the key returned by [`BlockSchema::key`].
    ///
    /// A schema already registered for that key is replaced and returned.
    pub fn register(&mut self, schema: impl BlockSchema + 'static) -> Option<Box<dyn BlockSchema>> {
        let key = schema.key().to_owned();
        self.schemas.insert(key, Box::new(schema))
    }

    /// Look up a schema by block key.
    pub fn get(&self, key: &str) -> Option<&dyn BlockSchema> {
        self.schemas.get(key).map(|b| b.as_ref())
    }

    /// Registered block keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validate `data` against the schema registered for `key`.
    pub fn validate(&self, key: &str, data: &BlockData) -> Result<()> {
        let schema = self.get(key).ok_or_else(|| DocketError::UnknownSchema {
            key: key.to_owned(),
        })?;
        schema.validate(data)?;
        Ok(())
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;

    use super::*;
    use crate::schema::SchemaError;

    /// Schema that rejects everything, used to check replacement.
    struct RejectAll;

    impl BlockSchema for RejectAll {
        fn key(&self) -> &str {
            "plan-header"
        }

        fn validate(&self, _data: &BlockData) -> std::result::Result<(), SchemaError> {
            Err(SchemaError {
                key: "plan-header".to_owned(),
                violations: vec![],
            })
        }
    }

    #[test]
    fn registry_starts_empty() {
        let registry = SchemaRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.keys().is_empty());
    }

    #[test]
    fn standard_registry_keys() {
        let registry = SchemaRegistry::standard();
        assert_eq!(
            registry.keys(),
            vec!["implementation-status", "objective-header", "plan-header"]
        );
    }

    #[test]
    fn register_replaces_existing() {
        let mut registry = SchemaRegistry::standard();
        let old = registry.register(RejectAll);
        assert!(old.is_some());
        assert_eq!(registry.len(), 3);
        assert!(registry.validate("plan-header", &BlockData::new()).is_err());
    }

    #[test]
    fn validate_unknown_key() {
        let registry = SchemaRegistry::standard();
        let err = registry.validate("mystery", &BlockData::new()).unwrap_err();
        assert!(matches!(err, DocketError::UnknownSchema { ref key } if key == "mystery"));
    }

    #[test]
    fn validate_dispatches_by_key() {
        let registry = SchemaRegistry::standard();
        let data: BlockData = [("objective_issue".to_owned(), Value::from("12"))]
            .into_iter()
            .collect();
        let err = registry.validate("plan-header", &data).unwrap_err();
        assert!(matches!(err, DocketError::Validation(_)));
    }

    #[test]
    fn registry_debug_shows_keys() {
        let debug = format!("{:?}", SchemaRegistry::standard());
        assert!(debug.contains("plan-header"));
    }
}
