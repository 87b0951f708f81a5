//! Block schemas: per-key validators that run before every write.
//!
//! Each schema owns one block key and checks a [`BlockData`] mapping for
//! missing required fields, wrong field types and schema-local business
//! rules. Validation reports every violation at once in a single
//! [`SchemaError`].
//!
//! Typed records ([`HeaderRecord`]) sit on top: data is validated against
//! the record's schema and then decoded, so the dynamic mapping never
//! travels further than the codec boundary.

pub mod implementation_status;
pub mod objective_header;
pub mod plan_header;
pub mod registry;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::metadata::{BlockData, MetadataBlock, parse_timestamp};

pub use implementation_status::{ImplementationState, ImplementationStatus, ImplementationStatusSchema};
pub use objective_header::{ObjectiveHeader, ObjectiveHeaderSchema};
pub use plan_header::{LifecycleStage, LocalImplEvent, PlanHeader, PlanHeaderSchema};
pub use registry::SchemaRegistry;

/// A stateless validator for one block key.
pub trait BlockSchema: Send + Sync {
    /// Canonical block key this schema owns.
    fn key(&self) -> &str;

    /// Check `data`, collecting every violation.
    fn validate(&self, data: &BlockData) -> Result<(), SchemaError>;
}

// Compile-time assertion: BlockSchema must be usable as `dyn BlockSchema`.
const _: () = {
    fn _assert_object_safe(_: &dyn BlockSchema) {}
};

/// One problem found while validating a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required field is absent or null.
    MissingField(String),
    /// A field holds a value of the wrong type.
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// A field has the right type but breaks a schema rule.
    Constraint { field: String, reason: String },
    /// The data passed validation but does not decode into its record.
    Undecodable(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field {field:?}"),
            Self::WrongType {
                field,
                expected,
                found,
            } => write!(f, "field {field:?} must be {expected} (found {found})"),
            Self::Constraint { field, reason } => write!(f, "field {field:?} {reason}"),
            Self::Undecodable(reason) => write!(f, "block does not decode: {reason}"),
        }
    }
}

/// Validation failure for a block, listing every violation found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub key: String,
    pub violations: Vec<Violation>,
}

impl SchemaError {
    fn undecodable(key: &str, err: impl fmt::Display) -> Self {
        Self {
            key: key.to_owned(),
            violations: vec![Violation::Undecodable(err.to_string())],
        }
    }

    /// Names of all missing required fields.
    pub fn missing_fields(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::MissingField(field) => Some(field.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let missing = self.missing_fields();
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing required fields: {}", missing.join(", ")));
        }
        parts.extend(
            self.violations
                .iter()
                .filter(|v| !matches!(v, Violation::MissingField(_)))
                .map(ToString::to_string),
        );
        write!(f, "invalid {} block: {}", self.key, parts.join("; "))
    }
}

impl std::error::Error for SchemaError {}

/// Accumulates violations while a schema walks its fields.
///
/// Type checks only fire for fields that are present and non-null; pair
/// them with [`FieldChecks::required`] for mandatory fields.
pub(crate) struct FieldChecks<'a> {
    data: &'a BlockData,
    violations: Vec<Violation>,
}

impl<'a> FieldChecks<'a> {
    pub(crate) fn new(data: &'a BlockData) -> Self {
        Self {
            data,
            violations: Vec::new(),
        }
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }

    fn wrong_type(&mut self, field: &str, expected: &'static str, found: &Value) {
        self.violations.push(Violation::WrongType {
            field: field.to_owned(),
            expected,
            found: type_name(found),
        });
    }

    pub(crate) fn required(&mut self, fields: &[&str]) {
        for field in fields {
            if self.present(field).is_none() {
                self.violations.push(Violation::MissingField((*field).to_owned()));
            }
        }
    }

    pub(crate) fn violate(&mut self, field: &str, reason: impl Into<String>) {
        self.violations.push(Violation::Constraint {
            field: field.to_owned(),
            reason: reason.into(),
        });
    }

    pub(crate) fn string(&mut self, field: &str) -> Option<&'a str> {
        match self.present(field)? {
            Value::String(s) => Some(s.as_str()),
            other => {
                self.wrong_type(field, "a string", other);
                None
            }
        }
    }

    pub(crate) fn integer(&mut self, field: &str) -> Option<i64> {
        let value = self.present(field)?;
        match value {
            Value::Number(n) if n.is_i64() => n.as_i64(),
            other => {
                self.wrong_type(field, "an integer", other);
                None
            }
        }
    }

    pub(crate) fn positive_integer(&mut self, field: &str) -> Option<i64> {
        let value = self.integer(field)?;
        if value <= 0 {
            self.violate(field, format!("must be a positive integer (got {value})"));
        }
        Some(value)
    }

    pub(crate) fn timestamp(&mut self, field: &str) {
        if let Some(raw) = self.string(field) {
            if parse_timestamp(raw).is_none() {
                self.violate(field, format!("must be an ISO-8601 timestamp (got {raw:?})"));
            }
        }
    }

    pub(crate) fn one_of(&mut self, field: &str, allowed: &[&str]) -> Option<&'a str> {
        let value = self.string(field)?;
        if !allowed.contains(&value) {
            self.violate(
                field,
                format!("must be one of {} (got {value:?})", allowed.join(", ")),
            );
        }
        Some(value)
    }

    pub(crate) fn mapping(&mut self, field: &str) {
        if let Some(value) = self.present(field) {
            if !value.is_mapping() {
                self.wrong_type(field, "a mapping", value);
            }
        }
    }

    pub(crate) fn finish(self, key: &str) -> Result<(), SchemaError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError {
                key: key.to_owned(),
                violations: self.violations,
            })
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_f64() => "a float",
        Value::Number(_) => "an integer",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// A typed view of one block kind.
///
/// Decoding validates first, then deserializes; encoding serializes, then
/// validates. A record therefore never reaches a document without passing
/// its schema.
pub trait HeaderRecord: Serialize + DeserializeOwned {
    type Schema: BlockSchema + Default;

    fn from_block_data(data: &BlockData) -> Result<Self, SchemaError> {
        let schema = Self::Schema::default();
        schema.validate(data)?;
        let value =
            serde_yaml::to_value(data).map_err(|e| SchemaError::undecodable(schema.key(), e))?;
        serde_yaml::from_value(value).map_err(|e| SchemaError::undecodable(schema.key(), e))
    }

    fn to_block_data(&self) -> Result<BlockData, SchemaError> {
        let schema = Self::Schema::default();
        let value =
            serde_yaml::to_value(self).map_err(|e| SchemaError::undecodable(schema.key(), e))?;
        let data: BlockData =
            serde_yaml::from_value(value).map_err(|e| SchemaError::undecodable(schema.key(), e))?;
        schema.validate(&data)?;
        Ok(data)
    }

    fn to_block(&self) -> Result<MetadataBlock, SchemaError> {
        let data = self.to_block_data()?;
        Ok(MetadataBlock::new(Self::Schema::default().key(), data))
    }
}
