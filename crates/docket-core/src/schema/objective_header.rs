//! The `objective-header` block stored in an objective issue's body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockSchema, FieldChecks, HeaderRecord, SchemaError};
use crate::metadata::{BlockData, OBJECTIVE_HEADER_KEY};

#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectiveHeaderSchema;

impl BlockSchema for ObjectiveHeaderSchema {
    fn key(&self) -> &str {
        OBJECTIVE_HEADER_KEY
    }

    fn validate(&self, data: &BlockData) -> Result<(), SchemaError> {
        let mut checks = FieldChecks::new(data);
        checks.required(&["created_at", "created_by"]);
        checks.timestamp("created_at");
        checks.string("created_by");
        checks.positive_integer("objective_comment_id");

        if let Some(slug) = checks.string("slug") {
            if !is_kebab_slug(slug) {
                checks.violate("slug", format!("must be lowercase kebab-case (got {slug:?})"));
            }
        }

        checks.finish(OBJECTIVE_HEADER_KEY)
    }
}

fn is_kebab_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Typed view of the `objective-header` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveHeader {
    #[serde(with = "crate::metadata::accessor::timestamp_serde")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    /// Comment id holding the objective text and roadmap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_comment_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl HeaderRecord for ObjectiveHeader {
    type Schema = ObjectiveHeaderSchema;
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;

    use super::*;

    #[test]
    fn names_all_missing_required_fields() {
        let err = ObjectiveHeaderSchema.validate(&BlockData::new()).unwrap_err();
        assert_eq!(err.missing_fields(), vec!["created_at", "created_by"]);
        let message = err.to_string();
        assert!(message.contains("created_at"));
        assert!(message.contains("created_by"));
    }

    #[test]
    fn rejects_bad_slug() {
        let data: BlockData = [
            ("created_at".to_owned(), Value::from("2024-01-15T10:30:00Z")),
            ("created_by".to_owned(), Value::from("alice")),
            ("slug".to_owned(), Value::from("Not A Slug")),
        ]
        .into_iter()
        .collect();
        let err = ObjectiveHeaderSchema.validate(&data).unwrap_err();
        assert_eq!(err.violations.len(), 1);
    }

    #[test]
    fn decodes_valid_header() {
        let data: BlockData = [
            ("created_at".to_owned(), Value::from("2024-01-15T10:30:00Z")),
            ("created_by".to_owned(), Value::from("alice")),
            ("objective_comment_id".to_owned(), Value::from(991)),
            ("slug".to_owned(), Value::from("faster-builds")),
        ]
        .into_iter()
        .collect();
        let header = ObjectiveHeader::from_block_data(&data).expect("valid");
        assert_eq!(header.objective_comment_id, Some(991));
        assert_eq!(header.slug.as_deref(), Some("faster-builds"));
    }
}
