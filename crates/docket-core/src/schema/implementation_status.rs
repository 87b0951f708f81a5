//! The `implementation-status` block posted as a progress comment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockSchema, FieldChecks, HeaderRecord, SchemaError};
use crate::metadata::{BlockData, IMPLEMENTATION_STATUS_KEY};

/// Overall state of an implementation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationState {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl ImplementationState {
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Complete, Self::Failed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ImplementationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImplementationState {
    type Err = ImplementationStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ImplementationStateParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`ImplementationState`] string.
#[derive(Debug, Clone)]
pub struct ImplementationStateParseError(pub String);

impl fmt::Display for ImplementationStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid implementation state: {:?}", self.0)
    }
}

impl std::error::Error for ImplementationStateParseError {}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImplementationStatusSchema;

impl BlockSchema for ImplementationStatusSchema {
    fn key(&self) -> &str {
        IMPLEMENTATION_STATUS_KEY
    }

    fn validate(&self, data: &BlockData) -> Result<(), SchemaError> {
        let mut checks = FieldChecks::new(data);
        checks.required(&["status", "completed_nodes", "total_nodes", "timestamp"]);

        let states: Vec<&str> = ImplementationState::ALL.iter().map(|s| s.as_str()).collect();
        checks.one_of("status", &states);

        let completed = checks.integer("completed_nodes");
        if let Some(n) = completed {
            if n < 0 {
                checks.violate(
                    "completed_nodes",
                    format!("must be a non-negative integer (got {n})"),
                );
            }
        }
        let total = checks.integer("total_nodes");
        if let Some(n) = total {
            if n <= 0 {
                checks.violate("total_nodes", format!("must be a positive integer (got {n})"));
            }
        }
        if let (Some(done), Some(total)) = (completed, total) {
            if done > total {
                checks.violate(
                    "completed_nodes",
                    format!("must not exceed total_nodes ({done} > {total})"),
                );
            }
        }

        checks.timestamp("timestamp");
        checks.string("summary");

        checks.finish(IMPLEMENTATION_STATUS_KEY)
    }
}

/// Typed view of an `implementation-status` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationStatus {
    pub status: ImplementationState,
    pub completed_nodes: u64,
    pub total_nodes: u64,
    #[serde(with = "crate::metadata::accessor::timestamp_serde")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl HeaderRecord for ImplementationStatus {
    type Schema = ImplementationStatusSchema;
}
