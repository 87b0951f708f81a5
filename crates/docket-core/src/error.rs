//! Error types for docket operations.
//!
//! Codec lookups never produce errors (absent and malformed blocks both
//! come back as `None`). Everything above the codec fails loudly with a
//! [`DocketError`].

use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::RenderError;
use crate::objective::roadmap::RoadmapError;
use crate::schema::SchemaError;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum DocketError {
    #[error("plan #{number} not found")]
    PlanNotFound { number: u64 },

    #[error("objective #{number} not found")]
    ObjectiveNotFound { number: u64 },

    #[error("issue #{number} has no {key} metadata block")]
    MissingBlock { number: u64, key: String },

    #[error("issue #{number} has a {key} metadata block that does not decode")]
    MalformedBlock { number: u64, key: String },

    #[error(transparent)]
    Validation(#[from] SchemaError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("no schema registered for block key {key:?}")]
    UnknownSchema { key: String },

    /// Tracker failures pass through unchanged.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Roadmap(#[from] RoadmapError),

    #[error("YAML encoding error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event log I/O error at {}: {source}", path.display())]
    EventLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt event log entry at {}:{line}: {source}", path.display())]
    CorruptEventLog {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl DocketError {
    /// True for the "requested thing does not exist" class of errors.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound { .. }
                | Self::ObjectiveNotFound { .. }
                | Self::MissingBlock { .. }
                | Self::Roadmap(RoadmapError::StepNotFound(_))
        )
    }
}

/// Result type alias for docket operations.
pub type Result<T> = std::result::Result<T, DocketError>;
