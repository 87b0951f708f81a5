//! Append-only plan event log.
//!
//! Every store keeps events per plan in insertion order and never reorders
//! or compacts them. Stores do not look inside `data`; producers that want
//! shape checks call [`payload::validate_event`] before appending.

pub mod comments;
pub mod jsonl;
pub mod memory;
pub mod payload;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metadata::BlockData;

pub use comments::CommentEventStore;
pub use jsonl::JsonlEventStore;
pub use memory::InMemoryEventStore;
pub use payload::{required_payload_fields, validate_event, validate_payload};

/// Kind of a plan lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanEventType {
    Created,
    Queued,
    WorkflowStarted,
    Progress,
    Completed,
    Failed,
    Retry,
    WorktreeCreated,
}

impl PlanEventType {
    pub const ALL: [Self; 8] = [
        Self::Created,
        Self::Queued,
        Self::WorkflowStarted,
        Self::Progress,
        Self::Completed,
        Self::Failed,
        Self::Retry,
        Self::WorktreeCreated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::WorkflowStarted => "workflow_started",
            Self::Progress => "progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retry => "retry",
            Self::WorktreeCreated => "worktree_created",
        }
    }
}

impl fmt::Display for PlanEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanEventType {
    type Err = PlanEventTypeParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PlanEventTypeParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`PlanEventType`] string.
#[derive(Debug, Clone)]
pub struct PlanEventTypeParseError(pub String);

impl fmt::Display for PlanEventTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan event type: {:?}", self.0)
    }
}

impl std::error::Error for PlanEventTypeParseError {}

/// One entry of a plan's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEvent {
    pub event_type: PlanEventType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: BlockData,
}

impl PlanEvent {
    /// An event stamped with the current time.
    pub fn new(event_type: PlanEventType, data: BlockData) -> Self {
        Self::at(event_type, Utc::now(), data)
    }

    pub fn at(event_type: PlanEventType, timestamp: DateTime<Utc>, data: BlockData) -> Self {
        Self {
            event_type,
            timestamp,
            data,
        }
    }
}

/// Storage for plan event logs.
pub trait PlanEventStore: Send + Sync {
    /// Append `event` to the end of the log of `plan_id`.
    fn append_event(&self, plan_id: u64, event: PlanEvent) -> Result<()>;

    /// Events of `plan_id` in insertion order, optionally restricted to the
    /// given types. An unknown plan has no events.
    fn get_events(
        &self,
        plan_id: u64,
        event_types: Option<&[PlanEventType]>,
    ) -> Result<Vec<PlanEvent>>;

    /// The most recently appended event, optionally of one type.
    fn get_latest_event(
        &self,
        plan_id: u64,
        event_type: Option<PlanEventType>,
    ) -> Result<Option<PlanEvent>> {
        let filter = event_type.map(|t| [t]);
        let mut events = self.get_events(plan_id, filter.as_ref().map(|f| f.as_slice()))?;
        Ok(events.pop())
    }
}

// Compile-time assertion: PlanEventStore must be usable as `dyn PlanEventStore`.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanEventStore) {}
};

pub(crate) fn matches_filter(event: &PlanEvent, event_types: Option<&[PlanEventType]>) -> bool {
    event_types.is_none_or(|types| types.contains(&event.event_type))
}
