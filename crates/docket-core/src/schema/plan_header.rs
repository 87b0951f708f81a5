//! The `plan-header` block stored in a plan issue's body.
//!
//! No field is required: headers written by earlier tooling may be partial
//! and must stay updatable. Known fields are type-checked whenever present,
//! and unknown fields pass through untouched.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BlockSchema, FieldChecks, HeaderRecord, SchemaError};
use crate::metadata::{BlockData, PLAN_HEADER_KEY};

/// Header schema version written by [`PlanHeader::new`].
pub const PLAN_HEADER_SCHEMA_VERSION: &str = "2";

const STRING_FIELDS: &[&str] = &[
    "schema_version",
    "created_by",
    "worktree_name",
    "branch_name",
    "last_dispatched_run_id",
];

const TIMESTAMP_FIELDS: &[&str] = &[
    "created_at",
    "last_dispatched_at",
    "last_local_impl_at",
    "last_remote_impl_at",
];

const ISSUE_REFERENCE_FIELDS: &[&str] = &["objective_issue", "plan_comment_id"];

/// Whether the last local implementation session started or ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalImplEvent {
    Started,
    Ended,
}

impl LocalImplEvent {
    pub const ALL: [Self; 2] = [Self::Started, Self::Ended];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for LocalImplEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a plan is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Planned,
    Implementing,
    Implemented,
}

impl LifecycleStage {
    pub const ALL: [Self; 3] = [Self::Planned, Self::Implementing, Self::Implemented];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Implementing => "implementing",
            Self::Implemented => "implemented",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanHeaderSchema;

impl BlockSchema for PlanHeaderSchema {
    fn key(&self) -> &str {
        PLAN_HEADER_KEY
    }

    fn validate(&self, data: &BlockData) -> Result<(), SchemaError> {
        let mut checks = FieldChecks::new(data);

        for field in STRING_FIELDS {
            checks.string(field);
        }
        for field in TIMESTAMP_FIELDS {
            checks.timestamp(field);
        }
        for field in ISSUE_REFERENCE_FIELDS {
            checks.positive_integer(field);
        }

        if let Some(repo) = checks.string("source_repo") {
            if !is_owner_repo(repo) {
                checks.violate(
                    "source_repo",
                    format!("must have the form owner/repo (got {repo:?})"),
                );
            }
        }

        let events: Vec<&str> = LocalImplEvent::ALL.iter().map(|e| e.as_str()).collect();
        checks.one_of("last_local_impl_event", &events);
        let stages: Vec<&str> = LifecycleStage::ALL.iter().map(|s| s.as_str()).collect();
        checks.one_of("lifecycle_stage", &stages);

        checks.finish(PLAN_HEADER_KEY)
    }
}

fn is_owner_repo(value: &str) -> bool {
    match value.split_once('/') {
        Some((owner, repo)) => {
            !owner.is_empty() && !repo.is_empty() && !repo.contains('/') && !value.contains(' ')
        }
        None => false,
    }
}

/// Typed view of the `plan-header` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(
        default,
        with = "crate::metadata::accessor::timestamp_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Name of the worktree the plan is implemented in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    /// Issue number of the objective this plan advances.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective_issue: Option<u64>,
    /// Comment id holding the plan text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_comment_id: Option<u64>,
    /// `owner/repo` the plan was created from, when it differs from the
    /// tracking repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_dispatched_run_id: Option<String>,
    #[serde(
        default,
        with = "crate::metadata::accessor::timestamp_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_dispatched_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "crate::metadata::accessor::timestamp_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_local_impl_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_local_impl_event: Option<LocalImplEvent>,
    #[serde(
        default,
        with = "crate::metadata::accessor::timestamp_serde::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_remote_impl_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_stage: Option<LifecycleStage>,
    /// Fields this version does not know about, preserved on rewrite.
    #[serde(flatten)]
    pub extra: BlockData,
}

impl PlanHeader {
    /// A fresh header for a newly created plan.
    pub fn new(created_by: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: Some(PLAN_HEADER_SCHEMA_VERSION.to_owned()),
            created_at: Some(created_at),
            created_by: Some(created_by.into()),
            lifecycle_stage: Some(LifecycleStage::Planned),
            ..Self::default()
        }
    }
}

impl HeaderRecord for PlanHeader {
    type Schema = PlanHeaderSchema;
}
