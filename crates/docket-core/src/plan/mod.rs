//! Plans: units of work tracked as issue documents with a `plan-header`
//! block.

pub mod store;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_yaml::Value;

use crate::metadata::{
    BlockCodec, BlockData, PLAN_BODY_KEY, PLAN_HEADER_KEY, header_datetime, header_int, header_str,
};
use crate::schema::{HeaderRecord, PlanHeader, SchemaError};
use crate::tracker::{DocumentState, IssueDocument};

pub use store::{CreatePlanRequest, CreatedPlan, PlanQuery, PlanStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Open,
    Closed,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        })
    }
}

impl From<DocumentState> for PlanState {
    fn from(state: DocumentState) -> Self {
        match state {
            DocumentState::Open => Self::Open,
            DocumentState::Closed => Self::Closed,
        }
    }
}

/// Read model of a plan issue, built once per fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub identifier: String,
    pub number: u64,
    pub title: String,
    /// Plan text from the plan comment, or the issue body when the plan has
    /// no plan comment.
    pub body: String,
    pub state: PlanState,
    pub url: String,
    pub labels: BTreeSet<String>,
    pub assignees: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub objective_id: Option<u64>,
    /// Data of the `plan-header` block; empty when the block is absent.
    pub header_fields: BlockData,
    /// Tracker facts: `number`, `author`, `comment_count`.
    pub metadata: BlockData,
}

impl Plan {
    pub fn from_document(doc: &IssueDocument, codec: &BlockCodec) -> Self {
        let header_fields = codec
            .find_metadata_block(&doc.body, PLAN_HEADER_KEY)
            .map(|block| block.data)
            .unwrap_or_default();

        let plan_comment_id = header_int(&header_fields, "plan_comment_id")
            .and_then(|id| u64::try_from(id).ok());
        let body = doc
            .comment_or_first(plan_comment_id)
            .and_then(|comment| codec.find_content_block(&comment.body, PLAN_BODY_KEY))
            .unwrap_or_else(|| doc.body.clone());

        let objective_id = header_int(&header_fields, "objective_issue")
            .and_then(|id| u64::try_from(id).ok());

        let mut metadata = BlockData::new();
        metadata.insert("number".to_owned(), Value::from(doc.number));
        metadata.insert(
            "author".to_owned(),
            doc.author.clone().map_or(Value::Null, Value::from),
        );
        metadata.insert("comment_count".to_owned(), Value::from(doc.comments.len()));

        Self {
            identifier: doc.number.to_string(),
            number: doc.number,
            title: doc.title.clone(),
            body,
            state: doc.state.into(),
            url: doc.url.clone(),
            labels: doc.labels.iter().cloned().collect(),
            assignees: doc.assignees.iter().cloned().collect(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            objective_id,
            header_fields,
            metadata,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PlanState::Open
    }

    pub fn header_str(&self, key: &str) -> Option<String> {
        header_str(&self.header_fields, key)
    }

    pub fn header_int(&self, key: &str) -> Option<i64> {
        header_int(&self.header_fields, key)
    }

    pub fn header_datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        header_datetime(&self.header_fields, key)
    }

    /// Decode the header fields into a typed [`PlanHeader`].
    pub fn header(&self) -> Result<PlanHeader, SchemaError> {
        PlanHeader::from_block_data(&self.header_fields)
    }
}
