//! Objectives: multi-phase roadmaps tracked as issue documents.
//!
//! An objective issue carries an `objective-header` block in its body. The
//! roadmap lives in an `objective-body` content block of the objective
//! comment (the one named by `objective_comment_id`, else the first
//! comment); older objectives keep the roadmap directly in the issue body.

pub mod graph;
pub mod roadmap;

use tracing::warn;

use crate::metadata::{BlockCodec, OBJECTIVE_BODY_KEY, OBJECTIVE_HEADER_KEY};
use crate::schema::{HeaderRecord, ObjectiveHeader, SchemaError};
use crate::tracker::{DocumentState, IssueDocument};

pub use graph::{
    DependencyGraph, GraphError, GraphProgress, NodeStatus, NodeStatusParseError, ObjectiveNode,
    graph_from_phases,
};
pub use roadmap::{RoadmapError, RoadmapPhase, RoadmapStep, StepUpdate, parse_roadmap, update_roadmap_step};

/// Read model of an objective issue.
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub number: u64,
    pub title: String,
    pub state: DocumentState,
    pub url: String,
    pub header: Option<ObjectiveHeader>,
    /// Comment holding the roadmap, or `None` when it is in the issue body.
    pub roadmap_comment_id: Option<u64>,
    pub phases: Vec<RoadmapPhase>,
    pub graph: DependencyGraph,
}

impl Objective {
    /// Build the read model from a fetched document.
    ///
    /// A decodable `objective-header` must pass its schema.
    pub fn from_document(doc: &IssueDocument, codec: &BlockCodec) -> Result<Self, SchemaError> {
        let header = codec
            .find_metadata_block(&doc.body, OBJECTIVE_HEADER_KEY)
            .map(|block| ObjectiveHeader::from_block_data(&block.data))
            .transpose()?;

        let comment_id = header.as_ref().and_then(|h| h.objective_comment_id);
        let roadmap_comment = doc.comment_or_first(comment_id).and_then(|comment| {
            codec
                .find_content_block(&comment.body, OBJECTIVE_BODY_KEY)
                .map(|content| (comment.id, content))
        });

        let (roadmap_comment_id, phases) = match roadmap_comment {
            Some((id, content)) => (Some(id), parse_roadmap(&content)),
            None => (None, parse_roadmap(&doc.body)),
        };

        let graph = graph_from_phases(&phases);
        for (node, dep) in graph.dangling_dependencies() {
            warn!(objective = doc.number, node, dependency = dep, "dangling roadmap dependency");
        }

        Ok(Self {
            number: doc.number,
            title: doc.title.clone(),
            state: doc.state,
            url: doc.url.clone(),
            header,
            roadmap_comment_id,
            phases,
            graph,
        })
    }

    /// The next pending step whose dependencies are satisfied.
    pub fn next_step(&self) -> Option<&ObjectiveNode> {
        self.graph.next_node()
    }

    pub fn is_complete(&self) -> bool {
        self.graph.is_complete()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_yaml::Value;

    use super::*;
    use crate::metadata::MetadataBlock;
    use crate::tracker::IssueComment;

    const ROADMAP: &str = "## Phase 1: Start\n\n| Step | Description | Status | Plan | PR |\n|---|---|---|---|---|\n| 1.1 | First | done | - | #4 |\n| 1.2 | Second | pending | - | - |\n";

    fn document(body: &str, comments: Vec<IssueComment>) -> IssueDocument {
        let at = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        IssueDocument {
            number: 40,
            title: "Objective: faster builds".to_owned(),
            body: body.to_owned(),
            state: DocumentState::Open,
            url: "https://tracker.example/acme/widgets/issues/40".to_owned(),
            labels: vec!["docket-objective".to_owned()],
            assignees: vec![],
            author: Some("alice".to_owned()),
            created_at: at,
            updated_at: at,
            comments,
        }
    }

    fn comment(id: u64, body: &str) -> IssueComment {
        IssueComment {
            id,
            body: body.to_owned(),
            author: Some("alice".to_owned()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 31, 0).unwrap(),
        }
    }

    #[test]
    fn roadmap_from_issue_body() {
        let objective = Objective::from_document(&document(ROADMAP, vec![]), &BlockCodec::default())
            .expect("valid objective");
        assert!(objective.header.is_none());
        assert_eq!(objective.roadmap_comment_id, None);
        assert_eq!(objective.next_step().map(|n| n.id.as_str()), Some("1.2"));
        assert!(!objective.is_complete());
    }

    #[test]
    fn roadmap_from_named_comment() {
        let codec = BlockCodec::default();
        let header = MetadataBlock::new(
            OBJECTIVE_HEADER_KEY,
            [
                ("created_at".to_owned(), Value::from("2024-01-15T10:30:00Z")),
                ("created_by".to_owned(), Value::from("alice")),
                ("objective_comment_id".to_owned(), Value::from(501)),
            ]
            .into_iter()
            .collect(),
        );
        let body = codec.render_metadata_block(&header).unwrap();
        let done = ROADMAP.replace("| 1.2 | Second | pending |", "| 1.2 | Second | skipped |");
        let comments = vec![
            comment(500, "unrelated first comment"),
            comment(501, &codec.render_content_block(OBJECTIVE_BODY_KEY, "Objective", &done)),
        ];

        let objective = Objective::from_document(&document(&body, comments), &codec).unwrap();
        assert_eq!(objective.roadmap_comment_id, Some(501));
        assert_eq!(objective.phases.len(), 1);
        assert!(objective.is_complete());
        assert!(objective.next_step().is_none());
    }

    #[test]
    fn invalid_header_is_rejected() {
        let codec = BlockCodec::default();
        let header = MetadataBlock::new(
            OBJECTIVE_HEADER_KEY,
            [("slug".to_owned(), Value::from("ok-slug"))].into_iter().collect(),
        );
        let body = codec.render_metadata_block(&header).unwrap();
        let err = Objective::from_document(&document(&body, vec![]), &codec).unwrap_err();
        assert_eq!(err.missing_fields(), vec!["created_at", "created_by"]);
    }
}
