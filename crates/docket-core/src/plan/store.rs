//! Plan store: plan and objective operations over a [`TrackerClient`].
//!
//! Reads never mutate the tracker. Every write validates the block it is
//! about to persist first; a failed validation means no tracker call is
//! made.

use anyhow::Context;
use chrono::Utc;
use serde_yaml::Value;
use tracing::{debug, info};

use super::{Plan, PlanState};
use crate::config::DocketConfig;
use crate::error::{DocketError, Result};
use crate::events::CommentEventStore;
use crate::metadata::{
    BlockCodec, BlockData, OBJECTIVE_BODY_KEY, PLAN_BODY_KEY, PLAN_HEADER_KEY,
};
use crate::objective::{Objective, StepUpdate, update_roadmap_step};
use crate::schema::{HeaderRecord, ImplementationStatus, PlanHeader, SchemaRegistry};
use crate::tracker::{
    DocumentQuery, DocumentState, IssueDocument, LabelSpec, NewDocument, RepoLocation,
    TrackerClient, TrackerError,
};

/// Default label applied to plan issues.
pub const DEFAULT_PLAN_LABEL: &str = "docket-plan";
/// Default label applied to objective issues.
pub const DEFAULT_OBJECTIVE_LABEL: &str = "docket-objective";

const PLAN_LABEL_COLOR: &str = "0E8A16";
const PLAN_BODY_TITLE: &str = "Plan";

/// Filter for [`PlanStore::list_plans`]. The plan label is always applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanQuery {
    pub state: Option<PlanState>,
    /// Extra labels every returned plan must carry.
    pub labels: Vec<String>,
    pub limit: Option<usize>,
}

/// Parameters for [`PlanStore::create_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePlanRequest {
    pub title: String,
    /// Plan text, stored as markdown in the plan comment.
    pub content: String,
    pub created_by: String,
    /// Labels in addition to the plan label.
    pub labels: Vec<String>,
    pub objective_id: Option<u64>,
    pub worktree_name: Option<String>,
    pub branch_name: Option<String>,
    pub source_repo: Option<String>,
}

impl CreatePlanRequest {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created_by: created_by.into(),
            labels: Vec::new(),
            objective_id: None,
            worktree_name: None,
            branch_name: None,
            source_repo: None,
        }
    }
}

/// Result of [`PlanStore::create_plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlan {
    pub number: u64,
    pub url: String,
    pub plan_comment_id: u64,
}

pub struct PlanStore<C> {
    client: C,
    location: RepoLocation,
    codec: BlockCodec,
    registry: SchemaRegistry,
    plan_label: String,
    objective_label: String,
}

impl<C: TrackerClient> PlanStore<C> {
    /// A store using the default namespace, labels and schemas.
    pub fn new(client: C, location: RepoLocation) -> Self {
        Self {
            client,
            location,
            codec: BlockCodec::default(),
            registry: SchemaRegistry::standard(),
            plan_label: DEFAULT_PLAN_LABEL.to_owned(),
            objective_label: DEFAULT_OBJECTIVE_LABEL.to_owned(),
        }
    }

    /// A store configured from resolved settings. Fails when no repository
    /// is configured.
    pub fn from_config(client: C, config: &DocketConfig) -> anyhow::Result<Self> {
        let location = config.repo.clone().context(
            "no tracker repository configured (set DOCKET_REPO or `repo` in config.toml)",
        )?;
        Ok(Self::new(client, location)
            .with_codec(BlockCodec::new(config.namespace.clone()))
            .with_labels(config.plan_label.clone(), config.objective_label.clone()))
    }

    pub fn with_codec(mut self, codec: BlockCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_labels(
        mut self,
        plan_label: impl Into<String>,
        objective_label: impl Into<String>,
    ) -> Self {
        self.plan_label = plan_label.into();
        self.objective_label = objective_label.into();
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn location(&self) -> &RepoLocation {
        &self.location
    }

    pub fn codec(&self) -> &BlockCodec {
        &self.codec
    }

    pub fn plan_label(&self) -> &str {
        &self.plan_label
    }

    pub fn objective_label(&self) -> &str {
        &self.objective_label
    }

    /// An event store that logs plan events as comments through this
    /// store's client.
    pub fn comment_events(&self) -> CommentEventStore<&C> {
        CommentEventStore::with_codec(&self.client, self.location.clone(), self.codec.clone())
    }

    // -----------------------------------------------------------------------
    // Plans
    // -----------------------------------------------------------------------

    pub fn get_plan(&self, number: u64) -> Result<Plan> {
        let doc = self.fetch_plan(number)?;
        Ok(Plan::from_document(&doc, &self.codec))
    }

    pub fn list_plans(&self, query: &PlanQuery) -> Result<Vec<Plan>> {
        let mut labels = vec![self.plan_label.clone()];
        labels.extend(
            query
                .labels
                .iter()
                .filter(|l| **l != self.plan_label)
                .cloned(),
        );
        let doc_query = DocumentQuery {
            labels,
            state: query.state.map(|state| match state {
                PlanState::Open => DocumentState::Open,
                PlanState::Closed => DocumentState::Closed,
            }),
            limit: query.limit,
        };

        let docs = self.client.list_documents(&self.location, &doc_query)?;
        Ok(docs
            .iter()
            .map(|doc| Plan::from_document(doc, &self.codec))
            .collect())
    }

    /// Create a plan issue with a fresh header and a plan comment holding
    /// `request.content`.
    pub fn create_plan(&self, request: &CreatePlanRequest) -> Result<CreatedPlan> {
        let mut header = PlanHeader::new(request.created_by.clone(), Utc::now());
        header.objective_issue = request.objective_id;
        header.worktree_name = request.worktree_name.clone();
        header.branch_name = request.branch_name.clone();
        header.source_repo = request.source_repo.clone();
        let block = header.to_block()?;
        let body = self.codec.render_metadata_block(&block)?;

        self.ensure_label(&LabelSpec::new(
            self.plan_label.clone(),
            "Implementation plan",
            PLAN_LABEL_COLOR,
        ))?;

        let mut labels = vec![self.plan_label.clone()];
        for label in &request.labels {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        let doc = self.client.create_document(
            &self.location,
            &NewDocument {
                title: request.title.clone(),
                body,
                labels,
            },
        )?;

        let comment = self
            .codec
            .render_content_block(PLAN_BODY_KEY, PLAN_BODY_TITLE, &request.content);
        let plan_comment_id = self.client.add_comment(&self.location, doc.number, &comment)?;

        let mut updates = BlockData::new();
        updates.insert("plan_comment_id".to_owned(), Value::from(plan_comment_id));
        self.update_plan_metadata(doc.number, &updates)?;

        info!(plan = doc.number, plan_comment_id, "created plan");
        Ok(CreatedPlan {
            number: doc.number,
            url: doc.url,
            plan_comment_id,
        })
    }

    /// Merge `updates` into the plan header and write it back.
    ///
    /// Keys in `updates` override existing values; all other fields are
    /// kept in their original order. The merged header is validated before
    /// anything is written, and an unchanged document is not written at
    /// all. Returns the merged header data.
    ///
    /// There is no revision check: concurrent updates to the same plan are
    /// last-write-wins.
    pub fn update_plan_metadata(&self, number: u64, updates: &BlockData) -> Result<BlockData> {
        let doc = self.fetch_plan(number)?;

        let Some(block) = self.codec.find_metadata_block(&doc.body, PLAN_HEADER_KEY) else {
            let key = PLAN_HEADER_KEY.to_owned();
            return Err(if self.codec.has_block_markers(&doc.body, PLAN_HEADER_KEY) {
                DocketError::MalformedBlock { number, key }
            } else {
                DocketError::MissingBlock { number, key }
            });
        };

        let merged = block.merged(updates);
        self.registry.validate(PLAN_HEADER_KEY, &merged.data)?;

        let rendered = self.codec.render_metadata_block(&merged)?;
        let body = self
            .codec
            .replace_metadata_block_in_body(&doc.body, PLAN_HEADER_KEY, &rendered)
            .map_err(|_| DocketError::MissingBlock {
                number,
                key: PLAN_HEADER_KEY.to_owned(),
            })?;

        if body == doc.body {
            debug!(plan = number, "plan header unchanged, skipping write");
        } else {
            self.client
                .update_document_body(&self.location, number, &body)
                .map_err(|e| plan_absent(e, number))?;
            info!(
                plan = number,
                fields = updates.len(),
                "updated plan header"
            );
        }

        Ok(merged.data)
    }

    /// Optionally comment, then close the plan issue.
    pub fn close_plan(&self, number: u64, comment: Option<&str>) -> Result<()> {
        if let Some(comment) = comment {
            self.client
                .add_comment(&self.location, number, comment)
                .map_err(|e| plan_absent(e, number))?;
        }
        self.client
            .close_document(&self.location, number)
            .map_err(|e| plan_absent(e, number))?;
        info!(plan = number, "closed plan");
        Ok(())
    }

    /// Create `label` if missing. Returns `true` when it was created.
    pub fn ensure_label(&self, label: &LabelSpec) -> Result<bool> {
        let created = self.client.ensure_label(&self.location, label)?;
        if created {
            info!(label = %label.name, "created label");
        }
        Ok(created)
    }

    /// Post a validated `implementation-status` block as a comment on the
    /// plan. Returns the comment id.
    pub fn post_implementation_status(
        &self,
        number: u64,
        status: &ImplementationStatus,
    ) -> Result<u64> {
        let block = status.to_block()?;
        let body = self.codec.render_metadata_block(&block)?;
        let comment_id = self
            .client
            .add_comment(&self.location, number, &body)
            .map_err(|e| plan_absent(e, number))?;
        info!(
            plan = number,
            comment_id,
            status = %status.status,
            completed = status.completed_nodes,
            total = status.total_nodes,
            "posted implementation status"
        );
        Ok(comment_id)
    }

    // -----------------------------------------------------------------------
    // Objectives
    // -----------------------------------------------------------------------

    pub fn get_objective(&self, number: u64) -> Result<Objective> {
        let doc = self.fetch_objective(number)?;
        Ok(Objective::from_document(&doc, &self.codec)?)
    }

    /// Objectives carrying the objective label, optionally filtered by state.
    pub fn list_objectives(&self, state: Option<DocumentState>) -> Result<Vec<Objective>> {
        let query = DocumentQuery {
            labels: vec![self.objective_label.clone()],
            state,
            limit: None,
        };
        let docs = self.client.list_documents(&self.location, &query)?;
        let objectives = docs
            .iter()
            .map(|doc| Objective::from_document(doc, &self.codec))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(objectives)
    }

    /// Rewrite one roadmap row of an objective and return the objective as
    /// re-read from the new text.
    pub fn update_objective_step(
        &self,
        number: u64,
        step_id: &str,
        update: &StepUpdate,
    ) -> Result<Objective> {
        let mut doc = self.fetch_objective(number)?;
        let objective = Objective::from_document(&doc, &self.codec)?;

        match objective.roadmap_comment_id {
            Some(comment_id) => {
                let missing = || DocketError::MissingBlock {
                    number,
                    key: OBJECTIVE_BODY_KEY.to_owned(),
                };
                let comment = doc
                    .comments
                    .iter_mut()
                    .find(|c| c.id == comment_id)
                    .ok_or_else(missing)?;
                let span = self
                    .codec
                    .block_span(&comment.body, OBJECTIVE_BODY_KEY)
                    .ok_or_else(missing)?;

                let block = update_roadmap_step(&comment.body[span.clone()], step_id, update)?;
                let mut body = String::with_capacity(comment.body.len() + 16);
                body.push_str(&comment.body[..span.start]);
                body.push_str(&block);
                body.push_str(&comment.body[span.end..]);

                if body != comment.body {
                    self.client
                        .update_comment(&self.location, comment_id, &body)?;
                    info!(objective = number, comment_id, step = step_id, "updated roadmap step");
                }
                comment.body = body;
            }
            None => {
                let body = update_roadmap_step(&doc.body, step_id, update)?;
                if body != doc.body {
                    self.client
                        .update_document_body(&self.location, number, &body)
                        .map_err(|e| objective_absent(e, number))?;
                    info!(objective = number, step = step_id, "updated roadmap step");
                }
                doc.body = body;
            }
        }

        Ok(Objective::from_document(&doc, &self.codec)?)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fetch_plan(&self, number: u64) -> Result<IssueDocument> {
        self.client
            .get_document(&self.location, number)
            .map_err(|e| plan_absent(e, number))
    }

    fn fetch_objective(&self, number: u64) -> Result<IssueDocument> {
        self.client
            .get_document(&self.location, number)
            .map_err(|e| objective_absent(e, number))
    }
}

impl<C> std::fmt::Debug for PlanStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanStore")
            .field("location", &self.location)
            .field("codec", &self.codec)
            .field("registry", &self.registry)
            .field("plan_label", &self.plan_label)
            .field("objective_label", &self.objective_label)
            .finish_non_exhaustive()
    }
}

fn plan_absent(err: TrackerError, number: u64) -> DocketError {
    match err {
        TrackerError::NotFound { .. } => DocketError::PlanNotFound { number },
        other => other.into(),
    }
}

fn objective_absent(err: TrackerError, number: u64) -> DocketError {
    match err {
        TrackerError::NotFound { .. } => DocketError::ObjectiveNotFound { number },
        other => other.into(),
    }
}
