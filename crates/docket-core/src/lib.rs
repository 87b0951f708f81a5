//! docket: plans and objectives stored as schema-validated metadata blocks
//! inside issue-tracker documents.
//!
//! The issue tracker is the single source of truth. A plan is an issue
//! whose body carries a `plan-header` block; an objective is an issue whose
//! roadmap (markdown phases and step tables) drives a dependency graph of
//! next actionable steps. [`plan::PlanStore`] ties the pieces together over
//! any [`tracker::TrackerClient`].

pub mod config;
pub mod error;
pub mod events;
pub mod metadata;
pub mod objective;
pub mod plan;
pub mod schema;
pub mod tracker;

pub use config::DocketConfig;
pub use error::{DocketError, Result};
pub use metadata::{BlockCodec, BlockData, MetadataBlock};
pub use objective::{DependencyGraph, NodeStatus, Objective, ObjectiveNode};
pub use plan::{Plan, PlanState, PlanStore};
pub use schema::{BlockSchema, SchemaError, SchemaRegistry};
pub use tracker::{RepoLocation, TrackerClient, TrackerError};
