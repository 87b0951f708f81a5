//! Metadata blocks embedded in issue documents.
//!
//! A metadata block is a delimited region of a markdown document that holds
//! structured YAML data. The [`codec`] locates, renders and splices blocks;
//! the [`accessor`] reads typed values out of a block's data.
//!
//! [`BlockData`] is the only dynamically typed representation in the crate.
//! It exists so arbitrary documents can be decoded before the owning schema
//! is known; callers convert to a typed record (see
//! [`crate::schema::HeaderRecord`]) right after validation.

pub mod accessor;
pub mod codec;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

pub use accessor::{format_timestamp, header_datetime, header_int, header_str, parse_timestamp};
pub use codec::{
    BlockCodec, BlockNotFound, DEFAULT_NAMESPACE, RenderError, find_metadata_block,
    render_metadata_block, replace_metadata_block_in_body,
};

/// Block key of the plan header, stored in the plan issue body.
pub const PLAN_HEADER_KEY: &str = "plan-header";
/// Block key of the objective header, stored in the objective issue body.
pub const OBJECTIVE_HEADER_KEY: &str = "objective-header";
/// Block key of implementation progress reports posted as comments.
pub const IMPLEMENTATION_STATUS_KEY: &str = "implementation-status";
/// Block key of plan events posted as comments.
pub const PLAN_EVENT_KEY: &str = "plan-event";
/// Content block key holding the plan text in the plan comment.
pub const PLAN_BODY_KEY: &str = "plan-body";
/// Content block key holding the objective text in the objective comment.
pub const OBJECTIVE_BODY_KEY: &str = "objective-body";

/// Insertion-ordered field mapping decoded from a block's YAML body.
pub type BlockData = IndexMap<String, Value>;

/// A keyed block of structured data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataBlock {
    /// Stable block identity, e.g. `plan-header`.
    pub key: String,
    /// Schema-defined fields.
    pub data: BlockData,
}

impl MetadataBlock {
    pub fn new(key: impl Into<String>, data: BlockData) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }

    /// Return a new block with `updates` merged over this block's data.
    ///
    /// Keys in `updates` override existing values in place; every other
    /// existing key is preserved, and new keys are appended in the order
    /// they appear in `updates`.
    pub fn merged(&self, updates: &BlockData) -> Self {
        let mut data = self.data.clone();
        for (field, value) in updates {
            data.insert(field.clone(), value.clone());
        }
        Self {
            key: self.key.clone(),
            data,
        }
    }
}
