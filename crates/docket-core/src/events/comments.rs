//! Event store backed by tracker comments.
//!
//! Each event is posted as a comment on the plan issue carrying a
//! `plan-event` metadata block, so the log travels with the issue and stays
//! readable on the tracker.

use tracing::debug;

use super::{PlanEvent, PlanEventStore, PlanEventType, matches_filter};
use crate::error::Result;
use crate::metadata::{BlockCodec, BlockData, MetadataBlock, PLAN_EVENT_KEY};
use crate::tracker::{RepoLocation, TrackerClient};

#[derive(Debug, Clone)]
pub struct CommentEventStore<C> {
    client: C,
    location: RepoLocation,
    codec: BlockCodec,
}

impl<C: TrackerClient> CommentEventStore<C> {
    pub fn new(client: C, location: RepoLocation) -> Self {
        Self::with_codec(client, location, BlockCodec::default())
    }

    pub fn with_codec(client: C, location: RepoLocation, codec: BlockCodec) -> Self {
        Self {
            client,
            location,
            codec,
        }
    }

    fn render_comment(&self, event: &PlanEvent) -> Result<String> {
        let data: BlockData = serde_yaml::from_value(serde_yaml::to_value(event)?)?;
        let block = self
            .codec
            .render_metadata_block(&MetadataBlock::new(PLAN_EVENT_KEY, data))?;
        Ok(format!("**Plan event:** `{}`\n\n{block}", event.event_type))
    }

    fn decode_comment(&self, comment_id: u64, body: &str) -> Option<PlanEvent> {
        let block = self.codec.find_metadata_block(body, PLAN_EVENT_KEY)?;
        let value = match serde_yaml::to_value(&block.data) {
            Ok(value) => value,
            Err(err) => {
                debug!(comment_id, error = %err, "skipping unencodable plan-event block");
                return None;
            }
        };
        match serde_yaml::from_value::<PlanEvent>(value) {
            Ok(event) => Some(event),
            Err(err) => {
                debug!(comment_id, error = %err, "skipping undecodable plan-event block");
                None
            }
        }
    }
}

impl<C: TrackerClient> PlanEventStore for CommentEventStore<C> {
    fn append_event(&self, plan_id: u64, event: PlanEvent) -> Result<()> {
        let body = self.render_comment(&event)?;
        let comment_id = self.client.add_comment(&self.location, plan_id, &body)?;
        debug!(plan = plan_id, comment_id, event_type = %event.event_type, "posted plan event");
        Ok(())
    }

    fn get_events(
        &self,
        plan_id: u64,
        event_types: Option<&[PlanEventType]>,
    ) -> Result<Vec<PlanEvent>> {
        let comments = self.client.list_comments(&self.location, plan_id)?;
        Ok(comments
            .iter()
            .filter_map(|c| self.decode_comment(c.id, &c.body))
            .filter(|e| matches_filter(e, event_types))
            .collect())
    }
}
