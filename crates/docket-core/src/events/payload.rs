//! Per-event-type payload checks.
//!
//! Kept apart from the stores: producers validate before appending, stores
//! accept whatever they are given.

use super::{PlanEvent, PlanEventType};
use crate::metadata::{BlockData, PLAN_EVENT_KEY};
use crate::schema::{FieldChecks, SchemaError};

/// Payload fields every event of `event_type` must carry.
pub fn required_payload_fields(event_type: PlanEventType) -> &'static [&'static str] {
    match event_type {
        PlanEventType::Created => &["created_by"],
        PlanEventType::Queued => &[
            "submitted_by",
            "workflow_name",
            "run_id",
            "run_url",
            "validation_results",
        ],
        PlanEventType::WorkflowStarted => &["workflow_name", "run_id", "run_url"],
        PlanEventType::Progress => &["completed_nodes", "total_nodes"],
        PlanEventType::Completed => &[],
        PlanEventType::Failed => &["error"],
        PlanEventType::Retry => &["attempt"],
        PlanEventType::WorktreeCreated => &["worktree_name", "branch_name"],
    }
}

/// Check the payload shape of an event of `event_type`.
pub fn validate_payload(event_type: PlanEventType, data: &BlockData) -> Result<(), SchemaError> {
    let mut checks = FieldChecks::new(data);
    checks.required(required_payload_fields(event_type));

    match event_type {
        PlanEventType::Created => {
            checks.string("created_by");
        }
        PlanEventType::Queued => {
            checks.string("submitted_by");
            checks.string("workflow_name");
            checks.string("run_url");
            checks.mapping("validation_results");
        }
        PlanEventType::WorkflowStarted => {
            checks.string("workflow_name");
            checks.string("run_url");
        }
        PlanEventType::Progress => {
            let completed = checks.integer("completed_nodes");
            let total = checks.integer("total_nodes");
            if let (Some(done), Some(total)) = (completed, total) {
                if done > total {
                    checks.violate(
                        "completed_nodes",
                        format!("must not exceed total_nodes ({done} > {total})"),
                    );
                }
            }
        }
        PlanEventType::Completed => {}
        PlanEventType::Failed => {
            checks.string("error");
        }
        PlanEventType::Retry => {
            checks.positive_integer("attempt");
        }
        PlanEventType::WorktreeCreated => {
            checks.string("worktree_name");
            checks.string("branch_name");
        }
    }

    checks.finish(&format!("{PLAN_EVENT_KEY}:{event_type}"))
}

pub fn validate_event(event: &PlanEvent) -> Result<(), SchemaError> {
    validate_payload(event.event_type, &event.data)
}

#[cfg(test)]
mod tests {
    use serde_yaml::{Mapping, Value};

    use super::*;

    fn data(pairs: &[(&str, Value)]) -> BlockData {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn queued_names_every_missing_field() {
        let err = validate_payload(PlanEventType::Queued, &data(&[("run_id", Value::from("42"))]))
            .unwrap_err();
        assert_eq!(
            err.missing_fields(),
            vec!["submitted_by", "workflow_name", "run_url", "validation_results"]
        );
        assert_eq!(err.key, "plan-event:queued");
    }

    #[test]
    fn queued_requires_mapping_results() {
        let mut ok = data(&[
            ("submitted_by", Value::from("alice")),
            ("workflow_name", Value::from("implement")),
            ("run_id", Value::from(42)),
            ("run_url", Value::from("https://ci.example/runs/42")),
            ("validation_results", Value::Mapping(Mapping::new())),
        ]);
        assert!(validate_payload(PlanEventType::Queued, &ok).is_ok());

        ok.insert("validation_results".to_owned(), Value::from("passed"));
        assert!(validate_payload(PlanEventType::Queued, &ok).is_err());
    }

    #[test]
    fn completed_accepts_empty_payload() {
        let event = PlanEvent::new(PlanEventType::Completed, BlockData::new());
        assert!(validate_event(&event).is_ok());
    }

    #[test]
    fn retry_attempt_must_be_positive() {
        let err = validate_payload(PlanEventType::Retry, &data(&[("attempt", Value::from(0))]))
            .unwrap_err();
        assert_eq!(err.violations.len(), 1);
    }

    #[test]
    fn progress_counts_are_checked() {
        let err = validate_payload(
            PlanEventType::Progress,
            &data(&[("completed_nodes", Value::from(4)), ("total_nodes", Value::from(3))]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("4 > 3"));
    }
}
