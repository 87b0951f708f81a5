//! Integration tests for `PlanStore` over the in-memory fake tracker.

use serde_yaml::Value;

use docket_core::metadata::{
    BlockCodec, BlockData, MetadataBlock, PLAN_BODY_KEY, PLAN_HEADER_KEY, RenderError,
};
use docket_core::objective::{NodeStatus, StepUpdate};
use docket_core::plan::{CreatePlanRequest, PlanQuery, PlanState, PlanStore};
use docket_core::schema::{ImplementationState, ImplementationStatus};
use docket_core::tracker::{DocumentState, TrackerError};
use docket_core::{DocketConfig, DocketError};
use docket_test_utils::{FakeTracker, comment, document, fixed_time, init_tracing, test_location};

fn data(pairs: &[(&str, Value)]) -> BlockData {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

fn header_doc(number: u64, header: &[(&str, Value)]) -> docket_core::tracker::IssueDocument {
    let block = MetadataBlock::new(PLAN_HEADER_KEY, data(header));
    let rendered = BlockCodec::default().render_metadata_block(&block).unwrap();
    let mut doc = document(
        number,
        "Add caching",
        &format!("Human-written intro.\n\n{rendered}\n\nTrailing notes stay put.\n"),
    );
    doc.labels = vec!["docket-plan".to_owned()];
    doc
}

fn store(tracker: &FakeTracker) -> PlanStore<&FakeTracker> {
    init_tracing();
    PlanStore::new(tracker, test_location())
}

// -----------------------------------------------------------------------
// update_plan_metadata
// -----------------------------------------------------------------------

#[test]
fn update_merges_into_existing_header() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("a", Value::from(1))]));

    let merged = store(&tracker)
        .update_plan_metadata(42, &data(&[("b", Value::from(2))]))
        .expect("update succeeds");
    assert_eq!(merged, data(&[("a", Value::from(1)), ("b", Value::from(2))]));

    let stored = tracker.document(42).unwrap();
    let block = BlockCodec::default()
        .find_metadata_block(&stored.body, PLAN_HEADER_KEY)
        .expect("header still decodes");
    assert_eq!(block.data, merged);
    assert!(stored.body.starts_with("Human-written intro.\n\n"));
    assert!(stored.body.ends_with("\n\nTrailing notes stay put.\n"));
    assert_eq!(tracker.body_writes().len(), 1);
}

#[test]
fn update_without_header_is_absent() {
    let tracker = FakeTracker::default();
    tracker.insert_document(document(42, "No header", "just text"));

    let err = store(&tracker)
        .update_plan_metadata(42, &data(&[("b", Value::from(2))]))
        .unwrap_err();
    assert!(
        matches!(err, DocketError::MissingBlock { number: 42, .. }),
        "got: {err}"
    );
    assert!(err.is_absent());
    assert!(tracker.body_writes().is_empty());
}

#[test]
fn update_with_undecodable_header_is_malformed() {
    let tracker = FakeTracker::default();
    let codec = BlockCodec::default();
    let body = format!(
        "{}\nnot a details section\n{}",
        codec.start_marker(PLAN_HEADER_KEY),
        codec.end_marker(PLAN_HEADER_KEY)
    );
    tracker.insert_document(document(42, "Broken", &body));

    let err = store(&tracker)
        .update_plan_metadata(42, &BlockData::new())
        .unwrap_err();
    assert!(
        matches!(err, DocketError::MalformedBlock { number: 42, .. }),
        "got: {err}"
    );
    assert!(!err.is_absent());
}

#[test]
fn update_unknown_plan_is_not_found() {
    let tracker = FakeTracker::default();
    let err = store(&tracker)
        .update_plan_metadata(7, &BlockData::new())
        .unwrap_err();
    assert!(matches!(err, DocketError::PlanNotFound { number: 7 }));
}

#[test]
fn failed_validation_prevents_write() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("created_by", Value::from("alice"))]));

    let err = store(&tracker)
        .update_plan_metadata(42, &data(&[("objective_issue", Value::from("not a number"))]))
        .unwrap_err();
    let schema_err = match err {
        DocketError::Validation(schema_err) => schema_err,
        other => panic!("expected validation error, got: {other}"),
    };
    assert_eq!(schema_err.key, PLAN_HEADER_KEY);
    assert!(tracker.body_writes().is_empty());
}

#[test]
fn sentinel_text_in_update_is_refused_before_write() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("created_by", Value::from("alice"))]));
    let closing = BlockCodec::default().end_marker(PLAN_HEADER_KEY);

    let err = store(&tracker)
        .update_plan_metadata(42, &data(&[("note", Value::from(closing))]))
        .unwrap_err();
    assert!(
        matches!(err, DocketError::Render(RenderError::SentinelInData { .. })),
        "got: {err}"
    );
    assert!(tracker.body_writes().is_empty());

    // The stored header is untouched and still accepts ordinary updates.
    let merged = store(&tracker)
        .update_plan_metadata(42, &data(&[("note", Value::from("fine"))]))
        .expect("plain update succeeds");
    assert_eq!(merged["note"], Value::from("fine"));
}

#[test]
fn update_reads_crlf_header() {
    let tracker = FakeTracker::default();
    let mut doc = header_doc(42, &[("a", Value::from(1))]);
    doc.body = doc.body.replace('\n', "\r\n");
    tracker.insert_document(doc);

    let merged = store(&tracker)
        .update_plan_metadata(42, &data(&[("b", Value::from(2))]))
        .expect("crlf header decodes");
    assert_eq!(merged, data(&[("a", Value::from(1)), ("b", Value::from(2))]));

    let stored = tracker.document(42).unwrap();
    assert!(stored.body.starts_with("Human-written intro.\r\n\r\n"));
    assert!(stored.body.ends_with("\r\n\r\nTrailing notes stay put.\r\n"));
    let block = BlockCodec::default()
        .find_metadata_block(&stored.body, PLAN_HEADER_KEY)
        .expect("header still decodes");
    assert_eq!(block.data, merged);
}

#[test]
fn accepted_naive_timestamp_decodes_into_typed_header() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("created_by", Value::from("alice"))]));
    let plans = store(&tracker);

    plans
        .update_plan_metadata(42, &data(&[("created_at", Value::from("2024-01-15T10:30:00"))]))
        .expect("naive timestamp passes the schema");

    let header = plans.get_plan(42).unwrap().header().expect("typed header decodes");
    assert_eq!(header.created_at, Some(fixed_time()));
    assert_eq!(header.created_by.as_deref(), Some("alice"));
}

#[test]
fn identical_update_skips_write() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("a", Value::from(1))]));
    let store = store(&tracker);

    store
        .update_plan_metadata(42, &data(&[("b", Value::from(2))]))
        .unwrap();
    let after_first = tracker.document(42).unwrap().body;
    store
        .update_plan_metadata(42, &data(&[("b", Value::from(2))]))
        .unwrap();

    assert_eq!(tracker.document(42).unwrap().body, after_first);
    assert_eq!(tracker.body_writes().len(), 1);
}

#[test]
fn tracker_failures_pass_through() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(42, &[("a", Value::from(1))]));
    tracker.fail_requests("rate limited");

    let err = store(&tracker).get_plan(42).unwrap_err();
    assert!(matches!(
        err,
        DocketError::Tracker(TrackerError::Upstream(ref message)) if message == "rate limited"
    ));

    tracker.recover();
    assert!(store(&tracker).get_plan(42).is_ok());
}

// -----------------------------------------------------------------------
// Plans
// -----------------------------------------------------------------------

#[test]
fn create_plan_writes_header_and_plan_comment() {
    let tracker = FakeTracker::default();
    let store = store(&tracker);

    let mut request = CreatePlanRequest::new("Add caching", "# Plan\n\n1. Cache things.", "alice");
    request.objective_id = Some(40);
    request.labels = vec!["area/cache".to_owned(), "docket-plan".to_owned()];
    let created = store.create_plan(&request).expect("plan created");

    assert!(tracker.labels().contains("docket-plan"));
    let doc = tracker.document(created.number).unwrap();
    assert_eq!(doc.labels, vec!["docket-plan", "area/cache"]);
    assert_eq!(doc.comments.len(), 1);
    assert_eq!(doc.comments[0].id, created.plan_comment_id);

    let plan = store.get_plan(created.number).unwrap();
    assert_eq!(plan.body, "# Plan\n\n1. Cache things.");
    assert_eq!(plan.objective_id, Some(40));
    assert_eq!(plan.header_str("created_by").as_deref(), Some("alice"));
    assert_eq!(plan.header_str("lifecycle_stage").as_deref(), Some("planned"));
    assert_eq!(
        plan.header_int("plan_comment_id"),
        Some(created.plan_comment_id as i64)
    );
    let header = plan.header().expect("typed header");
    assert_eq!(header.schema_version.as_deref(), Some("2"));
    assert!(header.created_at.is_some());
}

#[test]
fn create_plan_rejects_invalid_header_before_any_write() {
    let tracker = FakeTracker::default();
    let mut request = CreatePlanRequest::new("Bad", "content", "alice");
    request.source_repo = Some("no-slash".to_owned());

    let err = store(&tracker).create_plan(&request).unwrap_err();
    assert!(matches!(err, DocketError::Validation(_)), "got: {err}");
    assert!(tracker.labels().is_empty());
    assert!(tracker.document(1).is_none());
}

#[test]
fn list_plans_filters_by_label_and_state() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(1, &[("a", Value::from(1))]));
    let mut closed = header_doc(2, &[("a", Value::from(2))]);
    closed.state = DocumentState::Closed;
    tracker.insert_document(closed);
    tracker.insert_document(document(3, "Not a plan", "body"));

    let store = store(&tracker);
    let all: Vec<u64> = store
        .list_plans(&PlanQuery::default())
        .unwrap()
        .iter()
        .map(|p| p.number)
        .collect();
    assert_eq!(all, vec![1, 2]);

    let open = store
        .list_plans(&PlanQuery {
            state: Some(PlanState::Open),
            ..PlanQuery::default()
        })
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].number, 1);
    assert!(open[0].is_open());
}

#[test]
fn close_plan_comments_then_closes() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(5, &[("a", Value::from(1))]));

    store(&tracker)
        .close_plan(5, Some("Superseded by #6"))
        .unwrap();

    let doc = tracker.document(5).unwrap();
    assert_eq!(doc.state, DocumentState::Closed);
    assert_eq!(doc.comments.last().unwrap().body, "Superseded by #6");

    let err = store(&tracker).close_plan(99, None).unwrap_err();
    assert!(matches!(err, DocketError::PlanNotFound { number: 99 }));
}

#[test]
fn plan_body_prefers_named_comment() {
    let tracker = FakeTracker::default();
    let codec = BlockCodec::default();
    let mut doc = header_doc(
        8,
        &[("plan_comment_id", Value::from(2001))],
    );
    doc.comments = vec![
        comment(2000, "a discussion comment"),
        comment(2001, &codec.render_content_block(PLAN_BODY_KEY, "Plan", "the real plan")),
    ];
    tracker.insert_document(doc);

    let plan = store(&tracker).get_plan(8).unwrap();
    assert_eq!(plan.body, "the real plan");
    assert_eq!(plan.created_at, fixed_time());
    assert_eq!(plan.metadata["comment_count"], Value::from(2));
}

#[test]
fn post_implementation_status_validates_and_comments() {
    let tracker = FakeTracker::default();
    tracker.insert_document(header_doc(9, &[("a", Value::from(1))]));
    let store = store(&tracker);

    let status = ImplementationStatus {
        status: ImplementationState::InProgress,
        completed_nodes: 2,
        total_nodes: 5,
        timestamp: fixed_time(),
        summary: Some("halfway".to_owned()),
    };
    let id = store.post_implementation_status(9, &status).unwrap();
    let doc = tracker.document(9).unwrap();
    let posted = doc.comments.iter().find(|c| c.id == id).unwrap();
    let block = BlockCodec::default()
        .find_metadata_block(&posted.body, "implementation-status")
        .unwrap();
    assert_eq!(block.data["completed_nodes"], Value::from(2));

    let bad = ImplementationStatus {
        completed_nodes: 6,
        ..status
    };
    let err = store.post_implementation_status(9, &bad).unwrap_err();
    assert!(matches!(err, DocketError::Validation(_)));
    assert_eq!(tracker.document(9).unwrap().comments.len(), 1);
}

#[test]
fn from_config_uses_configured_namespace_and_labels() {
    let tracker = FakeTracker::default();
    let config = DocketConfig {
        namespace: "erk".to_owned(),
        plan_label: "erk-plan".to_owned(),
        repo: Some(test_location()),
        ..DocketConfig::default()
    };
    let store = PlanStore::from_config(&tracker, &config).unwrap();
    assert_eq!(store.plan_label(), "erk-plan");
    assert_eq!(store.codec().namespace(), "erk");

    let created = store
        .create_plan(&CreatePlanRequest::new("T", "c", "alice"))
        .unwrap();
    let body = tracker.document(created.number).unwrap().body;
    assert!(body.contains("<!-- erk:metadata-block:plan-header -->"));

    let no_repo = DocketConfig::default();
    assert!(PlanStore::from_config(&tracker, &no_repo).is_err());
}

// -----------------------------------------------------------------------
// Objectives
// -----------------------------------------------------------------------

const ROADMAP: &str = "\
## Phase 1: Foundations

| Step | Description | Status | Plan | PR |
|------|-------------|--------|------|----|
| 1.1 | Parse config | done | #2 | #3 |
| 1.2 | Wire store | pending | - | - |

## Phase 2: Rollout

| Step | Description | Status | Plan | PR |
|------|-------------|--------|------|----|
| 2.1 | Ship it | pending | - | - |
";

#[test]
fn objective_step_update_in_body() {
    let tracker = FakeTracker::default();
    let mut doc = document(40, "Objective: config", ROADMAP);
    doc.labels = vec!["docket-objective".to_owned()];
    tracker.insert_document(doc);
    let store = store(&tracker);

    let objective = store.get_objective(40).unwrap();
    assert_eq!(objective.next_step().map(|n| n.id.as_str()), Some("1.2"));

    let update = StepUpdate {
        status: Some(NodeStatus::Done),
        pr: Some("#7".to_owned()),
        ..StepUpdate::default()
    };
    let updated = store.update_objective_step(40, "1.2", &update).unwrap();
    assert_eq!(updated.next_step().map(|n| n.id.as_str()), Some("2.1"));
    assert_eq!(tracker.body_writes().len(), 1);
    assert!(
        tracker
            .document(40)
            .unwrap()
            .body
            .contains("| 1.2 | Wire store | done | - | #7 |")
    );

    let listed = store.list_objectives(None).unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn objective_step_update_in_comment() {
    let tracker = FakeTracker::default();
    let codec = BlockCodec::default();
    let mut doc = document(41, "Objective: comments", "Objective tracked below.");
    doc.comments = vec![comment(
        3000,
        &codec.render_content_block("objective-body", "Objective", ROADMAP),
    )];
    tracker.insert_document(doc);
    let store = store(&tracker);

    let update = StepUpdate {
        status: Some(NodeStatus::Skipped),
        ..StepUpdate::default()
    };
    let objective = store.update_objective_step(41, "1.2", &update).unwrap();
    assert_eq!(objective.roadmap_comment_id, Some(3000));
    assert_eq!(objective.next_step().map(|n| n.id.as_str()), Some("2.1"));

    assert!(tracker.body_writes().is_empty());
    let writes = tracker.comment_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].0, 3000);
    assert_eq!(
        tracker.document(41).unwrap().body,
        "Objective tracked below."
    );

    let err = store
        .update_objective_step(41, "9.9", &update)
        .unwrap_err();
    assert!(err.is_absent(), "got: {err}");
}

#[test]
fn missing_objective_is_not_found() {
    let tracker = FakeTracker::default();
    let err = store(&tracker).get_objective(404).unwrap_err();
    assert!(matches!(err, DocketError::ObjectiveNotFound { number: 404 }));
}
