//! Shared test utilities for docket integration tests.
//!
//! Provides an in-memory [`FakeTracker`] implementing the tracker client
//! contract, document fixtures with fixed timestamps, and one-time test
//! logging setup.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use chrono::{DateTime, TimeZone, Utc};
use tracing_subscriber::EnvFilter;

use docket_core::tracker::{
    DocumentQuery, DocumentState, IssueComment, IssueDocument, LabelSpec, NewDocument,
    RepoLocation, TrackerClient, TrackerError,
};

/// First comment id handed out by [`FakeTracker`].
pub const FIRST_COMMENT_ID: u64 = 1000;

// -----------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------

/// The timestamp every fixture document is created at.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
        .single()
        .expect("fixed fixture timestamp is valid")
}

pub fn test_location() -> RepoLocation {
    RepoLocation::new("acme", "widgets")
}

/// An open document with no labels and no comments.
pub fn document(number: u64, title: &str, body: &str) -> IssueDocument {
    IssueDocument {
        number,
        title: title.to_owned(),
        body: body.to_owned(),
        state: DocumentState::Open,
        url: issue_url(number),
        labels: Vec::new(),
        assignees: Vec::new(),
        author: Some("alice".to_owned()),
        created_at: fixed_time(),
        updated_at: fixed_time(),
        comments: Vec::new(),
    }
}

pub fn comment(id: u64, body: &str) -> IssueComment {
    IssueComment {
        id,
        body: body.to_owned(),
        author: Some("alice".to_owned()),
        created_at: fixed_time(),
    }
}

fn issue_url(number: u64) -> String {
    format!("https://tracker.example/acme/widgets/issues/{number}")
}

// -----------------------------------------------------------------------
// Logging
// -----------------------------------------------------------------------

static INIT_TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Honours `RUST_LOG`; defaults to `warn`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// -----------------------------------------------------------------------
// FakeTracker
// -----------------------------------------------------------------------

#[derive(Debug)]
struct State {
    documents: BTreeMap<u64, IssueDocument>,
    labels: BTreeSet<String>,
    next_number: u64,
    next_comment_id: u64,
    body_writes: Vec<(u64, String)>,
    comment_writes: Vec<(u64, String)>,
    failure: Option<String>,
}

/// In-memory tracker for one repository.
///
/// Records every body and comment write so tests can assert on what was
/// (or was not) persisted. [`FakeTracker::fail_requests`] makes every call
/// fail with an upstream error until [`FakeTracker::recover`].
#[derive(Debug)]
pub struct FakeTracker {
    location: RepoLocation,
    state: Mutex<State>,
}

impl Default for FakeTracker {
    fn default() -> Self {
        Self::new(test_location())
    }
}

impl FakeTracker {
    pub fn new(location: RepoLocation) -> Self {
        Self {
            location,
            state: Mutex::new(State {
                documents: BTreeMap::new(),
                labels: BTreeSet::new(),
                next_number: 1,
                next_comment_id: FIRST_COMMENT_ID,
                body_writes: Vec::new(),
                comment_writes: Vec::new(),
                failure: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock the state for a request against `location`.
    fn request(&self, location: &RepoLocation) -> Result<MutexGuard<'_, State>, TrackerError> {
        let state = self.lock();
        if let Some(message) = &state.failure {
            return Err(TrackerError::Upstream(message.clone()));
        }
        if *location != self.location {
            return Err(TrackerError::Upstream(format!(
                "repository {location} is not served by this tracker"
            )));
        }
        Ok(state)
    }

    fn not_found(&self, number: u64) -> TrackerError {
        TrackerError::NotFound {
            location: self.location.to_string(),
            number,
        }
    }

    /// Seed a document. Later created documents get higher numbers.
    pub fn insert_document(&self, document: IssueDocument) {
        let mut state = self.lock();
        state.next_number = state.next_number.max(document.number + 1);
        for c in &document.comments {
            state.next_comment_id = state.next_comment_id.max(c.id + 1);
        }
        state.documents.insert(document.number, document);
    }

    pub fn document(&self, number: u64) -> Option<IssueDocument> {
        self.lock().documents.get(&number).cloned()
    }

    /// Every `update_document_body` call, in order.
    pub fn body_writes(&self) -> Vec<(u64, String)> {
        self.lock().body_writes.clone()
    }

    /// Every `add_comment` and `update_comment` call as `(issue or comment
    /// id, body)`, in order.
    pub fn comment_writes(&self) -> Vec<(u64, String)> {
        self.lock().comment_writes.clone()
    }

    pub fn labels(&self) -> BTreeSet<String> {
        self.lock().labels.clone()
    }

    pub fn fail_requests(&self, message: &str) {
        self.lock().failure = Some(message.to_owned());
    }

    pub fn recover(&self) {
        self.lock().failure = None;
    }
}

impl TrackerClient for FakeTracker {
    fn get_document(
        &self,
        location: &RepoLocation,
        number: u64,
    ) -> Result<IssueDocument, TrackerError> {
        let state = self.request(location)?;
        state
            .documents
            .get(&number)
            .cloned()
            .ok_or_else(|| self.not_found(number))
    }

    fn list_documents(
        &self,
        location: &RepoLocation,
        query: &DocumentQuery,
    ) -> Result<Vec<IssueDocument>, TrackerError> {
        let state = self.request(location)?;
        let matching = state
            .documents
            .values()
            .filter(|doc| query.labels.iter().all(|l| doc.labels.contains(l)))
            .filter(|doc| query.state.is_none_or(|s| doc.state == s))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    fn create_document(
        &self,
        location: &RepoLocation,
        new: &NewDocument,
    ) -> Result<IssueDocument, TrackerError> {
        let mut state = self.request(location)?;
        let number = state.next_number;
        state.next_number += 1;

        let mut doc = document(number, &new.title, &new.body);
        doc.labels = new.labels.clone();
        state.documents.insert(number, doc.clone());
        Ok(doc)
    }

    fn update_document_body(
        &self,
        location: &RepoLocation,
        number: u64,
        body: &str,
    ) -> Result<(), TrackerError> {
        let mut state = self.request(location)?;
        let doc = state
            .documents
            .get_mut(&number)
            .ok_or_else(|| self.not_found(number))?;
        doc.body = body.to_owned();
        state.body_writes.push((number, body.to_owned()));
        Ok(())
    }

    fn close_document(&self, location: &RepoLocation, number: u64) -> Result<(), TrackerError> {
        let mut state = self.request(location)?;
        let doc = state
            .documents
            .get_mut(&number)
            .ok_or_else(|| self.not_found(number))?;
        doc.state = DocumentState::Closed;
        Ok(())
    }

    fn add_comment(
        &self,
        location: &RepoLocation,
        number: u64,
        body: &str,
    ) -> Result<u64, TrackerError> {
        let mut state = self.request(location)?;
        let id = state.next_comment_id;
        let doc = state
            .documents
            .get_mut(&number)
            .ok_or_else(|| self.not_found(number))?;
        doc.comments.push(comment(id, body));
        state.next_comment_id += 1;
        state.comment_writes.push((number, body.to_owned()));
        Ok(id)
    }

    fn update_comment(
        &self,
        location: &RepoLocation,
        comment_id: u64,
        body: &str,
    ) -> Result<(), TrackerError> {
        let mut state = self.request(location)?;
        let comment = state
            .documents
            .values_mut()
            .flat_map(|doc| doc.comments.iter_mut())
            .find(|c| c.id == comment_id)
            .ok_or_else(|| TrackerError::CommentNotFound {
                location: self.location.to_string(),
                comment_id,
            })?;
        comment.body = body.to_owned();
        state.comment_writes.push((comment_id, body.to_owned()));
        Ok(())
    }

    fn list_comments(
        &self,
        location: &RepoLocation,
        number: u64,
    ) -> Result<Vec<IssueComment>, TrackerError> {
        let state = self.request(location)?;
        state
            .documents
            .get(&number)
            .map(|doc| doc.comments.clone())
            .ok_or_else(|| self.not_found(number))
    }

    fn ensure_label(&self, location: &RepoLocation, label: &LabelSpec) -> Result<bool, TrackerError> {
        let mut state = self.request(location)?;
        Ok(state.labels.insert(label.name.clone()))
    }
}
