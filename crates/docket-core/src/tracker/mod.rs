//! The issue-tracker client contract.
//!
//! docket never talks to a tracker directly. It consumes this trait, which
//! a transport crate implements for a concrete tracker. Calls are
//! synchronous and may block on I/O; retries, timeouts and authentication
//! belong to the implementation.
//!
//! ```text
//! PlanStore ---get_document(n)-----------> TrackerClient
//!     |     <--IssueDocument { body, comments, .. }
//!     |
//!     |  codec: find / merge / validate / render / splice
//!     |
//!     +------update_document_body(n, body)-> TrackerClient
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Repository (or project) that holds the issue documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoLocation {
    pub owner: String,
    pub name: String,
}

impl RepoLocation {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoLocation {
    type Err = RepoLocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(RepoLocationParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid `owner/name` string.
#[derive(Debug, Clone)]
pub struct RepoLocationParseError(pub String);

impl fmt::Display for RepoLocationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid repository location {:?} (expected owner/name)", self.0)
    }
}

impl std::error::Error for RepoLocationParseError {}

/// Open/closed state of an issue document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    Open,
    Closed,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An issue as returned by the tracker, comments included in creation
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDocument {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: DocumentState,
    pub url: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub comments: Vec<IssueComment>,
}

impl IssueDocument {
    /// The comment with `id`, or the first comment when `id` is `None`.
    ///
    /// Plans and objectives keep their text in such a comment.
    pub fn comment_or_first(&self, id: Option<u64>) -> Option<&IssueComment> {
        match id {
            Some(id) => self.comments.iter().find(|c| c.id == id),
            None => self.comments.first(),
        }
    }
}

/// Parameters for creating an issue document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

/// Filter for listing issue documents. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    /// Documents must carry every one of these labels.
    pub labels: Vec<String>,
    pub state: Option<DocumentState>,
    pub limit: Option<usize>,
}

/// A label to make sure exists on the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    pub name: String,
    pub description: String,
    /// Hex colour without the leading `#`.
    pub color: String,
}

impl LabelSpec {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            color: color.into(),
        }
    }
}

/// Failures reported by a tracker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error("issue #{number} not found in {location}")]
    NotFound { location: String, number: u64 },

    #[error("comment {comment_id} not found in {location}")]
    CommentNotFound { location: String, comment_id: u64 },

    /// Network, authentication, rate limiting and other transport failures.
    #[error("tracker request failed: {0}")]
    Upstream(String),
}

/// Read/write access to issue documents.
///
/// Object safe, so callers may hold a `Box<dyn TrackerClient>`.
pub trait TrackerClient: Send + Sync {
    fn get_document(&self, location: &RepoLocation, number: u64)
    -> Result<IssueDocument, TrackerError>;

    fn list_documents(
        &self,
        location: &RepoLocation,
        query: &DocumentQuery,
    ) -> Result<Vec<IssueDocument>, TrackerError>;

    fn create_document(
        &self,
        location: &RepoLocation,
        document: &NewDocument,
    ) -> Result<IssueDocument, TrackerError>;

    fn update_document_body(
        &self,
        location: &RepoLocation,
        number: u64,
        body: &str,
    ) -> Result<(), TrackerError>;

    fn close_document(&self, location: &RepoLocation, number: u64) -> Result<(), TrackerError>;

    /// Post a comment and return its id.
    fn add_comment(
        &self,
        location: &RepoLocation,
        number: u64,
        body: &str,
    ) -> Result<u64, TrackerError>;

    fn update_comment(
        &self,
        location: &RepoLocation,
        comment_id: u64,
        body: &str,
    ) -> Result<(), TrackerError>;

    /// Comments in creation order.
    fn list_comments(
        &self,
        location: &RepoLocation,
        number: u64,
    ) -> Result<Vec<IssueComment>, TrackerError>;

    /// Create the label if it is missing. Returns `true` when it was
    /// created.
    fn ensure_label(&self, location: &RepoLocation, label: &LabelSpec) -> Result<bool, TrackerError>;
}

// Compile-time assertion: TrackerClient must be usable as `dyn TrackerClient`.
const _: () = {
    fn _assert_object_safe(_: &dyn TrackerClient) {}
};

macro_rules! forward_tracker_client {
    (<$t:ident> $($ptr:ty),+) => {$(
        impl<$t: TrackerClient + ?Sized> TrackerClient for $ptr {
            fn get_document(
                &self,
                location: &RepoLocation,
                number: u64,
            ) -> Result<IssueDocument, TrackerError> {
                (**self).get_document(location, number)
            }

            fn list_documents(
                &self,
                location: &RepoLocation,
                query: &DocumentQuery,
            ) -> Result<Vec<IssueDocument>, TrackerError> {
                (**self).list_documents(location, query)
            }

            fn create_document(
                &self,
                location: &RepoLocation,
                document: &NewDocument,
            ) -> Result<IssueDocument, TrackerError> {
                (**self).create_document(location, document)
            }

            fn update_document_body(
                &self,
                location: &RepoLocation,
                number: u64,
                body: &str,
            ) -> Result<(), TrackerError> {
                (**self).update_document_body(location, number, body)
            }

            fn close_document(
                &self,
                location: &RepoLocation,
                number: u64,
            ) -> Result<(), TrackerError> {
                (**self).close_document(location, number)
            }

            fn add_comment(
                &self,
                location: &RepoLocation,
                number: u64,
                body: &str,
            ) -> Result<u64, TrackerError> {
                (**self).add_comment(location, number, body)
            }

            fn update_comment(
                &self,
                location: &RepoLocation,
                comment_id: u64,
                body: &str,
            ) -> Result<(), TrackerError> {
                (**self).update_comment(location, comment_id, body)
            }

            fn list_comments(
                &self,
                location: &RepoLocation,
                number: u64,
            ) -> Result<Vec<IssueComment>, TrackerError> {
                (**self).list_comments(location, number)
            }

            fn ensure_label(
                &self,
                location: &RepoLocation,
                label: &LabelSpec,
            ) -> Result<bool, TrackerError> {
                (**self).ensure_label(location, label)
            }
        }
    )+};
}

forward_tracker_client!(<T> &T, Arc<T>, Box<T>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_location_parses_and_displays() {
        let loc: RepoLocation = "acme/widgets".parse().expect("valid");
        assert_eq!(loc, RepoLocation::new("acme", "widgets"));
        assert_eq!(loc.to_string(), "acme/widgets");
    }

    #[test]
    fn repo_location_rejects_bad_input() {
        for bad in ["", "acme", "/widgets", "acme/", "a/b/c"] {
            assert!(bad.parse::<RepoLocation>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn tracker_error_messages() {
        let err = TrackerError::NotFound {
            location: "acme/widgets".to_owned(),
            number: 7,
        };
        assert_eq!(err.to_string(), "issue #7 not found in acme/widgets");
        assert_eq!(
            TrackerError::Upstream("rate limited".to_owned()).to_string(),
            "tracker request failed: rate limited"
        );
    }
}
