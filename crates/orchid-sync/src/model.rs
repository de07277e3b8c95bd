// SPDX-License-Identifier: Apache-2.0

//! Local record types replicated through the document store.
//!
//! Field names serialize in camelCase because that is how the document
//! store materializes its projection. Timestamps are epoch milliseconds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Collections in the document store that the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Issue records.
    Issues,
    /// Reply records.
    Replies,
}

impl Collection {
    /// Returns the collection name used by the document store.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Issues => "issues",
            Collection::Replies => "replies",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow status of a local issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Not yet planned.
    Backlog,
    /// Planned.
    Todo,
    /// Being worked on.
    InProgress,
    /// Awaiting review.
    InReview,
    /// Finished.
    Done,
    /// Dropped.
    Canceled,
}

impl IssueStatus {
    /// Every status, in workflow order.
    pub const ALL: [IssueStatus; 6] = [
        IssueStatus::Backlog,
        IssueStatus::Todo,
        IssueStatus::InProgress,
        IssueStatus::InReview,
        IssueStatus::Done,
        IssueStatus::Canceled,
    ];

    /// Returns the serialized name (e.g. `in_progress`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Backlog => "backlog",
            IssueStatus::Todo => "todo",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::InReview => "in_review",
            IssueStatus::Done => "done",
            IssueStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| format!("unknown issue status '{s}'"))
    }
}

/// Severity of a local issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic or minor.
    Low,
    /// Default severity.
    Medium,
    /// Significant impact.
    High,
    /// Outage or data loss.
    Critical,
}

impl Severity {
    /// Every severity, least severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Returns the serialized name (e.g. `high`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str() == normalized)
            .ok_or_else(|| format!("unknown severity '{s}'"))
    }
}

/// GitHub synchronization state of a local record.
///
/// Transitions: `pending → creating → {synced | error}`, and
/// `error → creating` when the user re-enqueues.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Never attempted.
    #[default]
    Pending,
    /// A worker is (or very recently was) in flight.
    Creating,
    /// Linked to a GitHub issue or comment.
    Synced,
    /// The last attempt failed; see `githubSyncError`.
    Error,
}

impl SyncStatus {
    /// Returns the serialized name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Creating => "creating",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }

    /// Whether an enqueue call may start a new sync from this state.
    #[must_use]
    pub fn accepts_enqueue(&self) -> bool {
        match self {
            SyncStatus::Pending | SyncStatus::Error => true,
            SyncStatus::Creating | SyncStatus::Synced => false,
        }
    }

    /// Validates a transition and returns the new status.
    pub fn transition(self, next: SyncStatus) -> Result<SyncStatus, SyncError> {
        let allowed = matches!(
            (self, next),
            (SyncStatus::Pending | SyncStatus::Error, SyncStatus::Creating)
                | (SyncStatus::Creating, SyncStatus::Synced | SyncStatus::Error)
        );
        if allowed {
            Ok(next)
        } else {
            Err(SyncError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display identity of a record author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Avatar color.
    #[serde(default)]
    pub color: String,
}

/// A locally-authored issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Stable merge key.
    pub id: String,
    /// Issue title.
    pub title: String,
    /// Markdown body.
    #[serde(default)]
    pub body: String,
    /// Workflow status.
    pub status: IssueStatus,
    /// Explicit severity, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// Creation time.
    pub created_at: i64,
    /// Last modification time.
    pub updated_at: i64,
    /// Author.
    #[serde(default)]
    pub created_by: Author,
    /// Target repository (`owner/repo`), overriding the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_repo: Option<String>,
    /// URL of the linked GitHub issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_issue_url: Option<String>,
    /// Number of the linked GitHub issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_issue_number: Option<u64>,
    /// Sync state.
    #[serde(default)]
    pub github_sync_status: SyncStatus,
    /// Last recorded sync failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_sync_error: Option<String>,
    /// When the issue was last linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_synced_at: Option<i64>,
}

impl Issue {
    /// Whether the issue already points at a GitHub issue.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.github_issue_url.is_some()
    }

    /// Explicit severity, falling back to a `## Severity` section in the body.
    #[must_use]
    pub fn effective_severity(&self) -> Option<Severity> {
        self.severity
            .or_else(|| crate::sync::body::parse_severity_section(&self.body))
    }
}

/// Kind of a reply. Only [`ReplyKind::Reply`] is mirrored to GitHub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Public reply, posted as a GitHub comment.
    #[default]
    Reply,
    /// Internal comment, kept local.
    Comment,
}

/// A reply in an issue thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Stable merge key.
    pub id: String,
    /// Parent issue id. May not resolve yet while replication catches up.
    pub issue_id: String,
    /// Reply kind.
    #[serde(rename = "type", default)]
    pub kind: ReplyKind,
    /// Markdown body.
    #[serde(default)]
    pub body: String,
    /// Creation time.
    pub created_at: i64,
    /// Author.
    #[serde(default)]
    pub author: Author,
    /// Id of the linked GitHub comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_comment_id: Option<u64>,
    /// URL of the linked GitHub comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_comment_url: Option<String>,
    /// Sync state.
    #[serde(default)]
    pub github_sync_status: SyncStatus,
    /// Last recorded sync failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_sync_error: Option<String>,
    /// When the reply was linked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_synced_at: Option<i64>,
}

impl Reply {
    /// Whether the reply already points at a GitHub comment.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.github_comment_id.is_some()
    }
}
