// SPDX-License-Identifier: Apache-2.0

//! GitHub integration module.
//!
//! Defines the typed REST surface the sync workers consume ([`GithubApi`]),
//! its `octocrab` implementation, GitHub App credentials, and the managed
//! label reconciler.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::SyncError;

pub mod auth;
pub mod client;
pub mod labels;

pub use auth::{AppCredentialProvider, CredentialProvider, StaticTokenProvider};
pub use client::OctocrabClient;

/// Value of the `X-GitHub-Api-Version` header sent with every call.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// A repository in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Creates a repository reference.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        parse_owner_repo(s.trim())
    }
}

/// Parses an owner/repo string.
///
/// Validates format: exactly one `/`, non-empty parts.
pub fn parse_owner_repo(s: &str) -> Result<RepoRef> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(SyncError::Config {
            message: format!("invalid repository '{s}', expected owner/repo"),
        });
    }
    Ok(RepoRef::new(parts[0], parts[1]))
}

/// Authenticated target of a group of REST calls.
#[derive(Debug, Clone)]
pub struct Session {
    /// Bearer token attached to every call.
    pub token: SecretString,
    /// Repository the calls operate on.
    pub repo: RepoRef,
}

impl Session {
    /// Creates a session.
    #[must_use]
    pub fn new(token: SecretString, repo: RepoRef) -> Self {
        Self { token, repo }
    }
}

/// An issue returned by the search endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Issue number.
    pub number: u64,
    /// HTML URL of the issue.
    pub url: String,
    /// Issue body, when the API returned one.
    pub body: Option<String>,
}

/// Issue creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    /// Title.
    pub title: String,
    /// Markdown body.
    pub body: String,
    /// Labels to apply on creation.
    pub labels: Vec<String>,
}

/// Number and URL of an issue on GitHub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueLink {
    /// Issue number.
    pub number: u64,
    /// HTML URL.
    pub url: String,
}

/// A repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label name.
    pub name: String,
    /// Hex color without `#`.
    #[serde(default)]
    pub color: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Label creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSpec {
    /// Label name.
    pub name: String,
    /// Hex color without `#`.
    pub color: String,
    /// Description.
    pub description: String,
}

/// A comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Comment id.
    pub id: u64,
    /// HTML URL.
    pub url: String,
    /// Markdown body.
    pub body: String,
}

/// Id and URL of a created comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentLink {
    /// Comment id.
    pub id: u64,
    /// HTML URL.
    pub url: String,
}

/// The GitHub REST operations the sync workers use.
///
/// Non-2xx responses surface as [`SyncError::GitHubApi`], except that a 404
/// from a "get" style call yields `None`.
#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Full-text issue search.
    async fn search_issues(&self, session: &Session, query: &str) -> Result<Vec<SearchHit>>;

    /// Creates an issue.
    async fn create_issue(&self, session: &Session, issue: &NewIssue) -> Result<IssueLink>;

    /// Looks up a repository label by name.
    async fn get_label(&self, session: &Session, name: &str) -> Result<Option<Label>>;

    /// Creates a repository label.
    async fn create_label(&self, session: &Session, label: &LabelSpec) -> Result<Label>;

    /// Replaces the full label set of an issue.
    async fn set_issue_labels(&self, session: &Session, number: u64, names: &[String])
    -> Result<()>;

    /// Lists the labels currently on an issue.
    async fn get_issue_labels(&self, session: &Session, number: u64) -> Result<Vec<Label>>;

    /// Lists the comments on an issue.
    async fn list_issue_comments(&self, session: &Session, number: u64) -> Result<Vec<Comment>>;

    /// Posts a comment on an issue.
    async fn create_issue_comment(
        &self,
        session: &Session,
        number: u64,
        body: &str,
    ) -> Result<CommentLink>;
}
