// SPDX-License-Identifier: Apache-2.0

//! Error types for the Orchid sync engine.
//!
//! Uses `thiserror` for deriving `std::error::Error` implementations.
//! Every GitHub-facing failure is eventually converted into a recorded
//! `githubSyncError` on the local record, so the `Display` output of these
//! variants is what users end up reading.

use thiserror::Error;

use crate::model::SyncStatus;

/// Errors that can occur while reconciling local records with GitHub.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Non-2xx response, transport failure, or timeout from the GitHub API.
    #[error(
        "GitHub API error{}: {}",
        .status.map(|s| format!(" ({s})")).unwrap_or_default(),
        .message
    )]
    GitHubApi {
        /// HTTP status code, if a response was received.
        status: Option<u16>,
        /// Error message or response body.
        message: String,
    },

    /// GitHub App credentials are missing or unusable.
    #[error("GitHub App credentials are not configured: {message}")]
    AuthConfig {
        /// What is missing or malformed.
        message: String,
    },

    /// Exchanging the app JWT for an installation token failed.
    #[error("GitHub installation token exchange failed: {message}")]
    AuthExchange {
        /// Error message.
        message: String,
    },

    /// The entity (or its parent link) is not visible in the document store yet.
    #[error("Not yet replicated: {message}")]
    ReplicationLag {
        /// Which entity or link is missing.
        message: String,
    },

    /// The document store rejected a read or write.
    #[error("Document store error: {message}")]
    Store {
        /// Error message.
        message: String,
    },

    /// A CRDT document could not be decoded or a delta could not be built.
    #[error("Document delta error: {message}")]
    Delta {
        /// Error message.
        message: String,
    },

    /// Configuration file or environment error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// A sync status change that the state machine does not allow.
    #[error("Invalid sync status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: SyncStatus,
        /// Requested status.
        to: SyncStatus,
    },
}

impl SyncError {
    /// Creates a `GitHubApi` error from a status code and response body.
    pub fn github(status: Option<u16>, message: impl Into<String>) -> Self {
        SyncError::GitHubApi {
            status,
            message: message.into(),
        }
    }

    /// Creates a `Store` error.
    pub fn store(message: impl Into<String>) -> Self {
        SyncError::Store {
            message: message.into(),
        }
    }

    /// Returns the HTTP status of a GitHub API error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            SyncError::GitHubApi { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` for a GitHub 404, which "get" style calls map to `None`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<octocrab::Error> for SyncError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => SyncError::GitHubApi {
                status: Some(source.status_code.as_u16()),
                message: source.message.clone(),
            },
            _ => SyncError::GitHubApi {
                status: None,
                message: err.to_string(),
            },
        }
    }
}

impl From<automerge::AutomergeError> for SyncError {
    fn from(err: automerge::AutomergeError) -> Self {
        SyncError::Delta {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Store {
            message: format!("malformed record: {err}"),
        }
    }
}
