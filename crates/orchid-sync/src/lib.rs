// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs)]

//! # Orchid Sync
//!
//! Keeps locally-authored, CRDT-replicated Orchid issues and replies
//! eventually consistent with GitHub issues, comments and labels.
//!
//! This crate provides:
//! - An idempotent enqueue guard with bounded, jittered replication-lag retries
//! - Issue and reply sync workers that find-or-create on GitHub
//! - Managed status/severity label reconciliation that preserves human labels
//! - Field-level CRDT deltas that merge without clobbering concurrent edits
//! - GitHub App installation-token credentials
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use orchid_sync::{EnqueueOutcome, MemoryDocumentStore, SyncEngine, load_config};
//!
//! # async fn example() -> orchid_sync::Result<()> {
//! let config = load_config()?;
//! let store = Arc::new(MemoryDocumentStore::new());
//! let engine = SyncEngine::from_config(&config, store)?;
//!
//! if engine.enqueue_issue_sync("i1").await? == EnqueueOutcome::ScheduledRetry {
//!     println!("waiting for i1 to replicate");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Configuration loading and paths
//! - [`crdt`] - Field-level delta builder
//! - [`error`] - Error types
//! - [`github`] - GitHub REST client, credentials and label reconciler
//! - [`model`] - Local issue and reply records
//! - [`store`] - Document store boundary
//! - [`sync`] - Enqueue guards, retry scheduling and workers

// ============================================================================
// Error Handling
// ============================================================================

pub use error::SyncError;

/// Convenience Result type for sync operations.
///
/// This is equivalent to `std::result::Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;

// ============================================================================
// Configuration
// ============================================================================

pub use config::{
    GithubConfig, RetryConfig, SyncConfig, config_dir, config_file_path, load_config,
    load_config_from,
};

// ============================================================================
// Data Model
// ============================================================================

pub use model::{Author, Collection, Issue, IssueStatus, Reply, ReplyKind, Severity, SyncStatus};

// ============================================================================
// Document Store
// ============================================================================

pub use crdt::{FieldChanges, build_delta};
pub use store::{DocumentState, DocumentStore, MemoryDocumentStore};

// ============================================================================
// GitHub Integration
// ============================================================================

pub use github::auth::credentials_from_config;
pub use github::{
    AppCredentialProvider, Comment, CommentLink, CredentialProvider, GithubApi, IssueLink, Label,
    LabelSpec, NewIssue, OctocrabClient, RepoRef, SearchHit, Session, StaticTokenProvider,
};

// ============================================================================
// Sync Engine
// ============================================================================

pub use sync::{
    Dispatcher, EnqueueOutcome, EntityKind, RetryPolicy, SyncEngine, TokioDispatcher,
};

// ============================================================================
// Retry Logic
// ============================================================================

pub use retry::{is_retryable, is_retryable_http, retry_backoff};

// ============================================================================
// Utilities
// ============================================================================

pub use utils::{truncate, truncate_with_suffix};

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod crdt;
pub mod error;
pub mod github;
pub mod model;
pub mod retry;
pub mod store;
pub mod sync;
pub mod utils;
