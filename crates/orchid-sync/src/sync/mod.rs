// SPDX-License-Identifier: Apache-2.0

//! The reconciliation engine.
//!
//! Enqueue calls run an idempotency guard and either no-op, mark the record
//! `creating` and dispatch a worker, or hand off to the retry schedule when
//! the record (or its parent link) has not replicated yet. Every retry re-runs
//! the full guard. Workers never propagate GitHub failures; they record them
//! on the record instead.

use std::fmt;
use std::sync::Arc;

use bon::bon;
use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::config::SyncConfig;
use crate::crdt::{self, FieldChanges};
use crate::error::SyncError;
use crate::github::auth::credentials_from_config;
use crate::github::{CredentialProvider, GithubApi, OctocrabClient, RepoRef, Session};
use crate::model::{Collection, ReplyKind, SyncStatus};
use crate::store::{DocumentState, DocumentStore, load_issue, load_reply};
use crate::utils::now_millis;

pub mod body;
mod issue;
mod labels;
mod reply;
pub mod scheduler;

pub use scheduler::{Dispatcher, RetryPolicy, TokioDispatcher};

/// Result of an enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOutcome {
    /// A worker was dispatched.
    Enqueued,
    /// Already synced or in flight; nothing to do.
    Noop,
    /// A precondition is missing; the guard will run again later.
    ScheduledRetry,
}

/// Kind of sync an enqueue or retry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Issue creation or linking.
    Issue,
    /// Reply mirroring.
    Reply,
    /// Managed label reconciliation.
    Labels,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Issue => "issue",
            EntityKind::Reply => "reply",
            EntityKind::Labels => "labels",
        })
    }
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    github: Arc<dyn GithubApi>,
    credentials: Arc<dyn CredentialProvider>,
    dispatcher: Arc<dyn Dispatcher>,
    policy: RetryPolicy,
    default_repo: Option<RepoRef>,
}

/// Keeps local issues and replies eventually consistent with GitHub.
///
/// Cheap to clone; clones share the same collaborators.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

#[bon]
impl SyncEngine {
    /// Creates an engine from its collaborators.
    #[builder]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        github: Arc<dyn GithubApi>,
        credentials: Arc<dyn CredentialProvider>,
        dispatcher: Arc<dyn Dispatcher>,
        #[builder(default)] policy: RetryPolicy,
        default_repo: Option<RepoRef>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                github,
                credentials,
                dispatcher,
                policy,
                default_repo,
            }),
        }
    }
}

impl SyncEngine {
    /// Creates an engine wired to GitHub and Tokio from configuration.
    pub fn from_config(config: &SyncConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let default_repo = config
            .github
            .repo
            .as_deref()
            .map(str::parse::<RepoRef>)
            .transpose()?;

        Ok(Self::builder()
            .store(store)
            .github(Arc::new(OctocrabClient::from_config(&config.github)))
            .credentials(credentials_from_config(&config.github))
            .dispatcher(Arc::new(TokioDispatcher::new()))
            .policy(RetryPolicy::from(&config.retry))
            .maybe_default_repo(default_repo)
            .build())
    }

    fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    fn github(&self) -> &dyn GithubApi {
        self.inner.github.as_ref()
    }

    /// Requests that a local issue be created on (or linked to) GitHub.
    pub async fn enqueue_issue_sync(&self, issue_id: &str) -> Result<EnqueueOutcome> {
        self.guard(EntityKind::Issue, issue_id, 0).await
    }

    /// Requests that a reply be posted as a GitHub comment.
    pub async fn enqueue_reply_sync(&self, reply_id: &str) -> Result<EnqueueOutcome> {
        self.guard(EntityKind::Reply, reply_id, 0).await
    }

    /// Requests that an issue's managed labels be brought in line with its status and severity.
    pub async fn enqueue_status_label_sync(&self, issue_id: &str) -> Result<EnqueueOutcome> {
        self.guard(EntityKind::Labels, issue_id, 0).await
    }

    fn guard<'a>(
        &'a self,
        kind: EntityKind,
        id: &'a str,
        attempt: u32,
    ) -> BoxFuture<'a, Result<EnqueueOutcome>> {
        Box::pin(async move {
            match kind {
                EntityKind::Issue => self.guard_issue(id, attempt).await,
                EntityKind::Reply => self.guard_reply(id, attempt).await,
                EntityKind::Labels => self.guard_labels(id, attempt).await,
            }
        })
    }

    #[instrument(skip(self), fields(issue_id = %id))]
    async fn guard_issue(&self, id: &str, attempt: u32) -> Result<EnqueueOutcome> {
        let Some(issue) = load_issue(self.store(), id).await? else {
            return Ok(self.reschedule(EntityKind::Issue, id, attempt));
        };
        if issue.is_linked() || !issue.github_sync_status.accepts_enqueue() {
            debug!(status = %issue.github_sync_status, "Issue already synced or in flight");
            return Ok(EnqueueOutcome::Noop);
        }

        let next = issue.github_sync_status.transition(SyncStatus::Creating)?;
        let changes = FieldChanges::new()
            .set("githubSyncStatus", next.as_str())
            .delete("githubSyncError")
            .set("updatedAt", now_millis());
        self.merge(Collection::Issues, id, &changes).await?;

        let engine = self.clone();
        let id = id.to_string();
        self.inner.dispatcher.dispatch(Box::pin(async move {
            if let Err(err) = engine.run_issue_sync(&id).await {
                warn!(issue_id = %id, error = %err, "Issue sync could not record its outcome");
            }
        }));
        info!("Issue sync enqueued");
        Ok(EnqueueOutcome::Enqueued)
    }

    #[instrument(skip(self), fields(reply_id = %id))]
    async fn guard_reply(&self, id: &str, attempt: u32) -> Result<EnqueueOutcome> {
        let Some(reply) = load_reply(self.store(), id).await? else {
            return Ok(self.reschedule(EntityKind::Reply, id, attempt));
        };
        if reply.kind != ReplyKind::Reply {
            debug!("Only replies are mirrored to GitHub");
            return Ok(EnqueueOutcome::Noop);
        }
        if reply.is_linked() || !reply.github_sync_status.accepts_enqueue() {
            debug!(status = %reply.github_sync_status, "Reply already synced or in flight");
            return Ok(EnqueueOutcome::Noop);
        }

        let parent_number = load_issue(self.store(), &reply.issue_id)
            .await?
            .and_then(|issue| issue.github_issue_number);
        if parent_number.is_none() {
            debug!(issue_id = %reply.issue_id, "Parent issue not linked yet");
            return Ok(self.reschedule(EntityKind::Reply, id, attempt));
        }

        let next = reply.github_sync_status.transition(SyncStatus::Creating)?;
        let changes = FieldChanges::new()
            .set("githubSyncStatus", next.as_str())
            .delete("githubSyncError");
        self.merge(Collection::Replies, id, &changes).await?;

        let engine = self.clone();
        let id = id.to_string();
        self.inner.dispatcher.dispatch(Box::pin(async move {
            if let Err(err) = engine.run_reply_sync(&id).await {
                warn!(reply_id = %id, error = %err, "Reply sync could not record its outcome");
            }
        }));
        info!("Reply sync enqueued");
        Ok(EnqueueOutcome::Enqueued)
    }

    #[instrument(skip(self), fields(issue_id = %id))]
    async fn guard_labels(&self, id: &str, attempt: u32) -> Result<EnqueueOutcome> {
        let linked = load_issue(self.store(), id)
            .await?
            .is_some_and(|issue| issue.github_issue_number.is_some());
        if !linked {
            return Ok(self.reschedule(EntityKind::Labels, id, attempt));
        }

        let engine = self.clone();
        let id = id.to_string();
        self.inner.dispatcher.dispatch(Box::pin(async move {
            if let Err(err) = engine.run_label_sync(&id).await {
                warn!(issue_id = %id, error = %err, "Label sync could not record its outcome");
            }
        }));
        debug!("Label sync enqueued");
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Schedules the guard to run again, or gives up quietly past the ceiling.
    fn reschedule(&self, kind: EntityKind, id: &str, attempt: u32) -> EnqueueOutcome {
        let policy = &self.inner.policy;
        if !policy.allows(attempt) {
            info!(%kind, id, attempt, "Giving up waiting for replication");
            return EnqueueOutcome::ScheduledRetry;
        }

        let delay = policy.delay(attempt);
        debug!(%kind, id, attempt, delay_ms = delay.as_millis(), "Scheduling retry");

        let engine = self.clone();
        let id = id.to_string();
        let next = attempt + 1;
        self.inner.dispatcher.dispatch_after(
            delay,
            Box::pin(async move {
                if let Err(err) = engine.guard(kind, &id, next).await {
                    warn!(%kind, id = %id, attempt = next, error = %err, "Retry failed");
                }
            }),
        );
        EnqueueOutcome::ScheduledRetry
    }

    /// Resolves the target repository and fetches a token.
    async fn session(&self, repo_override: Option<&str>) -> Result<Session> {
        let repo = match repo_override.map(str::trim).filter(|repo| !repo.is_empty()) {
            Some(repo) => repo.parse::<RepoRef>()?,
            None => self
                .inner
                .default_repo
                .clone()
                .ok_or_else(|| SyncError::Config {
                    message: "no target repository: set github.repo or the issue's githubRepo"
                        .to_string(),
                })?,
        };
        let token = self.inner.credentials.token().await?;
        Ok(Session::new(token, repo))
    }

    /// Merges `changes` into a record on top of its current state.
    async fn merge(&self, collection: Collection, id: &str, changes: &FieldChanges) -> Result<()> {
        let base = self.store().get_state(collection, id).await?;
        self.merge_onto(collection, id, base.as_ref(), changes).await
    }

    /// Merges `changes` into a record on top of a previously read state.
    async fn merge_onto(
        &self,
        collection: Collection,
        id: &str,
        base: Option<&DocumentState>,
        changes: &FieldChanges,
    ) -> Result<()> {
        let delta = crdt::build_delta(base.map(|state| state.bytes.as_slice()), changes)?;
        self.store()
            .apply_delta(collection, id, &delta, &changes.projection())
            .await
    }
}
