// SPDX-License-Identifier: Apache-2.0

//! Issue sync worker: find-or-create the GitHub issue, then link it locally.

use tracing::{debug, info, instrument, warn};

use super::SyncEngine;
use super::body::{compose_issue_body, has_marker, marker_search_query};
use crate::Result;
use crate::crdt::FieldChanges;
use crate::error::SyncError;
use crate::github::labels::{ensure_managed_labels, reconcile_labels, target_labels};
use crate::github::{IssueLink, NewIssue};
use crate::model::{Collection, Issue, SyncStatus};
use crate::store::load_issue;
use crate::utils::{now_millis, sync_error_message};

impl SyncEngine {
    /// Runs the issue sync worker for one issue.
    ///
    /// GitHub and credential failures are recorded on the issue as
    /// `githubSyncStatus = error`; the returned error only reports a failure
    /// to read the issue or to record the outcome.
    #[instrument(skip(self))]
    pub async fn run_issue_sync(&self, issue_id: &str) -> Result<()> {
        let Some(issue) = load_issue(self.store(), issue_id).await? else {
            warn!("Issue disappeared before its sync ran");
            return Ok(());
        };
        if issue.is_linked() {
            debug!("Issue already linked");
            return Ok(());
        }

        match self.link_issue(&issue).await {
            Ok(link) => {
                info!(number = link.number, url = %link.url, "Issue synced");
                Ok(())
            }
            Err(err) => self.record_issue_error(issue_id, &err).await,
        }
    }

    async fn link_issue(&self, issue: &Issue) -> Result<IssueLink> {
        let base = self.store().get_state(Collection::Issues, &issue.id).await?;
        let severity = issue.effective_severity();
        let session = self.session(issue.github_repo.as_deref()).await?;

        let query = marker_search_query(&issue.id, &session.repo.to_string());
        let existing = self
            .github()
            .search_issues(&session, &query)
            .await?
            .into_iter()
            .find(|hit| hit.body.as_deref().is_none_or(|body| has_marker(body, &issue.id)));

        let link = if let Some(hit) = existing {
            debug!(number = hit.number, "Found existing GitHub issue");
            reconcile_labels(self.github(), &session, hit.number, issue.status, severity).await?;
            IssueLink {
                number: hit.number,
                url: hit.url,
            }
        } else {
            ensure_managed_labels(self.github(), &session, issue.status, severity).await?;
            let new_issue = NewIssue {
                title: issue.title.clone(),
                body: compose_issue_body(issue),
                labels: target_labels(issue.status, severity),
            };
            self.github().create_issue(&session, &new_issue).await?
        };

        let now = now_millis();
        let synced = SyncStatus::Creating.transition(SyncStatus::Synced)?;
        let changes = FieldChanges::new()
            .set("githubIssueUrl", link.url.clone())
            .set("githubIssueNumber", link.number)
            .set("githubSyncStatus", synced.as_str())
            .set("githubSyncedAt", now)
            .set("updatedAt", now)
            .delete("githubSyncError");
        self.merge_onto(Collection::Issues, &issue.id, base.as_ref(), &changes)
            .await?;
        Ok(link)
    }

    async fn record_issue_error(&self, issue_id: &str, err: &SyncError) -> Result<()> {
        warn!(error = %err, "Issue sync failed");

        let base = match self.store().get_state(Collection::Issues, issue_id).await {
            Ok(state) => state,
            Err(read_err) => {
                debug!(error = %read_err, "Recording error without a merge base");
                None
            }
        };
        let changes = FieldChanges::new()
            .set("githubSyncStatus", SyncStatus::Error.as_str())
            .set("githubSyncError", sync_error_message(err))
            .set("updatedAt", now_millis());
        self.merge_onto(Collection::Issues, issue_id, base.as_ref(), &changes)
            .await
    }
}
