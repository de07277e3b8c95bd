// SPDX-License-Identifier: Apache-2.0

//! Label sync worker for issues that are already linked.

use tracing::{debug, info, instrument, warn};

use super::SyncEngine;
use crate::Result;
use crate::crdt::FieldChanges;
use crate::github::labels::reconcile_labels;
use crate::model::{Collection, Issue, SyncStatus};
use crate::store::load_issue;
use crate::utils::{now_millis, sync_error_message};

impl SyncEngine {
    /// Runs the label sync worker for one issue.
    ///
    /// Leaves `githubSyncStatus` untouched. A failure is recorded in
    /// `githubSyncError`; a later success clears it.
    #[instrument(skip(self))]
    pub async fn run_label_sync(&self, issue_id: &str) -> Result<()> {
        let Some(issue) = load_issue(self.store(), issue_id).await? else {
            warn!("Issue disappeared before its label sync ran");
            return Ok(());
        };
        let Some(number) = issue.github_issue_number else {
            debug!("Issue not linked; skipping label sync");
            return Ok(());
        };

        let changes = match self.sync_labels(&issue, number).await {
            Ok(labels) => {
                info!(number, labels = ?labels, "Labels synced");
                if issue.github_sync_status != SyncStatus::Synced
                    || issue.github_sync_error.is_none()
                {
                    return Ok(());
                }
                FieldChanges::new().delete("githubSyncError")
            }
            Err(err) => {
                warn!(error = %err, "Label sync failed");
                FieldChanges::new()
                    .set("githubSyncError", sync_error_message(&err))
                    .set("updatedAt", now_millis())
            }
        };

        self.merge(Collection::Issues, issue_id, &changes).await
    }

    async fn sync_labels(&self, issue: &Issue, number: u64) -> Result<Vec<String>> {
        let session = self.session(issue.github_repo.as_deref()).await?;
        reconcile_labels(
            self.github(),
            &session,
            number,
            issue.status,
            issue.effective_severity(),
        )
        .await
    }
}
