// SPDX-License-Identifier: Apache-2.0

//! Reply sync worker: post a reply as a comment on its parent's GitHub issue.

use tracing::{debug, info, instrument, warn};

use super::SyncEngine;
use super::body::compose_reply_body;
use crate::Result;
use crate::crdt::FieldChanges;
use crate::error::SyncError;
use crate::github::CommentLink;
use crate::model::{Collection, Reply, ReplyKind, SyncStatus};
use crate::store::{load_issue, load_reply};
use crate::utils::{now_millis, sync_error_message};

impl SyncEngine {
    /// Runs the reply sync worker for one reply.
    ///
    /// Link fields are written straight onto the reply; nothing else edits them.
    #[instrument(skip(self))]
    pub async fn run_reply_sync(&self, reply_id: &str) -> Result<()> {
        let Some(reply) = load_reply(self.store(), reply_id).await? else {
            warn!("Reply disappeared before its sync ran");
            return Ok(());
        };
        if reply.kind != ReplyKind::Reply || reply.is_linked() {
            debug!("Nothing to sync");
            return Ok(());
        }

        let changes = match self.link_reply(&reply).await {
            Ok(link) => {
                info!(comment_id = link.id, "Reply synced");
                FieldChanges::new()
                    .set("githubCommentId", link.id)
                    .set("githubCommentUrl", link.url)
                    .set("githubSyncStatus", SyncStatus::Synced.as_str())
                    .set("githubSyncedAt", now_millis())
                    .delete("githubSyncError")
            }
            Err(err) => {
                warn!(error = %err, "Reply sync failed");
                FieldChanges::new()
                    .set("githubSyncStatus", SyncStatus::Error.as_str())
                    .set("githubSyncError", sync_error_message(&err))
            }
        };

        self.store()
            .patch_record(Collection::Replies, reply_id, &changes.projection())
            .await
    }

    async fn link_reply(&self, reply: &Reply) -> Result<CommentLink> {
        let parent = load_issue(self.store(), &reply.issue_id).await?;
        let Some((number, repo)) =
            parent.and_then(|issue| issue.github_issue_number.map(|n| (n, issue.github_repo)))
        else {
            return Err(SyncError::ReplicationLag {
                message: format!("parent issue {} is not linked to GitHub", reply.issue_id),
            });
        };

        let session = self.session(repo.as_deref()).await?;
        let body = compose_reply_body(reply);

        // Exact-text match is the only dedupe key comments have.
        let comments = self.github().list_issue_comments(&session, number).await?;
        if let Some(existing) = comments.into_iter().find(|comment| comment.body == body) {
            debug!(comment_id = existing.id, "Reusing identical comment");
            return Ok(CommentLink {
                id: existing.id,
                url: existing.url,
            });
        }

        self.github()
            .create_issue_comment(&session, number, &body)
            .await
    }
}
