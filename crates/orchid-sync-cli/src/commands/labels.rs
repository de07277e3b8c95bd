// SPDX-License-Identifier: Apache-2.0

//! `labels ensure` and `labels reconcile`.

use anyhow::{Context, Result};
use orchid_sync::github::labels::{all_managed_labels, ensure_all_managed_labels, reconcile_labels};
use orchid_sync::{
    CredentialProvider, GithubConfig, IssueStatus, OctocrabClient, RepoRef, Session, Severity,
    SyncError, credentials_from_config,
};
use tracing::{debug, instrument};

use super::types::{LabelsEnsureResult, LabelsReconcileResult};

/// Resolves the target repository: the `--repo` flag wins over `github.repo`.
fn target_repo(config: &GithubConfig, repo: Option<&str>) -> Result<RepoRef> {
    let raw = repo.or(config.repo.as_deref()).ok_or_else(|| SyncError::Config {
        message: "no target repository: pass --repo or set github.repo".to_string(),
    })?;
    Ok(raw.parse::<RepoRef>()?)
}

async fn open_session(config: &GithubConfig, repo: RepoRef) -> Result<Session> {
    let token = credentials_from_config(config)
        .token()
        .await
        .context("Failed to obtain GitHub token")?;
    debug!(repo = %repo, "Session opened");
    Ok(Session::new(token, repo))
}

/// Creates every managed label missing from the repository.
#[instrument(skip(config))]
pub async fn run_ensure(config: &GithubConfig, repo: Option<&str>) -> Result<LabelsEnsureResult> {
    let session = open_session(config, target_repo(config, repo)?).await?;
    let client = OctocrabClient::from_config(config);

    let created = ensure_all_managed_labels(&client, &session).await?;

    Ok(LabelsEnsureResult {
        repo: session.repo.to_string(),
        created,
        total: all_managed_labels().len(),
    })
}

/// Replaces the managed labels on an existing GitHub issue.
#[instrument(skip(config))]
pub async fn run_reconcile(
    config: &GithubConfig,
    repo: Option<&str>,
    number: u64,
    status: IssueStatus,
    severity: Option<Severity>,
) -> Result<LabelsReconcileResult> {
    let session = open_session(config, target_repo(config, repo)?).await?;
    let client = OctocrabClient::from_config(config);

    let labels = reconcile_labels(&client, &session, number, status, severity).await?;

    Ok(LabelsReconcileResult {
        repo: session.repo.to_string(),
        number,
        labels,
    })
}
