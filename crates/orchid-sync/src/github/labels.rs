// SPDX-License-Identifier: Apache-2.0

//! Managed label reconciliation.
//!
//! The engine owns two label families on GitHub: one `status: <value>` label
//! per [`IssueStatus`] and one `severity: <value>` label per [`Severity`].
//! Reconciling an issue replaces whatever managed labels it carries with the
//! requested ones and leaves every other label alone.

use tracing::{debug, info, instrument};

use super::{GithubApi, LabelSpec, Session};
use crate::Result;
use crate::model::{IssueStatus, Severity};

const STATUS_PREFIX: &str = "status: ";
const SEVERITY_PREFIX: &str = "severity: ";

const STATUS_COLOR: &str = "1d76db";
const STATUS_DESCRIPTION: &str = "Orchid workflow status";
const SEVERITY_COLOR: &str = "d93f0b";
const SEVERITY_DESCRIPTION: &str = "Orchid issue severity";

/// Label name for a status.
#[must_use]
pub fn status_label_name(status: IssueStatus) -> String {
    format!("{STATUS_PREFIX}{status}")
}

/// Label name for a severity.
#[must_use]
pub fn severity_label_name(severity: Severity) -> String {
    format!("{SEVERITY_PREFIX}{severity}")
}

/// Creation spec for a status label.
#[must_use]
pub fn status_label(status: IssueStatus) -> LabelSpec {
    LabelSpec {
        name: status_label_name(status),
        color: STATUS_COLOR.to_string(),
        description: STATUS_DESCRIPTION.to_string(),
    }
}

/// Creation spec for a severity label.
#[must_use]
pub fn severity_label(severity: Severity) -> LabelSpec {
    LabelSpec {
        name: severity_label_name(severity),
        color: SEVERITY_COLOR.to_string(),
        description: SEVERITY_DESCRIPTION.to_string(),
    }
}

/// Every label the engine owns, status family first.
#[must_use]
pub fn all_managed_labels() -> Vec<LabelSpec> {
    IssueStatus::ALL
        .into_iter()
        .map(status_label)
        .chain(Severity::ALL.into_iter().map(severity_label))
        .collect()
}

/// Whether `name` belongs to a managed family (case-insensitive).
#[must_use]
pub fn is_managed(name: &str) -> bool {
    IssueStatus::ALL
        .into_iter()
        .map(status_label_name)
        .chain(Severity::ALL.into_iter().map(severity_label_name))
        .any(|managed| managed.eq_ignore_ascii_case(name))
}

/// Target label names for an issue: the status label plus the severity label if any.
#[must_use]
pub fn target_labels(status: IssueStatus, severity: Option<Severity>) -> Vec<String> {
    let mut names = vec![status_label_name(status)];
    names.extend(severity.map(severity_label_name));
    names
}

/// Computes the label set to write back to an issue.
///
/// Strips every managed name from `current` (stale ones included), keeps the
/// rest in their original order, appends the targets, and drops
/// case-insensitive duplicates.
#[must_use]
pub fn next_label_set(
    current: &[String],
    status: IssueStatus,
    severity: Option<Severity>,
) -> Vec<String> {
    let mut next: Vec<String> = Vec::with_capacity(current.len() + 2);
    let candidates = current
        .iter()
        .filter(|name| !is_managed(name))
        .cloned()
        .chain(target_labels(status, severity));

    for name in candidates {
        if !next.iter().any(|seen| seen.eq_ignore_ascii_case(&name)) {
            next.push(name);
        }
    }
    next
}

/// Makes sure a label exists in the repository. Returns `true` if it was created.
#[instrument(skip(github, session, spec), fields(name = %spec.name))]
pub async fn ensure_label(
    github: &dyn GithubApi,
    session: &Session,
    spec: &LabelSpec,
) -> Result<bool> {
    if github.get_label(session, &spec.name).await?.is_some() {
        return Ok(false);
    }
    github.create_label(session, spec).await?;
    debug!("Created label");
    Ok(true)
}

/// Makes sure the target status label and severity label exist.
pub async fn ensure_managed_labels(
    github: &dyn GithubApi,
    session: &Session,
    status: IssueStatus,
    severity: Option<Severity>,
) -> Result<()> {
    ensure_label(github, session, &status_label(status)).await?;
    if let Some(severity) = severity {
        ensure_label(github, session, &severity_label(severity)).await?;
    }
    Ok(())
}

/// Creates every missing managed label. Returns the names created.
#[instrument(skip(github, session), fields(repo = %session.repo))]
pub async fn ensure_all_managed_labels(
    github: &dyn GithubApi,
    session: &Session,
) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for spec in all_managed_labels() {
        if ensure_label(github, session, &spec).await? {
            created.push(spec.name);
        }
    }
    info!(created = created.len(), "Managed labels ensured");
    Ok(created)
}

/// Replaces the managed labels on an issue, preserving all others.
///
/// Returns the label set that was written.
#[instrument(skip(github, session), fields(repo = %session.repo))]
pub async fn reconcile_labels(
    github: &dyn GithubApi,
    session: &Session,
    number: u64,
    status: IssueStatus,
    severity: Option<Severity>,
) -> Result<Vec<String>> {
    ensure_managed_labels(github, session, status, severity).await?;

    let current: Vec<String> = github
        .get_issue_labels(session, number)
        .await?
        .into_iter()
        .map(|label| label.name)
        .collect();

    let next = next_label_set(&current, status, severity);
    github.set_issue_labels(session, number, &next).await?;
    debug!(labels = ?next, "Reconciled labels");
    Ok(next)
}
