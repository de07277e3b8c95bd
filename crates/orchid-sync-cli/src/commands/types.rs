// SPDX-License-Identifier: Apache-2.0

//! Result types returned by command handlers and rendered by `output`.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of `auth check`.
#[derive(Debug, Serialize)]
pub struct AuthCheckResult {
    /// `token` for a configured token, `app` for GitHub App credentials.
    pub method: &'static str,
    /// GitHub App installation the token was minted for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installation_id: Option<u64>,
    /// Expiry of the cached installation token.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of `labels ensure`.
#[derive(Debug, Serialize)]
pub struct LabelsEnsureResult {
    /// Repository as `owner/repo`.
    pub repo: String,
    /// Labels that did not exist and were created.
    pub created: Vec<String>,
    /// Number of managed labels checked.
    pub total: usize,
}

/// Result of `labels reconcile`.
#[derive(Debug, Serialize)]
pub struct LabelsReconcileResult {
    /// Repository as `owner/repo`.
    pub repo: String,
    /// GitHub issue number.
    pub number: u64,
    /// Full label set written to the issue.
    pub labels: Vec<String>,
}
