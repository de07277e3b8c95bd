// SPDX-License-Identifier: Apache-2.0

//! CLI-specific error formatting with user-friendly hints.
//!
//! Downcasts `anyhow::Error` to `SyncError` and appends a tip pointing at the
//! setting most likely to fix it.

use anyhow::Error;
use orchid_sync::{SyncError, config_file_path};

/// Formats an error for CLI display with helpful hints.
///
/// If the error is not a `SyncError`, returns the original error chain.
pub fn format_error(error: &Error) -> String {
    let Some(sync_err) = error.downcast_ref::<SyncError>() else {
        return format!("{error:#}");
    };

    match sync_err {
        SyncError::Config { .. } => format!(
            "{sync_err}\n\nTip: Check your config file at {}",
            config_file_path().display()
        ),
        SyncError::AuthConfig { .. } => format!(
            "{sync_err}\n\nTip: Set github.token, or github.app_id, github.installation_id and \
             github.private_key_path (ORCHID_GITHUB__APP_ID etc. in the environment)."
        ),
        SyncError::AuthExchange { .. } => format!(
            "{sync_err}\n\nTip: Check that the app is installed on the repository and that the \
             installation id matches."
        ),
        SyncError::GitHubApi {
            status: Some(404), ..
        } => format!("{sync_err}\n\nTip: Check the repository name and issue number."),
        SyncError::GitHubApi {
            status: Some(401 | 403),
            ..
        } => format!(
            "{sync_err}\n\nTip: The credentials need Issues read and write permission on the \
             repository."
        ),
        _ => sync_err.to_string(),
    }
}
