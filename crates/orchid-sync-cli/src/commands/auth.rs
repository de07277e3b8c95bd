// SPDX-License-Identifier: Apache-2.0

//! `auth check`: prove the configured credentials can mint a token.

use anyhow::{Context, Result};
use orchid_sync::{AppCredentialProvider, CredentialProvider, GithubConfig, StaticTokenProvider};
use secrecy::ExposeSecret;
use tracing::debug;

use super::types::AuthCheckResult;

/// Obtains a token and reports how it was obtained.
///
/// A configured `github.token` is only checked for presence; GitHub App
/// credentials go through the full installation-token exchange.
pub async fn run_check(config: &GithubConfig) -> Result<AuthCheckResult> {
    if let Some(token) = config
        .token
        .as_ref()
        .filter(|token| !token.expose_secret().is_empty())
    {
        debug!("Checking static token");
        StaticTokenProvider::new(token.clone())
            .token()
            .await
            .context("Failed to read configured token")?;
        return Ok(AuthCheckResult {
            method: "token",
            installation_id: None,
            expires_at: None,
        });
    }

    let provider = AppCredentialProvider::from_config(config);
    provider
        .token()
        .await
        .context("Failed to obtain installation token")?;

    Ok(AuthCheckResult {
        method: "app",
        installation_id: config.installation_id,
        expires_at: provider.cached_expiry(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchid_sync::SyncError;
    use secrecy::SecretString;

    #[tokio::test]
    async fn static_token_reports_no_expiry() {
        let config = GithubConfig {
            token: Some(SecretString::from("ghp_test")),
            ..GithubConfig::default()
        };

        let result = run_check(&config).await.unwrap();
        assert_eq!(result.method, "token");
        assert!(result.expires_at.is_none());
    }

    #[tokio::test]
    async fn missing_app_credentials_fail_before_any_request() {
        let err = run_check(&GithubConfig::default()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::AuthConfig { .. })
        ));
    }
}
