// SPDX-License-Identifier: Apache-2.0

//! Configuration management for the Orchid sync engine.
//!
//! Provides layered configuration from files and environment variables.
//! Uses XDG-compliant paths with environment variable support.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (prefix: `ORCHID_`)
//! 2. Config file: `~/.config/orchid-sync/config.toml`
//! 3. Built-in defaults
//!
//! # Examples
//!
//! ```bash
//! # Point the engine at a GitHub App installation
//! ORCHID_GITHUB__APP_ID=123456 ORCHID_GITHUB__INSTALLATION_ID=987 orchid-sync auth check
//! ```

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

use crate::Result;
use crate::github::client::DEFAULT_API_URL;

/// Engine configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// GitHub App and API settings.
    pub github: GithubConfig,
    /// Replication-lag retry settings.
    pub retry: RetryConfig,
}

/// GitHub settings.
///
/// Missing credentials are not a load error; they are reported when a token
/// is first requested.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Default target repository (`owner/repo`).
    pub repo: Option<String>,
    /// GitHub App id.
    pub app_id: Option<u64>,
    /// Installation id of the app on the target account.
    pub installation_id: Option<u64>,
    /// PEM-encoded app private key.
    pub private_key: Option<SecretString>,
    /// Path to the PEM-encoded app private key.
    pub private_key_path: Option<PathBuf>,
    /// Fixed token used instead of app credentials.
    pub token: Option<SecretString>,
    /// REST API base URL.
    pub api_url: String,
    /// Per-call timeout in seconds.
    pub api_timeout_seconds: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            app_id: None,
            installation_id: None,
            private_key: None,
            private_key_path: None,
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            api_timeout_seconds: 30,
        }
    }
}

/// Replication-lag retry settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay step per attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Cap on the stepped delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Upper bound of the random jitter added to each delay, in milliseconds.
    pub jitter_ms: u64,
    /// Attempts before a guard gives up.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 250,
            max_delay_ms: 2000,
            jitter_ms: 150,
            max_attempts: 30,
        }
    }
}

/// Returns the configuration directory.
///
/// Respects the `XDG_CONFIG_HOME` environment variable if set,
/// otherwise defaults to `~/.config/orchid-sync`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
        && !xdg_config.is_empty()
    {
        return PathBuf::from(xdg_config).join("orchid-sync");
    }
    dirs::home_dir()
        .unwrap_or_default()
        .join(".config")
        .join("orchid-sync")
}

/// Returns the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

fn env_source() -> Environment {
    Environment::with_prefix("ORCHID")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn build(file: &Path, env: Environment) -> Result<SyncConfig> {
    let config = Config::builder()
        // Load from config file (optional - may not exist)
        .add_source(File::from(file).required(false))
        // Override with environment variables
        .add_source(env)
        .build()?;

    Ok(config.try_deserialize()?)
}

/// Loads configuration from the default file location and the environment.
///
/// Environment variables use the prefix `ORCHID_` and double underscore for
/// nested keys (e.g., `ORCHID_GITHUB__APP_ID`).
///
/// # Errors
///
/// Returns `SyncError::Config` if the config file exists but is invalid.
pub fn load_config() -> Result<SyncConfig> {
    build(&config_file_path(), env_source())
}

/// Loads configuration from an explicit file plus the environment.
pub fn load_config_from(path: &Path) -> Result<SyncConfig> {
    build(path, env_source())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use secrecy::ExposeSecret;
    use serial_test::serial;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        env_source().source(Some(map))
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = build(&dir.path().join("absent.toml"), env(&[])).unwrap();

        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.api_timeout_seconds, 30);
        assert!(config.github.app_id.is_none());
        assert_eq!(config.retry.base_delay_ms, 250);
        assert_eq!(config.retry.max_delay_ms, 2000);
        assert_eq!(config.retry.jitter_ms, 150);
        assert_eq!(config.retry.max_attempts, 30);
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            r#"
[github]
repo = "orchid/app"
app_id = 123
installation_id = 456
private_key_path = "/etc/orchid/key.pem"

[retry]
max_attempts = 5
"#,
        );
        let config = build(file.path(), env(&[])).unwrap();

        assert_eq!(config.github.repo.as_deref(), Some("orchid/app"));
        assert_eq!(config.github.app_id, Some(123));
        assert_eq!(config.github.installation_id, Some(456));
        assert_eq!(
            config.github.private_key_path,
            Some(PathBuf::from("/etc/orchid/key.pem"))
        );
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 250);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = write_config("[github]\napp_id = 1\n");
        let config = build(
            file.path(),
            env(&[
                ("ORCHID_GITHUB__APP_ID", "99"),
                ("ORCHID_GITHUB__TOKEN", "ghp_env"),
                ("ORCHID_RETRY__JITTER_MS", "0"),
            ]),
        )
        .unwrap();

        assert_eq!(config.github.app_id, Some(99));
        assert_eq!(
            config.github.token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("ghp_env".to_string())
        );
        assert_eq!(config.retry.jitter_ms, 0);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let file = write_config("[github\napp_id = ");
        let err = build(file.path(), env(&[])).unwrap_err();
        assert!(matches!(err, crate::error::SyncError::Config { .. }));
    }

    #[test]
    #[serial]
    #[allow(unsafe_code)]
    fn test_config_dir_respects_xdg() {
        let dir = tempfile::tempdir().unwrap();
        let previous = std::env::var_os("XDG_CONFIG_HOME");
        // SAFETY: serialized with every other test that touches the environment.
        unsafe { std::env::set_var("XDG_CONFIG_HOME", dir.path()) };

        assert_eq!(config_file_path(), dir.path().join("orchid-sync").join("config.toml"));

        match previous {
            // SAFETY: as above.
            Some(value) => unsafe { std::env::set_var("XDG_CONFIG_HOME", value) },
            None => unsafe { std::env::remove_var("XDG_CONFIG_HOME") },
        }
    }

    #[test]
    fn test_config_dir_name() {
        assert!(config_dir().ends_with("orchid-sync"));
    }
}
