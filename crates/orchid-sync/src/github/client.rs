// SPDX-License-Identifier: Apache-2.0

//! `octocrab`-backed implementation of [`GithubApi`].

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::HeaderName;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};

use super::{
    Comment, CommentLink, GITHUB_API_VERSION, GithubApi, IssueLink, Label, LabelSpec, NewIssue,
    SearchHit, Session,
};
use crate::Result;
use crate::config::GithubConfig;
use crate::error::SyncError;
use crate::retry::{is_retryable, retry_backoff};

/// Default GitHub REST base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default per-call timeout.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

const API_VERSION_HEADER: &str = "x-github-api-version";

/// GitHub REST client built on `octocrab`.
///
/// Reuses one `Octocrab` instance for as long as the session token stays the
/// same, and rebuilds it when an installation token rotates. Octocrab's own
/// retry layer is off: mutations are sent exactly once, and idempotent reads
/// retry through [`retry_backoff`].
pub struct OctocrabClient {
    api_url: String,
    timeout: Duration,
    cached: Mutex<Option<(SecretString, Octocrab)>>,
}

impl OctocrabClient {
    /// Creates a client for `api_url` with a per-call timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_url: api_url.into(),
            timeout,
            cached: Mutex::new(None),
        }
    }

    /// Creates a client from the `[github]` configuration section.
    #[must_use]
    pub fn from_config(config: &GithubConfig) -> Self {
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.api_timeout_seconds),
        )
    }

    fn client(&self, token: &SecretString) -> Result<Octocrab> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((current, client)) = cached.as_ref()
            && current.expose_secret() == token.expose_secret()
        {
            return Ok(client.clone());
        }

        let client = Octocrab::builder()
            .base_uri(self.api_url.as_str())?
            .personal_token(token.expose_secret().to_string())
            .add_retry_config(RetryConfig::None)
            .add_header(
                HeaderName::from_static(API_VERSION_HEADER),
                GITHUB_API_VERSION.to_string(),
            )
            .build()?;
        debug!(api_url = %self.api_url, "Built GitHub client");

        *cached = Some((token.clone(), client.clone()));
        Ok(client)
    }

    /// Runs one request under the per-call timeout.
    async fn timed<T>(
        &self,
        request: impl Future<Output = std::result::Result<T, octocrab::Error>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(SyncError::from),
            Err(_) => Err(SyncError::github(
                None,
                format!("request timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

impl Default for OctocrabClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL, DEFAULT_API_TIMEOUT)
    }
}

fn label_from(label: octocrab::models::Label) -> Label {
    Label {
        name: label.name,
        color: label.color,
        description: label.description,
    }
}

#[async_trait]
impl GithubApi for OctocrabClient {
    #[instrument(skip(self, session), fields(repo = %session.repo))]
    async fn search_issues(&self, session: &Session, query: &str) -> Result<Vec<SearchHit>> {
        let client = self.client(&session.token)?;

        let page = (|| async {
            self.timed(
                client
                    .search()
                    .issues_and_pull_requests(query)
                    .per_page(100)
                    .send(),
            )
            .await
        })
        .retry(retry_backoff())
        .when(is_retryable)
        .notify(|err, dur| {
            warn!(error = %err, retry_after = ?dur, "Retrying search_issues");
        })
        .await?;

        let hits: Vec<SearchHit> = page
            .items
            .into_iter()
            .filter(|item| item.pull_request.is_none())
            .map(|item| SearchHit {
                number: item.number,
                url: item.html_url.to_string(),
                body: item.body,
            })
            .collect();

        debug!(count = hits.len(), "Search returned issues");
        Ok(hits)
    }

    #[instrument(skip(self, session, issue), fields(repo = %session.repo))]
    async fn create_issue(&self, session: &Session, issue: &NewIssue) -> Result<IssueLink> {
        let client = self.client(&session.token)?;
        let handler = client.issues(&session.repo.owner, &session.repo.name);

        let created = self
            .timed(
                handler
                    .create(&issue.title)
                    .body(&issue.body)
                    .labels(issue.labels.clone())
                    .send(),
            )
            .await?;

        debug!(number = created.number, "Issue created");
        Ok(IssueLink {
            number: created.number,
            url: created.html_url.to_string(),
        })
    }

    #[instrument(skip(self, session), fields(repo = %session.repo))]
    async fn get_label(&self, session: &Session, name: &str) -> Result<Option<Label>> {
        let client = self.client(&session.token)?;
        let route = format!(
            "/repos/{}/{}/labels/{}",
            session.repo.owner,
            session.repo.name,
            utf8_percent_encode(name, NON_ALPHANUMERIC)
        );

        let result = (|| async {
            self.timed(client.get::<octocrab::models::Label, _, ()>(&route, None::<&()>))
                .await
        })
        .retry(retry_backoff())
        .when(is_retryable)
        .notify(|err, dur| {
            warn!(error = %err, retry_after = ?dur, "Retrying get_label");
        })
        .await;

        match result {
            Ok(label) => Ok(Some(label_from(label))),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, session, label), fields(repo = %session.repo, name = %label.name))]
    async fn create_label(&self, session: &Session, label: &LabelSpec) -> Result<Label> {
        let client = self.client(&session.token)?;
        let handler = client.issues(&session.repo.owner, &session.repo.name);

        match self
            .timed(handler.create_label(&label.name, &label.color, &label.description))
            .await
        {
            Ok(created) => Ok(label_from(created)),
            Err(err) if err.status() == Some(422) => {
                debug!("Label already exists");
                Ok(Label {
                    name: label.name.clone(),
                    color: label.color.clone(),
                    description: Some(label.description.clone()),
                })
            }
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, session), fields(repo = %session.repo))]
    async fn set_issue_labels(
        &self,
        session: &Session,
        number: u64,
        names: &[String],
    ) -> Result<()> {
        let client = self.client(&session.token)?;
        let handler = client.issues(&session.repo.owner, &session.repo.name);

        let applied = self.timed(handler.replace_all_labels(number, names)).await?;
        debug!(count = applied.len(), "Replaced issue labels");
        Ok(())
    }

    #[instrument(skip(self, session), fields(repo = %session.repo))]
    async fn get_issue_labels(&self, session: &Session, number: u64) -> Result<Vec<Label>> {
        let client = self.client(&session.token)?;

        let labels = (|| async {
            let handler = client.issues(&session.repo.owner, &session.repo.name);
            let first = self
                .timed(handler.list_labels_for_issue(number).per_page(100).send())
                .await?;
            self.timed(client.all_pages(first)).await
        })
        .retry(retry_backoff())
        .when(is_retryable)
        .notify(|err, dur| {
            warn!(error = %err, retry_after = ?dur, "Retrying get_issue_labels");
        })
        .await?;

        Ok(labels.into_iter().map(label_from).collect())
    }

    #[instrument(skip(self, session), fields(repo = %session.repo))]
    async fn list_issue_comments(&self, session: &Session, number: u64) -> Result<Vec<Comment>> {
        let client = self.client(&session.token)?;

        let comments = (|| async {
            let handler = client.issues(&session.repo.owner, &session.repo.name);
            let first = self
                .timed(handler.list_comments(number).per_page(100).send())
                .await?;
            self.timed(client.all_pages(first)).await
        })
        .retry(retry_backoff())
        .when(is_retryable)
        .notify(|err, dur| {
            warn!(error = %err, retry_after = ?dur, "Retrying list_issue_comments");
        })
        .await?;

        Ok(comments
            .into_iter()
            .map(|c| Comment {
                id: c.id.0,
                url: c.html_url.to_string(),
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self, session, body), fields(repo = %session.repo))]
    async fn create_issue_comment(
        &self,
        session: &Session,
        number: u64,
        body: &str,
    ) -> Result<CommentLink> {
        let client = self.client(&session.token)?;
        let handler = client.issues(&session.repo.owner, &session.repo.name);

        let comment = self.timed(handler.create_comment(number, body)).await?;
        debug!(id = comment.id.0, "Comment created");
        Ok(CommentLink {
            id: comment.id.0,
            url: comment.html_url.to_string(),
        })
    }
}
