// SPDX-License-Identifier: Apache-2.0

//! Shared fakes for the engine integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use orchid_sync::{
    Collection, Comment, CommentLink, CredentialProvider, Dispatcher, GithubApi, IssueLink, Label,
    LabelSpec, MemoryDocumentStore, NewIssue, RepoRef, RetryPolicy, SearchHit, Session,
    StaticTokenProvider, SyncEngine, SyncError,
};
use secrecy::SecretString;
use serde_json::{Map, Value, json};

pub const REPO: &str = "orchid/app";

/// An issue as stored by [`FakeGithub`].
#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub repo: String,
    pub number: u64,
    pub url: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub comments: Vec<Comment>,
}

type Hook = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct FakeState {
    issues: Vec<FakeIssue>,
    labels: HashMap<String, Vec<Label>>,
    calls: Vec<String>,
    failures: HashMap<String, u16>,
    next_comment_id: u64,
}

/// In-memory GitHub with a call log and injectable failures.
#[derive(Default)]
pub struct FakeGithub {
    state: Mutex<FakeState>,
    create_hook: Mutex<Option<Hook>>,
}

impl FakeGithub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, op: &str, session: &Session) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{op} {}", session.repo));
        match state.failures.get(op) {
            Some(status) => Err(SyncError::github(Some(*status), format!("{op} failed"))),
            None => Ok(()),
        }
    }

    /// Operation names, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|call| call.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    /// Calls with their target repository, e.g. `create_issue orchid/app`.
    pub fn calls_with_repo(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|call| *call == op).count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Makes every call to `op` fail with `status` until cleared.
    pub fn fail(&self, op: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(op.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    /// Runs `hook` inside `create_issue`, after the worker has read its merge base.
    pub fn on_create_issue(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.create_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn issues(&self) -> Vec<FakeIssue> {
        self.state.lock().unwrap().issues.clone()
    }

    pub fn issue(&self, number: u64) -> FakeIssue {
        self.issues()
            .into_iter()
            .find(|issue| issue.number == number)
            .unwrap()
    }

    /// Seeds an issue created outside the engine. Returns its number.
    pub fn seed_issue(&self, title: &str, body: &str, labels: &[&str]) -> u64 {
        let mut state = self.state.lock().unwrap();
        let number = state.issues.len() as u64 + 1;
        state.issues.push(FakeIssue {
            repo: REPO.to_string(),
            number,
            url: format!("https://github.com/{REPO}/issues/{number}"),
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            comments: Vec::new(),
        });
        number
    }

    /// Adds a label to an issue the way a human would in the GitHub UI.
    pub fn add_label(&self, number: u64, name: &str) {
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .unwrap();
        issue.labels.push(name.to_string());
    }

    /// Seeds a comment on an issue. Returns its id.
    pub fn seed_comment(&self, number: u64, body: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_comment_id += 1;
        let id = 1000 + state.next_comment_id;
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .unwrap();
        issue.comments.push(Comment {
            id,
            url: format!("{}#issuecomment-{id}", issue.url),
            body: body.to_string(),
        });
        id
    }

    pub fn repo_labels(&self, repo: &str) -> Vec<Label> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }
}

fn quoted_phrase(query: &str) -> &str {
    query.split('"').nth(1).unwrap_or(query)
}

#[async_trait]
impl GithubApi for FakeGithub {
    async fn search_issues(
        &self,
        session: &Session,
        query: &str,
    ) -> orchid_sync::Result<Vec<SearchHit>> {
        self.record("search_issues", session)?;
        // Substring match stands in for GitHub's tokenized full-text search.
        let phrase = quoted_phrase(query);
        let repo = session.repo.to_string();
        Ok(self
            .issues()
            .into_iter()
            .filter(|issue| issue.repo == repo && issue.body.contains(phrase))
            .map(|issue| SearchHit {
                number: issue.number,
                url: issue.url,
                body: Some(issue.body),
            })
            .collect())
    }

    async fn create_issue(
        &self,
        session: &Session,
        issue: &NewIssue,
    ) -> orchid_sync::Result<IssueLink> {
        self.record("create_issue", session)?;
        if let Some(hook) = self.create_hook.lock().unwrap().as_ref() {
            hook();
        }

        let mut state = self.state.lock().unwrap();
        let number = state.issues.len() as u64 + 1;
        let url = format!("https://github.com/{}/issues/{number}", session.repo);
        state.issues.push(FakeIssue {
            repo: session.repo.to_string(),
            number,
            url: url.clone(),
            title: issue.title.clone(),
            body: issue.body.clone(),
            labels: issue.labels.clone(),
            comments: Vec::new(),
        });
        Ok(IssueLink { number, url })
    }

    async fn get_label(&self, session: &Session, name: &str) -> orchid_sync::Result<Option<Label>> {
        self.record("get_label", session)?;
        Ok(self
            .repo_labels(&session.repo.to_string())
            .into_iter()
            .find(|label| label.name.eq_ignore_ascii_case(name)))
    }

    async fn create_label(
        &self,
        session: &Session,
        label: &LabelSpec,
    ) -> orchid_sync::Result<Label> {
        self.record("create_label", session)?;
        let created = Label {
            name: label.name.clone(),
            color: label.color.clone(),
            description: Some(label.description.clone()),
        };
        let mut state = self.state.lock().unwrap();
        let labels = state.labels.entry(session.repo.to_string()).or_default();
        if !labels.iter().any(|l| l.name.eq_ignore_ascii_case(&label.name)) {
            labels.push(created.clone());
        }
        Ok(created)
    }

    async fn set_issue_labels(
        &self,
        session: &Session,
        number: u64,
        names: &[String],
    ) -> orchid_sync::Result<()> {
        self.record("set_issue_labels", session)?;
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .ok_or_else(|| SyncError::github(Some(404), "Not Found"))?;
        issue.labels = names.to_vec();
        Ok(())
    }

    async fn get_issue_labels(
        &self,
        session: &Session,
        number: u64,
    ) -> orchid_sync::Result<Vec<Label>> {
        self.record("get_issue_labels", session)?;
        let state = self.state.lock().unwrap();
        let issue = state
            .issues
            .iter()
            .find(|issue| issue.number == number)
            .ok_or_else(|| SyncError::github(Some(404), "Not Found"))?;
        Ok(issue
            .labels
            .iter()
            .map(|name| Label {
                name: name.clone(),
                color: String::new(),
                description: None,
            })
            .collect())
    }

    async fn list_issue_comments(
        &self,
        session: &Session,
        number: u64,
    ) -> orchid_sync::Result<Vec<Comment>> {
        self.record("list_issue_comments", session)?;
        let state = self.state.lock().unwrap();
        let issue = state
            .issues
            .iter()
            .find(|issue| issue.number == number)
            .ok_or_else(|| SyncError::github(Some(404), "Not Found"))?;
        Ok(issue.comments.clone())
    }

    async fn create_issue_comment(
        &self,
        session: &Session,
        number: u64,
        body: &str,
    ) -> orchid_sync::Result<CommentLink> {
        self.record("create_issue_comment", session)?;
        let mut state = self.state.lock().unwrap();
        state.next_comment_id += 1;
        let id = 1000 + state.next_comment_id;
        let issue = state
            .issues
            .iter_mut()
            .find(|issue| issue.number == number)
            .ok_or_else(|| SyncError::github(Some(404), "Not Found"))?;
        let url = format!("{}#issuecomment-{id}", issue.url);
        issue.comments.push(Comment {
            id,
            url: url.clone(),
            body: body.to_string(),
        });
        Ok(CommentLink { id, url })
    }
}

/// Queues dispatched tasks and runs them on demand.
#[derive(Default)]
pub struct ManualDispatcher {
    immediate: Mutex<VecDeque<BoxFuture<'static, ()>>>,
    delayed: Mutex<VecDeque<BoxFuture<'static, ()>>>,
    delays: Mutex<Vec<Duration>>,
}

impl ManualDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runs queued immediate tasks, including ones they dispatch. Returns how many ran.
    pub async fn run_immediate(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.immediate.lock().unwrap().pop_front();
            let Some(task) = next else { break };
            task.await;
            ran += 1;
        }
        ran
    }

    /// Runs the delayed tasks queued so far, as if their timers fired. Returns how many ran.
    pub async fn run_delayed(&self) -> usize {
        let due: Vec<_> = self.delayed.lock().unwrap().drain(..).collect();
        let ran = due.len();
        for task in due {
            task.await;
        }
        ran
    }

    pub fn pending_immediate(&self) -> usize {
        self.immediate.lock().unwrap().len()
    }

    pub fn pending_delayed(&self) -> usize {
        self.delayed.lock().unwrap().len()
    }

    /// Every delay requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Dispatcher for ManualDispatcher {
    fn dispatch(&self, task: BoxFuture<'static, ()>) {
        self.immediate.lock().unwrap().push_back(task);
    }

    fn dispatch_after(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        self.delays.lock().unwrap().push(delay);
        self.delayed.lock().unwrap().push_back(task);
    }
}

/// Credentials that always fail.
pub struct MissingCredentials;

#[async_trait]
impl CredentialProvider for MissingCredentials {
    async fn token(&self) -> orchid_sync::Result<SecretString> {
        Err(SyncError::AuthConfig {
            message: "github.app_id is required".to_string(),
        })
    }
}

pub struct Harness {
    pub store: Arc<MemoryDocumentStore>,
    pub github: Arc<FakeGithub>,
    pub dispatcher: Arc<ManualDispatcher>,
    pub engine: SyncEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::sharing(FakeGithub::new())
    }

    /// A second replica talking to the same GitHub.
    pub fn sharing(github: Arc<FakeGithub>) -> Self {
        Self::build(github, Arc::new(static_token()), Some(REPO))
    }

    pub fn build(
        github: Arc<FakeGithub>,
        credentials: Arc<dyn CredentialProvider>,
        default_repo: Option<&str>,
    ) -> Self {
        let store = Arc::new(MemoryDocumentStore::new());
        let dispatcher = ManualDispatcher::new();
        let engine = SyncEngine::builder()
            .store(store.clone())
            .github(github.clone())
            .credentials(credentials)
            .dispatcher(dispatcher.clone())
            .policy(RetryPolicy::default())
            .maybe_default_repo(default_repo.map(|repo| repo.parse::<RepoRef>().unwrap()))
            .build();
        Self {
            store,
            github,
            dispatcher,
            engine,
        }
    }

    pub fn insert_issue(&self, row: &Value) {
        let id = row["id"].as_str().unwrap().to_string();
        self.store.insert(Collection::Issues, &id, row).unwrap();
    }

    pub fn insert_reply(&self, row: &Value) {
        let id = row["id"].as_str().unwrap().to_string();
        self.store.insert(Collection::Replies, &id, row).unwrap();
    }

    pub fn issue_record(&self, id: &str) -> Map<String, Value> {
        self.store.materialize(Collection::Issues, id).unwrap().unwrap()
    }

    pub fn reply_record(&self, id: &str) -> Map<String, Value> {
        self.store.materialize(Collection::Replies, id).unwrap().unwrap()
    }

    /// Runs everything dispatched so far, retries included, until idle.
    pub async fn settle(&self) {
        for _ in 0..100 {
            let ran = self.dispatcher.run_immediate().await + self.dispatcher.run_delayed().await;
            if ran == 0 {
                return;
            }
        }
        panic!("dispatcher did not settle");
    }
}

pub fn static_token() -> StaticTokenProvider {
    StaticTokenProvider::new(SecretString::from("ghs_test".to_string()))
}

pub fn issue_row(id: &str, title: &str, body: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "body": body,
        "status": status,
        "createdAt": 1_700_000_000_000_i64,
        "updatedAt": 1_700_000_000_000_i64,
        "createdBy": { "name": "Ada", "color": "#7c3aed" },
        "githubSyncStatus": "pending",
    })
}

pub fn reply_row(id: &str, issue_id: &str, body: &str) -> Value {
    json!({
        "id": id,
        "issueId": issue_id,
        "type": "reply",
        "body": body,
        "createdAt": 1_700_000_100_000_i64,
        "author": { "name": "Grace", "color": "#0ea5e9" },
    })
}
