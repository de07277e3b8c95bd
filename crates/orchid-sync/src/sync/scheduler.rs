// SPDX-License-Identifier: Apache-2.0

//! Fire-and-forget dispatch and the replication-lag backoff schedule.

use std::time::Duration;

use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::config::RetryConfig;

/// Runs tasks detached from the caller.
pub trait Dispatcher: Send + Sync {
    /// Runs `task` as soon as possible.
    fn dispatch(&self, task: BoxFuture<'static, ()>);

    /// Runs `task` after `delay`.
    fn dispatch_after(&self, delay: Duration, task: BoxFuture<'static, ()>);
}

/// Dispatches onto a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct TokioDispatcher {
    handle: Option<Handle>,
}

impl TokioDispatcher {
    /// Spawns onto the ambient runtime of each call site.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns onto a specific runtime.
    #[must_use]
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn spawn(&self, task: BoxFuture<'static, ()>) {
        // Detached: workers record their own outcome.
        match &self.handle {
            Some(handle) => drop(handle.spawn(task)),
            None => drop(tokio::spawn(task)),
        }
    }
}

impl Dispatcher for TokioDispatcher {
    fn dispatch(&self, task: BoxFuture<'static, ()>) {
        self.spawn(task);
    }

    fn dispatch_after(&self, delay: Duration, task: BoxFuture<'static, ()>) {
        self.spawn(Box::pin(async move {
            tokio::time::sleep(delay).await;
            task.await;
        }));
    }
}

/// Backoff schedule for entities that are not visible or not linked yet.
///
/// `delay(attempt) = min(max_delay, base_delay * (attempt + 1)) + jitter`,
/// with jitter drawn uniformly from `[0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay step per attempt.
    pub base_delay: Duration,
    /// Cap on the stepped delay.
    pub max_delay: Duration,
    /// Exclusive upper bound of the random jitter.
    pub jitter: Duration,
    /// Attempts before giving up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_attempts: config.max_attempts,
        }
    }
}

impl RetryPolicy {
    /// Deterministic part of the delay before `attempt`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(attempt.saturating_add(1))
            .min(self.max_delay)
    }

    /// Delay before `attempt`, jitter included.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(fastrand::u64(0..jitter_ms))
        };
        self.base_delay(attempt) + jitter
    }

    /// Whether another attempt may be scheduled.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
