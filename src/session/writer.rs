// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background queue for remote inserts.
//!
//! Callers enqueue and return immediately. A single task drains the queue in
//! order, retrying each insert with exponential backoff. Failures are only
//! logged: local state is already durable by the time a job is queued.

use crate::config::Config;
use crate::db::RemoteRecordStore;
use crate::error::StoreResult;
use crate::models::{ScanRecord, ViewedTopic};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Upper bound for a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How remote inserts are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per insert, including the first (at least 1)
    pub max_attempts: u32,
    /// Delay after the first failure, doubled after each further one
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.remote_write_max_attempts.max(1),
            initial_backoff: config.remote_write_backoff,
        }
    }

    /// Single attempt, no retry.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub(crate) enum WriteJob {
    Scan { owner: String, scan: ScanRecord },
    Topic { owner: String, topic: ViewedTopic },
    /// Resolved once every job queued before it has finished
    Flush(oneshot::Sender<()>),
}

/// Handle to the writer task. The task exits when the handle is dropped.
pub(crate) struct RemoteWriter {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl RemoteWriter {
    /// Start the writer task. Must be called within a tokio runtime.
    pub(crate) fn spawn<R: RemoteRecordStore>(remote: Arc<R>, policy: RetryPolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(remote, policy, rx));
        Self { tx }
    }

    pub(crate) fn enqueue(&self, job: WriteJob) {
        if self.tx.send(job).is_err() {
            tracing::error!("Remote writer has stopped, dropping insert");
        }
    }

    /// Wait until every insert queued so far has succeeded or given up.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.enqueue(WriteJob::Flush(done_tx));
        // An error means the task is gone, so nothing is pending either
        let _ = done_rx.await;
    }
}

async fn run<R: RemoteRecordStore>(
    remote: Arc<R>,
    policy: RetryPolicy,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
) {
    while let Some(job) = rx.recv().await {
        match job {
            WriteJob::Scan { owner, scan } => {
                insert_with_retry(&policy, "scan", &owner, || {
                    remote.insert_scan(&owner, &scan)
                })
                .await;
            }
            WriteJob::Topic { owner, topic } => {
                insert_with_retry(&policy, "topic", &owner, || {
                    remote.insert_topic(&owner, &topic)
                })
                .await;
            }
            WriteJob::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Remote writer stopped");
}

/// Run `insert` until it succeeds or the policy's attempts are used up.
async fn insert_with_retry<F, Fut>(policy: &RetryPolicy, kind: &str, owner: &str, mut insert: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<()>>,
{
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match insert().await {
            Ok(()) => {
                tracing::debug!(kind, uid = owner, attempt, "Remote insert succeeded");
                return;
            }
            Err(e) if attempt < max_attempts && e.is_retryable() => {
                let delay = policy.backoff(attempt);
                tracing::info!(
                    kind,
                    uid = owner,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote insert failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(
                    kind,
                    uid = owner,
                    attempt,
                    error = %e,
                    "Remote insert failed, giving up"
                );
                return;
            }
        }
    }
}
