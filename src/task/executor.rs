//! Retry-With-Timeout Task Executor
//!
//! Runs a unit of work on a background task until it succeeds, fails
//! permanently, or the overall deadline passes.
//!
//! ```text
//!  caller ──spawn──▶ worker: attempt ─┬─ Ok ───────────────▶ oneshot ─┐
//!    │                      ▲         ├─ Err(fail) ────────▶ oneshot ─┤
//!    │                      └─ sleep ◀┴─ Err(retry)                   │
//!    └──── select(oneshot, deadline) ◀───────────────────────────────┘
//! ```
//!
//! When the deadline wins, the caller cancels the worker's token and returns
//! straight away. The worker stops at its next await point. It is not joined,
//! so it may still be running for a moment after [`run`] has returned; its
//! late result goes into a closed `oneshot` and is dropped.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// =============================================================================
// Attempt Outcome
// =============================================================================

/// Failure of a single attempt, tagged with whether to try again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub error: Error,
    pub retry: bool,
}

impl Attempt {
    /// Failed, try again after the retry delay
    pub fn retry(error: Error) -> Self {
        Self { error, retry: true }
    }

    /// Failed for good, stop now
    pub fn fail(error: Error) -> Self {
        Self { error, retry: false }
    }
}

impl From<Error> for Attempt {
    /// Transient kinds are retried, everything else stops the task
    fn from(error: Error) -> Self {
        let retry = error.is_transient();
        Self { error, retry }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Overall deadline and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Wall-clock deadline in milliseconds; `None` waits forever
    pub timeout_ms: Option<u64>,
    /// Sleep between a retryable failure and the next attempt
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: Some(60_000),
            retry_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Option<Duration>, retry_delay: Duration) -> Self {
        Self {
            timeout_ms: timeout.map(saturating_millis),
            retry_delay_ms: saturating_millis(retry_delay),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Run `work` under this policy
    pub async fn run<T, F, Fut>(&self, task: &str, work: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, Attempt>> + Send + 'static,
    {
        run(task, work, self.timeout(), self.retry_delay()).await
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// Executor
// =============================================================================

/// Run `work` until it succeeds, fails without `retry`, or `timeout` elapses.
///
/// The deadline is measured from the call to `run`; attempt latency and retry
/// sleeps are not deducted from or added to it. Only the terminal error is
/// returned, intermediate failures are logged. Dropping the returned future
/// cancels the worker as well.
pub async fn run<T, F, Fut>(
    task: &str,
    work: F,
    timeout: Option<Duration>,
    retry_delay: Duration,
) -> Result<T, Error>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, Attempt>> + Send + 'static,
{
    let started = Instant::now();
    let token = CancellationToken::new();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(worker(
        task.to_string(),
        work,
        retry_delay,
        token.clone(),
        tx,
    ));

    // Cancels the worker on every exit path, including this future being dropped
    let _guard = token.drop_guard();

    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(received) => received,
            Err(_) => {
                warn!(task, timeout = ?limit, "task timed out");
                return Err(Error::TimedOut(limit));
            }
        },
        None => rx.await,
    };

    match outcome {
        Ok(result) => {
            debug!(task, elapsed = ?started.elapsed(), ok = result.is_ok(), "task finished");
            result
        }
        // The sender only drops without sending if the work panicked
        Err(_) => Err(Error::wrap(format!("task {} aborted before reporting a result", task))),
    }
}

async fn worker<T, F, Fut>(
    task: String,
    mut work: F,
    retry_delay: Duration,
    token: CancellationToken,
    tx: oneshot::Sender<Result<T, Error>>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Attempt>>,
{
    let mut attempt: u32 = 0;

    let result = loop {
        attempt += 1;

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            outcome = work() => outcome,
        };

        match outcome {
            Ok(value) => break Ok(value),
            Err(Attempt { error, retry: false }) => {
                debug!(task = %task, attempt, kind = %error.kind(), error = %error, "attempt failed permanently");
                break Err(error);
            }
            Err(Attempt { error, retry: true }) => {
                warn!(
                    task = %task,
                    attempt,
                    kind = %error.kind(),
                    error = %error,
                    "attempt failed, retrying in {:?}",
                    retry_delay
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    };

    // Receiver is gone if the caller already timed out
    if tx.send(result).is_err() {
        debug!(task = %task, "result discarded, caller no longer waiting");
    }
}
