//! Status poller.
//!
//! Repeatedly queries the quiz job status until a new step or the final result
//! is available, the total time budget runs out, or the caller cancels.
//! Transient (retriable) failures are absorbed inside the loop; everything else
//! is returned to the caller immediately.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::task::yield_now;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::ApiError;
use crate::model::{PollResult, SessionId};
use crate::traits::QuizBackend;

/// Lower bound on the timeout of a single status call.
pub const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on the timeout of a single status call.
pub const MAX_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll timing as it appears in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Hard budget for one poll loop.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_ms: u64,
    /// Wait before the first status call.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,
    /// Ceiling for any single backoff delay.
    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,
    /// Delay after the first unproductive status call.
    #[serde(default = "default_base_interval")]
    pub base_interval_ms: u64,
    /// Growth of the delay per attempt.
    #[serde(default = "default_increment")]
    pub increment_ms: u64,
    /// Upper bound of the random jitter added to each delay.
    #[serde(default = "default_max_jitter")]
    pub max_jitter_ms: u64,
}

fn default_total_timeout() -> u64 {
    90_000
}
fn default_initial_delay() -> u64 {
    1_000
}
fn default_max_interval() -> u64 {
    5_000
}
fn default_base_interval() -> u64 {
    1_000
}
fn default_increment() -> u64 {
    500
}
fn default_max_jitter() -> u64 {
    250
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            total_timeout_ms: default_total_timeout(),
            initial_delay_ms: default_initial_delay(),
            max_interval_ms: default_max_interval(),
            base_interval_ms: default_base_interval(),
            increment_ms: default_increment(),
            max_jitter_ms: default_max_jitter(),
        }
    }
}

impl PollConfig {
    /// Build the options for one poll loop.
    pub fn options(&self, known_count: u32) -> PollOptions {
        PollOptions {
            known_count,
            total_timeout: Duration::from_millis(self.total_timeout_ms),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            backoff: Backoff {
                base: Duration::from_millis(self.base_interval_ms),
                increment: Duration::from_millis(self.increment_ms),
                max_jitter: Duration::from_millis(self.max_jitter_ms),
            },
        }
    }
}

/// Options for a single call to [`poll`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollOptions {
    /// Questions the client has already seen.
    pub known_count: u32,
    pub total_timeout: Duration,
    pub initial_delay: Duration,
    pub max_interval: Duration,
    pub backoff: Backoff,
}

/// Linear backoff with bounded jitter.
///
/// Jitter is capped at `increment`, so the delay for attempt `n + 1` is never
/// shorter than the delay for attempt `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub increment: Duration,
    pub max_jitter: Duration,
}

impl Backoff {
    /// Largest jitter [`Backoff::delay`] will apply.
    pub fn jitter_bound(&self) -> Duration {
        self.max_jitter.min(self.increment)
    }

    /// Delay before the status call following attempt number `attempt`.
    pub fn delay(&self, attempt: u32, jitter: Duration, max_interval: Duration) -> Duration {
        self.base
            .saturating_add(self.increment.saturating_mul(attempt))
            .saturating_add(jitter.min(self.jitter_bound()))
            .min(max_interval)
    }

    /// Draw a random jitter in `[0, jitter_bound)`.
    pub fn sample_jitter(&self) -> Duration {
        let bound = self.jitter_bound().as_millis().min(u128::from(u64::MAX)) as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..bound))
    }
}

/// Per-call timeout for a status request given the remaining budget.
pub fn call_timeout(remaining: Duration) -> Duration {
    remaining.clamp(MIN_CALL_TIMEOUT, MAX_CALL_TIMEOUT)
}

/// Poll the status of `session_id` until something actionable happens.
///
/// Returns the first [`PollResult::ActiveStep`] or [`PollResult::Finished`].
/// Fails with [`ApiError::PollTimeout`] once `total_timeout` has elapsed, with
/// [`ApiError::Canceled`] if `cancel` fires, or with the first non-retriable
/// backend error. `on_tick` observes every successful status response.
#[instrument(
    skip(backend, options, cancel, on_tick),
    fields(session = %session_id, known = options.known_count)
)]
pub async fn poll<B, F>(
    backend: &B,
    session_id: &SessionId,
    options: &PollOptions,
    cancel: &CancellationToken,
    mut on_tick: F,
) -> Result<PollResult, ApiError>
where
    B: QuizBackend + ?Sized,
    F: FnMut(&PollResult) + Send,
{
    let start = Instant::now();

    if !options.initial_delay.is_zero() {
        sleep_with_cancellation(options.initial_delay.min(options.total_timeout), cancel).await?;
    }

    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(ApiError::Canceled);
        }

        let elapsed = start.elapsed();
        if elapsed >= options.total_timeout {
            let elapsed_ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
            tracing::warn!(attempt, elapsed_ms, "poll budget exhausted");
            return Err(ApiError::PollTimeout { elapsed_ms });
        }

        let timeout = call_timeout(options.total_timeout - elapsed);
        tracing::debug!(attempt, timeout_ms = timeout.as_millis() as u64, "checking quiz status");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Canceled),
            result = backend.quiz_status(session_id, options.known_count, timeout, cancel) => result,
        };

        match outcome {
            Ok(result) => {
                on_tick(&result);
                if result.is_actionable() {
                    tracing::debug!(attempt, "status produced new content");
                    return Ok(result);
                }
            }
            Err(err) if err.is_retriable() => {
                tracing::warn!(attempt, error = %err, "status check failed; retrying");
            }
            Err(err) => return Err(err),
        }

        let delay = options
            .backoff
            .delay(attempt, options.backoff.sample_jitter(), options.max_interval);
        attempt = attempt.saturating_add(1);

        let remaining = options.total_timeout.saturating_sub(start.elapsed());
        sleep_with_cancellation(delay.min(remaining), cancel).await?;
    }
}

async fn sleep_with_cancellation(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<(), ApiError> {
    if cancel.is_cancelled() {
        return Err(ApiError::Canceled);
    }

    if delay.is_zero() {
        yield_now().await;
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Canceled),
        _ = sleep(delay) => Ok(()),
    }
}
