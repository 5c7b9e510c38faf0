//! Bounded exponential-backoff polling with cooperative cancellation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ClientError;

const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_MULTIPLIER: f64 = 1.5;
const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(15);
const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum PollError {
    #[error("gave up after {elapsed:?} without a result")]
    TimedOut { elapsed: Duration },
    #[error("polling was cancelled")]
    Cancelled,
    #[error("backend rejected the poll: {0}")]
    Rejected(#[source] Box<ClientError>),
}

/// Delay schedule between probes.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Total wall-clock budget across all probes.
    pub max_elapsed: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed: DEFAULT_MAX_ELAPSED,
        }
    }
}

impl BackoffPolicy {
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }
}

/// Probe until it yields `Some`, the budget runs out, or `cancel` fires.
///
/// Probes run strictly one after another: the next delay starts only once the
/// previous probe has returned. Transient errors are logged and polling
/// continues; anything else aborts with [`PollError::Rejected`].
pub async fn poll_until<T, F, Fut>(
    policy: &BackoffPolicy,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ClientError>>,
{
    let started = Instant::now();
    let mut interval = policy.initial_interval;
    let mut attempt: u32 = 0;

    loop {
        let remaining = policy.max_elapsed.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(PollError::TimedOut {
                elapsed: started.elapsed(),
            });
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = sleep(interval.min(remaining)) => {}
        }

        attempt += 1;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            outcome = probe() => outcome,
        };

        match outcome {
            Ok(Some(value)) => {
                debug!(attempt, "Poll completed");
                return Ok(value);
            }
            Ok(None) => debug!(attempt, ?interval, "Poll not ready"),
            Err(err) if err.is_transient() => {
                warn!(attempt, error = %err, "Poll attempt failed, retrying");
            }
            Err(err) => return Err(PollError::Rejected(Box::new(err))),
        }

        interval = policy.next_interval(interval);
    }
}
