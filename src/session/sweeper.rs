//! Background sweep of idle and expired sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{SessionStore, SweepOutcome};

/// Periodically removes idle pending sessions and sessions whose token expired.
pub struct SessionSweeper {
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting session sweeper"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutdown requested");
                    break;
                }
                _ = sleep(self.interval) => {
                    let tick_started = std::time::Instant::now();
                    self.tick().await;
                    histogram!("session_sweep_duration_ms")
                        .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Session sweeper stopped");
    }

    /// One sweep pass.
    pub async fn tick(&self) -> SweepOutcome {
        let outcome = self.store.sweep(Utc::now()).await;
        let remaining = self.store.len().await;

        counter!("sessions_swept_total", "reason" => "idle").increment(outcome.idle_removed as u64);
        counter!("sessions_swept_total", "reason" => "expired")
            .increment(outcome.expired_removed as u64);
        gauge!("sessions_active_gauge").set(remaining as f64);

        debug!(
            idle_removed = outcome.idle_removed,
            expired_removed = outcome.expired_removed,
            remaining,
            "Session sweep completed"
        );

        outcome
    }
}
