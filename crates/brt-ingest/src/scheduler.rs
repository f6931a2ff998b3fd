//! Interval scheduler
//!
//! Triggers one pipeline run per tick. A run is always awaited before the
//! next tick is taken, so runs never overlap; ticks missed while a run is
//! still going are delayed rather than fired in a burst. A failed run is
//! logged and the schedule continues.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::error::IngestResult;

/// Counters reported when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub runs: u64,
    pub failures: u64,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
    max_runs: Option<u64>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            max_runs: None,
        }
    }

    /// Stop after `max_runs` runs, successful or not
    pub fn with_max_runs(mut self, max_runs: Option<u64>) -> Self {
        self.max_runs = max_runs;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tick until `shutdown` resolves or the run limit is reached.
    ///
    /// The first run starts immediately. A run already in progress when
    /// `shutdown` resolves is finished first.
    pub async fn run<F, Fut, T, S>(&self, mut job: F, shutdown: S) -> ScheduleSummary
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = IngestResult<T>>,
        S: Future<Output = ()>,
    {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut summary = ScheduleSummary::default();
        info!(
            period_secs = self.period.as_secs(),
            max_runs = ?self.max_runs,
            "Scheduler started"
        );

        loop {
            if self.max_runs.is_some_and(|max| summary.runs >= max) {
                info!(runs = summary.runs, "Run limit reached");
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {}
            }

            summary.runs += 1;
            if let Err(e) = job().await {
                summary.failures += 1;
                warn!(
                    run = summary.runs,
                    stage = %e.stage(),
                    error = %e,
                    "Scheduled run failed, waiting for next tick"
                );
            }
        }

        info!(runs = summary.runs, failures = summary.failures, "Scheduler stopped");
        summary
    }
}

/// Resolves on Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
