//! Background system metrics sampler.
//!
//! An independent scheduled task: every [`SAMPLE_INTERVAL`] it records one
//! global cpu/memory sample into the store, which prunes anything past the
//! retention window on the same write. Failures are logged and the loop
//! continues; the task stops when the shutdown signal flips.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sysinfo::System;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{MetricSample, Store};

/// Time between samples.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

/// A live cpu/memory reading.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Sample time, epoch milliseconds.
    pub ts: i64,
    /// Global CPU usage percentage.
    pub cpu: f64,
    /// Memory usage percentage.
    pub memory: f64,
}

/// Take one live reading. CPU usage needs two refreshes separated by the
/// minimum sysinfo interval, so this suspends briefly.
pub async fn sample_system() -> MetricsSnapshot {
    let mut sys = System::new();
    sys.refresh_cpu();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu = f64::from(sys.global_cpu_info().cpu_usage());
    let total = sys.total_memory();
    let memory = if total == 0 {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        {
            sys.used_memory() as f64 / total as f64 * 100.0
        }
    };

    MetricsSnapshot {
        ts: Utc::now().timestamp_millis(),
        cpu,
        memory,
    }
}

/// Spawn the sampler loop. Returns the task handle; the loop exits when
/// `shutdown` observes a change.
pub fn spawn(store: Store, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = sample_system().await;
                    let sample = MetricSample {
                        ts: snapshot.ts,
                        cpu: snapshot.cpu,
                        memory: snapshot.memory,
                    };
                    if let Err(err) = store.insert_metric_sample(&sample, Utc::now()) {
                        warn!(error = %err, "failed to record metrics sample");
                    } else {
                        debug!(cpu = sample.cpu, memory = sample.memory, "recorded metrics sample");
                    }
                },
                _ = shutdown.changed() => break,
            }
        }
        debug!("metrics sampler stopped");
    })
}
