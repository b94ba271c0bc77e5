//! Time-series metric samples with bounded retention.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use serde::Serialize;

use super::{Store, StoreError};

/// Samples older than this are pruned on every write.
pub const METRIC_RETENTION_HOURS: i64 = 24;

/// One cpu/memory sample.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    /// Sample time, epoch milliseconds.
    pub ts: i64,
    /// Global CPU usage percentage.
    pub cpu: f64,
    /// Memory usage percentage.
    pub memory: f64,
}

impl Store {
    /// Insert a sample and prune everything past the retention window.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn insert_metric_sample(
        &self,
        sample: &MetricSample,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let cutoff = (now - Duration::hours(METRIC_RETENTION_HOURS)).timestamp_millis();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO metric_samples (ts, cpu, memory) VALUES (?1, ?2, ?3)",
            params![sample.ts, sample.cpu, sample.memory],
        )?;
        conn.execute("DELETE FROM metric_samples WHERE ts < ?1", params![cutoff])?;
        Ok(())
    }

    /// Samples at or after `since` (epoch ms), ascending by time.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn metric_samples_since(&self, since: i64) -> Result<Vec<MetricSample>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ts, cpu, memory FROM metric_samples WHERE ts >= ?1 ORDER BY ts ASC",
        )?;
        let rows = stmt.query_map(params![since], |row| {
            Ok(MetricSample {
                ts: row.get(0)?,
                cpu: row.get(1)?,
                memory: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
