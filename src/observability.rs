//! Observability: tracing setup and the metrics sink

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// Install the global fmt subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registry lock poisoned")]
    Poisoned,

    #[error("metrics sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for counters and timer samples.
///
/// Callers treat failures as best effort: they are logged and dropped.
pub trait MetricsSink: Send + Sync {
    fn incr(&self, name: &str, value: u64) -> Result<(), MetricsError>;

    fn timing(&self, name: &str, value: u64) -> Result<(), MetricsError>;
}

/// Running aggregate of one timer; samples themselves are not kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerStats {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl TimerStats {
    fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

/// In-process metrics registry
#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<BTreeMap<String, u64>>,
    timers: Mutex<BTreeMap<String, TimerStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.lock().ok()?.get(name).copied()
    }

    pub fn timer(&self, name: &str) -> Option<TimerStats> {
        self.timers.lock().ok()?.get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self
                .counters
                .lock()
                .map(|counters| counters.clone())
                .unwrap_or_default(),
            timers: self
                .timers
                .lock()
                .map(|timers| timers.clone())
                .unwrap_or_default(),
        }
    }
}

impl MetricsSink for Metrics {
    fn incr(&self, name: &str, value: u64) -> Result<(), MetricsError> {
        let mut counters = self.counters.lock().map_err(|_| MetricsError::Poisoned)?;
        *counters.entry(name.to_string()).or_default() += value;
        tracing::debug!(counter = name, value, "Metric incremented");
        Ok(())
    }

    fn timing(&self, name: &str, value: u64) -> Result<(), MetricsError> {
        let mut timers = self.timers.lock().map_err(|_| MetricsError::Poisoned)?;
        timers.entry(name.to_string()).or_default().record(value);
        tracing::debug!(timer = name, value, "Timer sample recorded");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub timers: BTreeMap<String, TimerStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = Metrics::new();
        metrics.incr("items.uploaded.reports", 2).unwrap();
        metrics.incr("items.uploaded.reports", 3).unwrap();

        assert_eq!(metrics.counter("items.uploaded.reports"), Some(5));
        assert_eq!(metrics.counter("items.uploaded.batches"), None);
    }

    #[test]
    fn test_timers_aggregate_samples() {
        let metrics = Metrics::new();
        metrics.timing("items.uploaded.batch_size", 4).unwrap();
        metrics.timing("items.uploaded.batch_size", 7).unwrap();
        metrics.timing("items.uploaded.batch_size", 1).unwrap();

        let stats = metrics.timer("items.uploaded.batch_size").unwrap();
        assert_eq!(
            stats,
            TimerStats {
                count: 3,
                sum: 12,
                min: 1,
                max: 7
            }
        );
        assert_eq!(stats.mean(), Some(4.0));
        assert_eq!(metrics.timer("items.uploaded.other"), None);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.timers.len(), 1);
        assert!(snapshot.counters.is_empty());
    }
}
