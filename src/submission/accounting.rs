//! Per-request accounting of accepted and dropped items.
//!
//! A [`BatchAccountant`] is created for each request, threaded through the
//! pipeline by `&mut`, and finished into [`BatchCounts`]. [`emit`] flushes the
//! counts to a [`MetricsSink`] exactly once.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::{InvalidEntry, InvalidReport};
use super::models::NormalizedReport;
use crate::observability::{MetricsError, MetricsSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Cell,
    Wifi,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
    pub batches: u64,
    /// Entries in the submitted `items` array.
    pub items: u64,
    pub reports: u64,
    pub reports_dropped: u64,
    pub cell_observations: u64,
    pub cells_dropped: u64,
    pub cell_duplicates: u64,
    pub wifi_observations: u64,
    pub wifis_dropped: u64,
    pub wifi_duplicates: u64,
}

#[derive(Debug)]
pub struct BatchAccountant {
    counts: BatchCounts,
}

impl BatchAccountant {
    pub fn new(items: usize) -> Self {
        Self {
            counts: BatchCounts {
                batches: 1,
                items: items as u64,
                ..BatchCounts::default()
            },
        }
    }

    /// Consume per-entry outcomes, counting skips and returning the entries
    /// that survived.
    pub fn accept_entries<T>(
        &mut self,
        kind: EntryKind,
        outcomes: impl IntoIterator<Item = Result<T, InvalidEntry>>,
    ) -> Vec<T> {
        let mut accepted = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(entry) => accepted.push(entry),
                Err(reason) => {
                    debug!(?kind, %reason, "Dropping entry");
                    match kind {
                        EntryKind::Cell => self.counts.cells_dropped += 1,
                        EntryKind::Wifi => self.counts.wifis_dropped += 1,
                    }
                }
            }
        }
        accepted
    }

    pub fn duplicates(&mut self, kind: EntryKind, discarded: usize) {
        match kind {
            EntryKind::Cell => self.counts.cell_duplicates += discarded as u64,
            EntryKind::Wifi => self.counts.wifi_duplicates += discarded as u64,
        }
    }

    pub fn report_accepted(&mut self, report: &NormalizedReport) {
        self.counts.reports += 1;
        self.counts.cell_observations += report.cells.len() as u64;
        self.counts.wifi_observations += report.wifis.len() as u64;
    }

    pub fn report_dropped(&mut self, reason: InvalidReport) {
        debug!(%reason, "Dropping report");
        self.counts.reports_dropped += 1;
    }

    pub fn finish(self) -> BatchCounts {
        self.counts
    }
}

/// Emit the counts for one request, tagged with the caller's API key.
///
/// Sink failures are logged and swallowed.
pub fn emit(counts: &BatchCounts, api_key: &str, sink: &dyn MetricsSink) {
    let uploaded = [
        ("batches", counts.batches),
        ("reports", counts.reports),
        ("cell_observations", counts.cell_observations),
        ("wifi_observations", counts.wifi_observations),
    ];
    for (category, value) in uploaded {
        record(sink.incr(&format!("items.uploaded.{category}"), value));
        record(sink.incr(&format!("items.api_log.{api_key}.uploaded.{category}"), value));
    }

    let dropped = [
        ("reports", counts.reports_dropped),
        ("cell_observations", counts.cells_dropped),
        ("wifi_observations", counts.wifis_dropped),
    ];
    for (category, value) in dropped {
        record(sink.incr(&format!("items.dropped.{category}"), value));
    }

    let duplicated = [
        ("cell_observations", counts.cell_duplicates),
        ("wifi_observations", counts.wifi_duplicates),
    ];
    for (category, value) in duplicated {
        record(sink.incr(&format!("items.duplicated.{category}"), value));
    }

    record(sink.timing("items.uploaded.batch_size", counts.items));
    record(sink.timing(&format!("items.api_log.{api_key}.uploaded.batch_size"), counts.items));

    info!(
        api_key,
        items = counts.items,
        reports = counts.reports,
        cells = counts.cell_observations,
        wifis = counts.wifi_observations,
        dropped_reports = counts.reports_dropped,
        "Batch accounted"
    );
}

fn record(result: Result<(), MetricsError>) {
    if let Err(err) = result {
        warn!(error = %err, "Failed to emit metric");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Metrics;

    struct BrokenSink;

    impl MetricsSink for BrokenSink {
        fn incr(&self, _name: &str, _value: u64) -> Result<(), MetricsError> {
            Err(MetricsError::Unavailable("statsd down".into()))
        }

        fn timing(&self, _name: &str, _value: u64) -> Result<(), MetricsError> {
            Err(MetricsError::Unavailable("statsd down".into()))
        }
    }

    #[test]
    fn test_accept_entries_counts_drops() {
        let mut accountant = BatchAccountant::new(1);
        let kept = accountant.accept_entries(
            EntryKind::Wifi,
            vec![Ok(1), Err(InvalidEntry::InvalidMac), Ok(2)],
        );
        accountant.duplicates(EntryKind::Wifi, 1);
        accountant.report_dropped(InvalidReport::OutOfBounds);

        let counts = accountant.finish();
        assert_eq!(kept, vec![1, 2]);
        assert_eq!(counts.batches, 1);
        assert_eq!(counts.items, 1);
        assert_eq!(counts.wifis_dropped, 1);
        assert_eq!(counts.wifi_duplicates, 1);
        assert_eq!(counts.reports_dropped, 1);
        assert_eq!(counts.cells_dropped, 0);
    }

    #[test]
    fn test_emit_tags_by_api_key() {
        let metrics = Metrics::new();
        let counts = BatchCounts {
            batches: 1,
            items: 3,
            reports: 2,
            wifi_observations: 4,
            ..BatchCounts::default()
        };

        emit(&counts, "test", &metrics);

        assert_eq!(metrics.counter("items.uploaded.batches"), Some(1));
        assert_eq!(metrics.counter("items.uploaded.reports"), Some(2));
        assert_eq!(metrics.counter("items.api_log.test.uploaded.wifi_observations"), Some(4));
        assert_eq!(metrics.counter("items.api_log.test.uploaded.cell_observations"), Some(0));
        assert_eq!(metrics.counter("items.dropped.reports"), Some(0));
        let batch_size = metrics.timer("items.uploaded.batch_size").unwrap();
        assert_eq!((batch_size.count, batch_size.sum), (1, 3));
        let per_key = metrics.timer("items.api_log.test.uploaded.batch_size").unwrap();
        assert_eq!((per_key.count, per_key.sum), (1, 3));
    }

    #[test]
    fn test_emit_survives_broken_sink() {
        let counts = BatchAccountant::new(0).finish();
        emit(&counts, "test", &BrokenSink);
    }
}
