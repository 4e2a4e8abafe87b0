//! Submission normalization and validation pipeline
//!
//! Turns a decoded geosubmit batch into canonical observations:
//!
//! ```text
//! raw JSON -> schema (structure, coercion, sentinels)
//!          -> normalize (timestamps, radio inheritance/aliasing) per report
//!          -> dedup (first entry per natural key) per report
//!          -> accounting (per-category counts)
//! ```
//!
//! Only a structurally malformed batch is an error. Anything wrong inside a
//! report or entry is dropped and shows up in [`BatchCounts`] instead.
//!
//! # Example
//!
//! ```
//! use geosubmit::submission::validate_and_normalize;
//! use serde_json::json;
//!
//! let raw = json!({"items": [{
//!     "latitude": 51.5,
//!     "longitude": -0.1,
//!     "wifiAccessPoints": [{"macAddress": "01:23:45:67:89:ab"}]
//! }]});
//!
//! let submission = validate_and_normalize(&raw, chrono::Utc::now()).unwrap();
//! assert_eq!(submission.observations.wifis.len(), 1);
//! assert_eq!(submission.counts.wifi_observations, 1);
//! ```

pub mod accounting;
pub mod dedup;
pub mod error;
pub mod models;
pub mod normalize;
pub mod rules;
pub mod schema;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub use accounting::{BatchAccountant, BatchCounts, emit};
pub use error::{InvalidEntry, InvalidReport, SubmissionError};
pub use models::{
    CellKey, CellObservation, CellReading, NormalizedObservation, NormalizedReport,
    ObservationSet, Position, PositionSource, Radio, WifiObservation, WifiReading,
};

/// Everything the core hands to the boundary for one request.
#[derive(Debug, Clone)]
pub struct Submission {
    pub observations: ObservationSet,
    pub reports: Vec<NormalizedReport>,
    pub counts: BatchCounts,
}

/// Validate, normalize and deduplicate a decoded batch.
///
/// `now` is the submission time substituted for missing report timestamps.
pub fn validate_and_normalize(
    raw: &Value,
    now: DateTime<Utc>,
) -> Result<Submission, SubmissionError> {
    let batch = schema::validate_batch(raw)?;
    let mut accountant = BatchAccountant::new(batch.item_count);
    let mut observations = ObservationSet::default();
    let mut reports = Vec::with_capacity(batch.reports.len());

    for report in batch.reports {
        match report.and_then(|report| normalize::normalize_report(report, now, &mut accountant)) {
            Ok(report) => {
                accountant.report_accepted(&report);
                observations.extend_from_report(&report);
                reports.push(report);
            }
            Err(reason) => accountant.report_dropped(reason),
        }
    }

    Ok(Submission {
        observations,
        reports,
        counts: accountant.finish(),
    })
}
