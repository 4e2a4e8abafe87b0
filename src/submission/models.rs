//! Data model for the submission pipeline.
//!
//! Two layers live here:
//! - the validated input tree ([`SubmissionBatch`], [`Report`], [`CellEntry`],
//!   [`WifiEntry`]), still carrying sentinel values for absent fields
//! - the normalized output ([`NormalizedReport`], [`CellObservation`],
//!   [`WifiObservation`]), where sentinels have become `None`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{InvalidEntry, InvalidReport};
use super::rules::RawRadio;

/// Cellular radio generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Radio {
    Gsm,
    Cdma,
    Wcdma,
    Lte,
}

impl Radio {
    pub fn as_str(&self) -> &'static str {
        match self {
            Radio::Gsm => "gsm",
            Radio::Cdma => "cdma",
            Radio::Wcdma => "wcdma",
            Radio::Lte => "lte",
        }
    }
}

impl fmt::Display for Radio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the device obtained its position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSource {
    #[default]
    Gps,
    Manual,
    Fused,
}

impl PositionSource {
    /// Unknown spellings fall back to the default.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "manual" => PositionSource::Manual,
            "fused" => PositionSource::Fused,
            _ => PositionSource::Gps,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == PositionSource::Gps
    }
}

/// Validated batch; each report either passed schema validation or carries
/// the reason it was skipped.
#[derive(Debug, Clone)]
pub struct SubmissionBatch {
    /// Number of entries in the submitted `items` array.
    pub item_count: usize,
    pub reports: Vec<Result<Report, InvalidReport>>,
}

/// One validated report. Optional fields hold their sentinel when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: i64,
    pub altitude: i64,
    pub altitude_accuracy: i64,
    pub age: Option<i64>,
    pub heading: f64,
    pub pressure: Option<f64>,
    pub speed: f64,
    pub source: String,
    pub timestamp: i64,
    pub radio_type: Option<RawRadio>,
    pub cell_towers: Vec<Result<CellEntry, InvalidEntry>>,
    pub wifi_access_points: Vec<Result<WifiEntry, InvalidEntry>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellEntry {
    pub radio_type: Option<RawRadio>,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u32,
    pub age: i64,
    pub asu: i64,
    pub psc: i64,
    pub serving: Option<bool>,
    pub signal_strength: i64,
    pub timing_advance: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WifiEntry {
    pub mac_address: String,
    pub radio_type: Option<String>,
    pub age: i64,
    pub channel: i64,
    pub frequency: i64,
    pub signal_to_noise_ratio: i64,
    pub signal_strength: i64,
}

/// Device position shared by every observation of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude_accuracy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "PositionSource::is_default")]
    pub source: PositionSource,
}

/// Natural key of a cell tower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReading {
    pub radio: Radio,
    pub mcc: u16,
    pub mnc: u16,
    pub lac: u32,
    pub cid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psc: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asu: Option<i16>,
    pub signal: i32,
    pub ta: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving: Option<bool>,
}

impl CellReading {
    pub fn key(&self) -> CellKey {
        CellKey {
            radio: self.radio,
            mcc: self.mcc,
            mnc: self.mnc,
            lac: self.lac,
            cid: self.cid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiReading {
    /// Lowercase hex access point identifier without separators.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snr: Option<u16>,
    pub signal: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radio: Option<String>,
}

/// A report after normalization and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedReport {
    /// Full-precision derived timestamp.
    pub timestamp: DateTime<Utc>,
    /// Month bucket used as the observation time.
    pub time: DateTime<Utc>,
    pub position: Position,
    pub cells: Vec<CellReading>,
    pub wifis: Vec<WifiReading>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellObservation {
    pub position: Position,
    pub time: DateTime<Utc>,
    pub cell: CellReading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiObservation {
    pub position: Position,
    pub time: DateTime<Utc>,
    pub wifi: WifiReading,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NormalizedObservation {
    Cell(CellObservation),
    Wifi(WifiObservation),
}

/// Observations produced by one request, handed off to storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    pub cells: Vec<CellObservation>,
    pub wifis: Vec<WifiObservation>,
}

impl ObservationSet {
    pub fn len(&self) -> usize {
        self.cells.len() + self.wifis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() && self.wifis.is_empty()
    }

    /// Fan a report out into one observation per reading.
    pub fn extend_from_report(&mut self, report: &NormalizedReport) {
        self.cells.extend(report.cells.iter().map(|cell| CellObservation {
            position: report.position.clone(),
            time: report.time,
            cell: cell.clone(),
        }));
        self.wifis.extend(report.wifis.iter().map(|wifi| WifiObservation {
            position: report.position.clone(),
            time: report.time,
            wifi: wifi.clone(),
        }));
    }

    pub fn into_observations(self) -> Vec<NormalizedObservation> {
        self.cells
            .into_iter()
            .map(NormalizedObservation::Cell)
            .chain(self.wifis.into_iter().map(NormalizedObservation::Wifi))
            .collect()
    }
}
