//! Secondary propagation of accepted reports
//!
//! After the primary store accepted a batch, the normalized reports are
//! written once more as a geosubmit-shaped JSON document to an object store.
//! This path is best effort: callers log failures and move on.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use object_store::{
    ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as StoragePath,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::submission::{CellReading, NormalizedReport, PositionSource, WifiReading};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;

#[async_trait]
pub trait ReportExporter: Send + Sync {
    /// Export the reports of one request. Returns the object key written,
    /// or `None` when there was nothing to write.
    async fn export(&self, api_key: &str, reports: &[NormalizedReport]) -> Result<Option<String>>;

    async fn health(&self) -> bool {
        true
    }
}

/// Exporter used when export is disabled
#[derive(Debug, Clone, Default)]
pub struct NoopExporter;

#[async_trait]
impl ReportExporter for NoopExporter {
    async fn export(
        &self,
        _api_key: &str,
        _reports: &[NormalizedReport],
    ) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Writes one JSON document per request to any `object_store` backend
#[derive(Clone)]
pub struct ObjectStoreExporter {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectStoreExporter {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// In-memory backend for tests and development
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), prefix)
    }

    /// Local filesystem backend rooted at `root`
    pub fn local(root: impl AsRef<Path>, prefix: impl Into<String>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let store = LocalFileSystem::new_with_prefix(root.as_ref())?;
        Ok(Self::new(Arc::new(store), prefix))
    }

    /// Read back an exported document
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let result = self.store.get(&StoragePath::from(key)).await?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }

    fn object_key(&self, api_key: &str) -> String {
        let now = Utc::now();
        format!(
            "{}/{}/{:04}/{:02}/{:02}/{}.json",
            self.prefix,
            api_key,
            now.year(),
            now.month(),
            now.day(),
            Uuid::now_v7()
        )
    }
}

#[async_trait]
impl ReportExporter for ObjectStoreExporter {
    async fn export(&self, api_key: &str, reports: &[NormalizedReport]) -> Result<Option<String>> {
        if reports.is_empty() {
            return Ok(None);
        }

        let body = ExportBatch {
            items: reports.iter().map(ExportReport::from).collect(),
        };
        let data = serde_json::to_vec(&body)?;
        let size = data.len();
        let key = self.object_key(api_key);

        self.store.put(&StoragePath::from(key.as_str()), data.into()).await?;

        tracing::info!(key, size, reports = reports.len(), "Exported reports");
        Ok(Some(key))
    }
}

#[derive(Debug, Serialize)]
struct ExportBatch {
    items: Vec<ExportReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportReport {
    timestamp: i64,
    position: ExportPosition,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cell_towers: Vec<ExportCell>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    wifi_access_points: Vec<ExportWifi>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportPosition {
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    altitude: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    altitude_accuracy: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pressure: Option<f64>,
    #[serde(skip_serializing_if = "PositionSource::is_default")]
    source: PositionSource,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportCell {
    radio_type: &'static str,
    mobile_country_code: u16,
    mobile_network_code: u16,
    location_area_code: u32,
    cell_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_scrambling_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asu: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_strength: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timing_advance: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serving: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportWifi {
    mac_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_to_noise_ratio: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signal_strength: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    radio_type: Option<String>,
}

fn nonzero(value: i32) -> Option<i32> {
    (value != 0).then_some(value)
}

impl From<&NormalizedReport> for ExportReport {
    fn from(report: &NormalizedReport) -> Self {
        let position = &report.position;
        Self {
            timestamp: report.timestamp.timestamp_millis(),
            position: ExportPosition {
                latitude: position.latitude,
                longitude: position.longitude,
                accuracy: position.accuracy,
                altitude: position.altitude,
                altitude_accuracy: position.altitude_accuracy,
                heading: position.heading,
                speed: position.speed,
                age: position.age,
                pressure: position.pressure,
                source: position.source,
            },
            cell_towers: report.cells.iter().map(ExportCell::from).collect(),
            wifi_access_points: report.wifis.iter().map(ExportWifi::from).collect(),
        }
    }
}

impl From<&CellReading> for ExportCell {
    fn from(cell: &CellReading) -> Self {
        Self {
            radio_type: cell.radio.as_str(),
            mobile_country_code: cell.mcc,
            mobile_network_code: cell.mnc,
            location_area_code: cell.lac,
            cell_id: cell.cid,
            primary_scrambling_code: cell.psc,
            asu: cell.asu,
            signal_strength: nonzero(cell.signal),
            timing_advance: nonzero(cell.ta),
            age: cell.age,
            serving: cell.serving,
        }
    }
}

impl From<&WifiReading> for ExportWifi {
    fn from(wifi: &WifiReading) -> Self {
        Self {
            mac_address: wifi.key.clone(),
            channel: wifi.channel,
            frequency: wifi.frequency,
            signal_to_noise_ratio: wifi.snr,
            signal_strength: nonzero(wifi.signal),
            age: wifi.age,
            radio_type: wifi.radio.clone(),
        }
    }
}
