use std::path::Path;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use tracing::{debug, info};
use uuid::Uuid;

use super::keys::{encode_cell_key, encode_cell_prefix, encode_wifi_key, encode_wifi_prefix};
use super::{InsertSummary, ObservationStore, Result};
use crate::submission::{CellKey, CellObservation, ObservationSet, WifiObservation};

/// Fjall-backed observation store
///
/// One partition per observation kind. Every insert is a single atomic
/// write batch across both partitions.
#[derive(Clone)]
pub struct FjallObservationStore {
    keyspace: Keyspace,
    cells: PartitionHandle,
    wifis: PartitionHandle,
}

impl FjallObservationStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening observation store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let cells = keyspace.open_partition("cells", PartitionCreateOptions::default())?;
        let wifis = keyspace.open_partition("wifis", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            cells,
            wifis,
        })
    }

    /// Write every observation in one batch
    pub fn insert_batch(&self, observations: &ObservationSet) -> Result<InsertSummary> {
        let mut batch = self.keyspace.batch();

        for obs in &observations.cells {
            let key = encode_cell_key(&obs.cell.key(), Uuid::now_v7());
            batch.insert(&self.cells, key, serde_json::to_vec(obs)?);
        }
        for obs in &observations.wifis {
            let key = encode_wifi_key(&obs.wifi.key, Uuid::now_v7());
            batch.insert(&self.wifis, key, serde_json::to_vec(obs)?);
        }

        batch.commit()?;

        let summary = InsertSummary {
            cells: observations.cells.len(),
            wifis: observations.wifis.len(),
        };
        debug!(cells = summary.cells, wifis = summary.wifis, "Committed observation batch");
        Ok(summary)
    }

    /// All stored observations of one cell, oldest first
    pub fn cell_observations(&self, cell: &CellKey) -> Result<Vec<CellObservation>> {
        let mut found = Vec::new();
        for item in self.cells.prefix(encode_cell_prefix(cell)) {
            let (_key, value) = item?;
            found.push(serde_json::from_slice(&value)?);
        }
        Ok(found)
    }

    /// All stored observations of one access point, oldest first
    pub fn wifi_observations(&self, wifi_key: &str) -> Result<Vec<WifiObservation>> {
        let mut found = Vec::new();
        for item in self.wifis.prefix(encode_wifi_prefix(wifi_key)) {
            let (_key, value) = item?;
            found.push(serde_json::from_slice(&value)?);
        }
        Ok(found)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut cell_count = 0;
        let mut wifi_count = 0;

        for item in self.cells.iter() {
            item?;
            cell_count += 1;
        }

        for item in self.wifis.iter() {
            item?;
            wifi_count += 1;
        }

        Ok(StoreStats {
            cell_count,
            wifi_count,
        })
    }
}

#[async_trait]
impl ObservationStore for FjallObservationStore {
    async fn insert(&self, observations: ObservationSet) -> Result<InsertSummary> {
        self.insert_batch(&observations)
    }

    async fn health(&self) -> bool {
        self.cells.get(b"health").is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub cell_count: usize,
    pub wifi_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::{Radio, validate_and_normalize};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (FjallObservationStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallObservationStore::open(temp_dir.path().join("observations")).unwrap();
        (store, temp_dir)
    }

    fn sample() -> ObservationSet {
        let raw = json!({"items": [
            {"latitude": 51.5, "longitude": -0.1, "radioType": "gsm",
             "cellTowers": [{"mobileCountryCode": 262, "mobileNetworkCode": 1,
                             "locationAreaCode": 5, "cellId": 12}],
             "wifiAccessPoints": [{"macAddress": "01:23:45:67:89:ab"}]},
            {"latitude": 51.6, "longitude": -0.2, "radioType": "gsm",
             "cellTowers": [{"mobileCountryCode": 262, "mobileNetworkCode": 1,
                             "locationAreaCode": 5, "cellId": 12}]}
        ]});
        validate_and_normalize(&raw, chrono::Utc::now())
            .unwrap()
            .observations
    }

    #[test]
    fn test_open_store() {
        let temp_dir = TempDir::new().unwrap();
        assert!(FjallObservationStore::open(temp_dir.path().join("observations")).is_ok());
    }

    #[test]
    fn test_insert_and_read_back() {
        let (store, _temp) = create_test_store();
        let summary = store.insert_batch(&sample()).unwrap();
        assert_eq!(summary, InsertSummary { cells: 2, wifis: 1 });

        let cell = CellKey {
            radio: Radio::Gsm,
            mcc: 262,
            mnc: 1,
            lac: 5,
            cid: 12,
        };
        let cells = store.cell_observations(&cell).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].position.latitude, 51.5);
        assert_eq!(cells[1].position.latitude, 51.6);

        let wifis = store.wifi_observations("0123456789ab").unwrap();
        assert_eq!(wifis.len(), 1);
        assert!(store.wifi_observations("0123456789ac").unwrap().is_empty());
    }

    #[test]
    fn test_stats() {
        let (store, _temp) = create_test_store();
        store.insert_batch(&sample()).unwrap();
        store.insert_batch(&sample()).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.cell_count, 4);
        assert_eq!(stats.wifi_count, 2);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("observations");

        {
            let store = FjallObservationStore::open(&path).unwrap();
            store.insert_batch(&sample()).unwrap();
            store.persist().unwrap();
        }

        let store = FjallObservationStore::open(&path).unwrap();
        assert_eq!(store.stats().unwrap().wifi_count, 1);
    }

    #[tokio::test]
    async fn test_trait_insert() {
        let (store, _temp) = create_test_store();
        let summary = store.insert(sample()).await.unwrap();
        assert_eq!(summary.cells, 2);
        assert!(store.health().await);
    }
}
