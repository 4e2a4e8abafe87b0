//! Observation storage seam
//!
//! The request boundary hands each accepted [`ObservationSet`] to an
//! [`ObservationStore`]. A failed insert turns into `503` for the client.

pub mod fjall_store;
pub mod keys;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::submission::ObservationSet;

pub use fjall_store::{FjallObservationStore, StoreStats};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Rows written by one insert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertSummary {
    pub cells: usize,
    pub wifis: usize,
}

#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Persist a batch of observations. Either everything is written or
    /// an error is returned.
    async fn insert(&self, observations: ObservationSet) -> Result<InsertSummary>;

    async fn health(&self) -> bool {
        true
    }
}

/// Store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryObservationStore {
    inner: RwLock<ObservationSet>,
}

impl InMemoryObservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything inserted so far
    pub async fn snapshot(&self) -> ObservationSet {
        self.inner.read().await.clone()
    }
}

#[async_trait]
impl ObservationStore for InMemoryObservationStore {
    async fn insert(&self, observations: ObservationSet) -> Result<InsertSummary> {
        let summary = InsertSummary {
            cells: observations.cells.len(),
            wifis: observations.wifis.len(),
        };

        let mut inner = self.inner.write().await;
        inner.cells.extend(observations.cells);
        inner.wifis.extend(observations.wifis);

        tracing::debug!(
            cells = summary.cells,
            wifis = summary.wifis,
            "Stored observations in memory"
        );
        Ok(summary)
    }
}
