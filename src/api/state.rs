use std::sync::Arc;

use crate::config::Config;
use crate::export::ReportExporter;
use crate::observability::MetricsSink;
use crate::storage::ObservationStore;

use super::auth::ApiKeyCheck;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub api_keys: Arc<dyn ApiKeyCheck>,
    pub store: Arc<dyn ObservationStore>,
    pub exporter: Arc<dyn ReportExporter>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl AppState {
    pub fn new(
        config: Config,
        api_keys: Arc<dyn ApiKeyCheck>,
        store: Arc<dyn ObservationStore>,
        exporter: Arc<dyn ReportExporter>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            api_keys,
            store,
            exporter,
            metrics,
        }
    }
}
