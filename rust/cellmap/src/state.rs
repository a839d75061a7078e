use crate::{config::AppConfig, ingest::SampleIngestor};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ingestor: SampleIngestor,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, ingestor: SampleIngestor) -> Self {
        Self { config, ingestor }
    }
}
