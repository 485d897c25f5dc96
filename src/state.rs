//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::document::DocumentCache;
use crate::metadata::RecordStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    cache: DocumentCache,
    records: Arc<dyn RecordStore>,
}

impl AppState {
    pub fn new(config: Config, cache: DocumentCache, records: Arc<dyn RecordStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                cache,
                records,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the document cache
    pub fn cache(&self) -> &DocumentCache {
        &self.inner.cache
    }

    /// Get the stored document records
    pub fn records(&self) -> &dyn RecordStore {
        self.inner.records.as_ref()
    }
}
