//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::storage::ByteStore;
use crate::transfer::{RangeStreamer, UploadStatusResolver};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    store: Arc<dyn ByteStore>,
    status: UploadStatusResolver,
    streamer: RangeStreamer,
}

impl AppState {
    /// Wire the transfer services to `store`
    pub fn new(config: Config, store: Arc<dyn ByteStore>) -> Self {
        let status = UploadStatusResolver::new(store.clone());
        let streamer = RangeStreamer::new(store.clone(), config.transfer.chunk_ceiling);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                status,
                streamer,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the byte store
    pub fn store(&self) -> &Arc<dyn ByteStore> {
        &self.inner.store
    }

    /// Get the upload status resolver
    pub fn status(&self) -> &UploadStatusResolver {
        &self.inner.status
    }

    /// Get the range streamer
    pub fn streamer(&self) -> &RangeStreamer {
        &self.inner.streamer
    }
}
