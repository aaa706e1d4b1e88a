// Application state (AppState)

use crate::core::config::{Config, StoreConfig};
use crate::stores::{StoreFactory, Stores};
use crate::tasks::batch::StatQueue;
use std::sync::Arc;

/// Shared state handed to request handlers and background tasks.
pub struct AppState {
    /// Peer, torrent and user stores behind their driver interfaces
    pub stores: Stores,

    /// Pending stat deltas awaiting the next batch flush
    pub stats: StatQueue,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Self {
        Self {
            stores,
            stats: StatQueue::new(),
            config: Arc::new(config),
        }
    }

    /// State backed entirely by the in-memory drivers.
    pub fn in_memory(config: Config) -> Self {
        let stores = StoreFactory::with_defaults()
            .build(&StoreConfig::default())
            .expect("built-in memory drivers are always registered");
        Self::new(config, stores)
    }
}
