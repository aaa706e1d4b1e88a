pub mod peer_store;
pub mod torrent_store;
pub mod user_store;

pub use peer_store::{MemoryPeerStore, PeerStore};
pub use torrent_store::{MemoryTorrentStore, TorrentDelta, TorrentStore};
pub use user_store::{MemoryUserStore, UserDelta, UserStore};

use crate::core::config::StoreConfig;
use crate::core::error::TrackerError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};

/// The three stores the tracker core runs against.
#[derive(Clone)]
pub struct Stores {
    pub peers: Arc<dyn PeerStore>,
    pub torrents: Arc<dyn TorrentStore>,
    pub users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

impl Stores {
    /// Close all stores, logging failures. Each `close` is idempotent.
    pub fn close(&self) {
        if let Err(e) = self.peers.close() {
            error!(error = %e, "Failed to close peer store");
        }
        if let Err(e) = self.torrents.close() {
            error!(error = %e, "Failed to close torrent store");
        }
        if let Err(e) = self.users.close() {
            error!(error = %e, "Failed to close user store");
        }
    }
}

type PeerStoreBuilder = Box<dyn Fn() -> Arc<dyn PeerStore> + Send + Sync>;
type TorrentStoreBuilder = Box<dyn Fn() -> Arc<dyn TorrentStore> + Send + Sync>;
type UserStoreBuilder = Box<dyn Fn() -> Arc<dyn UserStore> + Send + Sync>;

/// Driver-name to constructor table, injected into startup. Additional
/// drivers register themselves here before `build` runs; there is no
/// process-wide registry.
pub struct StoreFactory {
    peer_drivers: HashMap<String, PeerStoreBuilder>,
    torrent_drivers: HashMap<String, TorrentStoreBuilder>,
    user_drivers: HashMap<String, UserStoreBuilder>,
}

impl StoreFactory {
    /// A factory with the built-in `memory` drivers registered.
    pub fn with_defaults() -> Self {
        let mut factory = Self {
            peer_drivers: HashMap::new(),
            torrent_drivers: HashMap::new(),
            user_drivers: HashMap::new(),
        };
        factory.register_peer_driver("memory", || Arc::new(MemoryPeerStore::new()));
        factory.register_torrent_driver("memory", || Arc::new(MemoryTorrentStore::new()));
        factory.register_user_driver("memory", || Arc::new(MemoryUserStore::new()));
        factory
    }

    pub fn register_peer_driver<F>(&mut self, name: &str, builder: F)
    where
        F: Fn() -> Arc<dyn PeerStore> + Send + Sync + 'static,
    {
        self.peer_drivers.insert(name.to_string(), Box::new(builder));
    }

    pub fn register_torrent_driver<F>(&mut self, name: &str, builder: F)
    where
        F: Fn() -> Arc<dyn TorrentStore> + Send + Sync + 'static,
    {
        self.torrent_drivers
            .insert(name.to_string(), Box::new(builder));
    }

    pub fn register_user_driver<F>(&mut self, name: &str, builder: F)
    where
        F: Fn() -> Arc<dyn UserStore> + Send + Sync + 'static,
    {
        self.user_drivers.insert(name.to_string(), Box::new(builder));
    }

    /// Instantiate the stores named by the config. Unknown driver names are
    /// a configuration error.
    pub fn build(&self, config: &StoreConfig) -> Result<Stores, TrackerError> {
        let peers = self
            .peer_drivers
            .get(&config.peers)
            .ok_or(TrackerError::InvalidConfig)?();
        let torrents = self
            .torrent_drivers
            .get(&config.torrents)
            .ok_or(TrackerError::InvalidConfig)?();
        let users = self
            .user_drivers
            .get(&config.users)
            .ok_or(TrackerError::InvalidConfig)?();

        info!(
            peer_driver = %config.peers,
            torrent_driver = %config.torrents,
            user_driver = %config.users,
            "Stores initialized"
        );

        Ok(Stores {
            peers,
            torrents,
            users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> StoreConfig {
        StoreConfig {
            peers: "memory".to_string(),
            torrents: "memory".to_string(),
            users: "memory".to_string(),
        }
    }

    #[test]
    fn test_build_memory_drivers() {
        let factory = StoreFactory::with_defaults();
        let stores = factory.build(&memory_config()).unwrap();

        assert_eq!(stores.peers.counts([0u8; 20]), (0, 0));
        stores.close();
        // close is idempotent
        stores.close();
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let factory = StoreFactory::with_defaults();
        let mut config = memory_config();
        config.peers = "redis".to_string();

        assert!(matches!(
            factory.build(&config).unwrap_err(),
            TrackerError::InvalidConfig
        ));
    }

    #[test]
    fn test_registered_driver_is_used() {
        let mut factory = StoreFactory::with_defaults();
        factory.register_peer_driver("null", || Arc::new(MemoryPeerStore::new()));

        let mut config = memory_config();
        config.peers = "null".to_string();
        assert!(factory.build(&config).is_ok());
    }
}
