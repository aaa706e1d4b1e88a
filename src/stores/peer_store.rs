use crate::core::error::TrackerError;
use crate::models::peer::{Peer, Swarm};
use crate::models::{InfoHash, PeerId};
use crate::utils::time::unix_now;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Swarm index contract. Implementations must be safe to call from many
/// request tasks at once.
pub trait PeerStore: Send + Sync {
    /// Add a new swarm member. Fails `Duplicate` when (info_hash, peer_id)
    /// already exists; callers fall through to `update`.
    fn add(&self, info_hash: InfoHash, peer: Peer) -> Result<(), TrackerError>;

    /// Fetch one peer, `NotFound` if absent.
    fn get(&self, info_hash: InfoHash, peer_id: PeerId) -> Result<Peer, TrackerError>;

    /// Write back a mutated peer, `NotFound` if it left the swarm meanwhile.
    fn update(&self, info_hash: InfoHash, peer: &Peer) -> Result<(), TrackerError>;

    /// Remove a swarm membership. A second delete of the same peer returns
    /// `NotFound`.
    fn delete(&self, info_hash: InfoHash, peer_id: PeerId) -> Result<(), TrackerError>;

    /// Up to `limit` peers from the swarm. Selection order is unspecified but
    /// every live peer must be reachable across repeated calls.
    fn get_n(&self, info_hash: InfoHash, limit: usize) -> Swarm;

    /// Remove every peer whose last announce is older than `older_than`,
    /// returning the removed peers so their stats can be flushed.
    fn reap(&self, older_than: Duration) -> Swarm;

    /// (seeders, leechers) for the swarm; a seeder reports `left == 0`.
    fn counts(&self, info_hash: InfoHash) -> (u32, u32);

    /// Release any backing resources. Idempotent.
    fn close(&self) -> Result<(), TrackerError>;
}

#[derive(Debug, Default)]
struct SwarmStats {
    seeders: AtomicU32,
    leechers: AtomicU32,
}

impl SwarmStats {
    fn joined(&self, peer: &Peer) {
        if peer.is_seeder() {
            self.seeders.fetch_add(1, Ordering::Relaxed);
        } else {
            self.leechers.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn left(&self, peer: &Peer) {
        if peer.is_seeder() {
            self.seeders.fetch_sub(1, Ordering::Relaxed);
        } else {
            self.leechers.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// Default in-memory swarm index: a two-level sharded map
/// {info_hash → {peer_id → peer}} with cached per-swarm counters.
pub struct MemoryPeerStore {
    swarms: DashMap<InfoHash, DashMap<PeerId, Peer>>,
    stats: DashMap<InfoHash, Arc<SwarmStats>>,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self {
            swarms: DashMap::new(),
            stats: DashMap::new(),
        }
    }

    /// Drop a swarm bucket once its last member is gone, so `swarms` only
    /// holds active torrents. Must not be called while a guard into
    /// `swarms` is held.
    fn drop_if_empty(&self, info_hash: InfoHash) {
        let removed = self
            .swarms
            .remove_if(&info_hash, |_, members| members.is_empty());
        if removed.is_some() {
            self.stats.remove(&info_hash);
        }
    }
}

impl Default for MemoryPeerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerStore for MemoryPeerStore {
    fn add(&self, info_hash: InfoHash, peer: Peer) -> Result<(), TrackerError> {
        let swarm = self.swarms.entry(info_hash).or_default();
        let stats = self.stats.entry(info_hash).or_default();

        if swarm.contains_key(&peer.peer_id) {
            return Err(TrackerError::Duplicate);
        }

        stats.joined(&peer);
        swarm.insert(peer.peer_id, peer);

        Ok(())
    }

    fn get(&self, info_hash: InfoHash, peer_id: PeerId) -> Result<Peer, TrackerError> {
        self.swarms
            .get(&info_hash)
            .and_then(|swarm| swarm.get(&peer_id).map(|entry| entry.value().clone()))
            .ok_or(TrackerError::NotFound)
    }

    fn update(&self, info_hash: InfoHash, peer: &Peer) -> Result<(), TrackerError> {
        let swarm = self.swarms.get(&info_hash).ok_or(TrackerError::NotFound)?;

        let previous = swarm
            .get(&peer.peer_id)
            .map(|entry| entry.value().is_seeder())
            .ok_or(TrackerError::NotFound)?;

        if previous != peer.is_seeder() {
            if let Some(stats) = self.stats.get(&info_hash) {
                if peer.is_seeder() {
                    stats.leechers.fetch_sub(1, Ordering::Relaxed);
                    stats.seeders.fetch_add(1, Ordering::Relaxed);
                } else {
                    stats.seeders.fetch_sub(1, Ordering::Relaxed);
                    stats.leechers.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        swarm.insert(peer.peer_id, peer.clone());

        Ok(())
    }

    fn delete(&self, info_hash: InfoHash, peer_id: PeerId) -> Result<(), TrackerError> {
        let removed = {
            let swarm = self.swarms.get(&info_hash).ok_or(TrackerError::NotFound)?;
            swarm.remove(&peer_id)
        };

        match removed {
            Some((_, peer)) => {
                if let Some(stats) = self.stats.get(&info_hash) {
                    stats.left(&peer);
                }
                self.drop_if_empty(info_hash);
                Ok(())
            }
            None => Err(TrackerError::NotFound),
        }
    }

    fn get_n(&self, info_hash: InfoHash, limit: usize) -> Swarm {
        let mut peers: Swarm = match self.swarms.get(&info_hash) {
            Some(swarm) => swarm.iter().map(|entry| entry.value().clone()).collect(),
            None => return Vec::new(),
        };

        // Random selection keeps peer lists fair without tracking rotation
        // state per swarm
        peers.shuffle(&mut rand::thread_rng());
        peers.truncate(limit);

        peers
    }

    fn reap(&self, older_than: Duration) -> Swarm {
        let deadline = unix_now() - older_than.as_secs() as i64;
        let mut reaped: Swarm = Vec::new();
        let mut emptied: Vec<InfoHash> = Vec::new();

        for entry in self.swarms.iter() {
            let info_hash = *entry.key();
            let swarm = entry.value();

            let stale: Vec<PeerId> = swarm
                .iter()
                .filter(|p| p.value().announce_last < deadline)
                .map(|p| *p.key())
                .collect();

            for peer_id in stale {
                if let Some((_, peer)) = swarm.remove(&peer_id) {
                    if let Some(stats) = self.stats.get(&info_hash) {
                        stats.left(&peer);
                    }
                    reaped.push(peer);
                }
            }

            if swarm.is_empty() {
                emptied.push(info_hash);
            }
        }

        // Bucket destruction happens after iteration so no shard lock is
        // held twice
        for info_hash in emptied {
            self.drop_if_empty(info_hash);
        }

        reaped
    }

    fn counts(&self, info_hash: InfoHash) -> (u32, u32) {
        match self.stats.get(&info_hash) {
            Some(stats) => (
                stats.seeders.load(Ordering::Relaxed),
                stats.leechers.load(Ordering::Relaxed),
            ),
            None => (0, 0),
        }
    }

    fn close(&self) -> Result<(), TrackerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_peer(user_id: u32, peer_id: PeerId, left: u64, announce_last: i64) -> Peer {
        let mut peer = Peer::new(
            user_id,
            peer_id,
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            6881,
            announce_last,
        );
        peer.left = left;
        peer.announce_last = announce_last;
        peer
    }

    #[test]
    fn test_add_and_counts() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];

        store.add(ih, test_peer(1, [1u8; 20], 1000, 100)).unwrap();
        store.add(ih, test_peer(2, [2u8; 20], 0, 100)).unwrap();

        assert_eq!(store.counts(ih), (1, 1));
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];

        store.add(ih, test_peer(1, [1u8; 20], 0, 100)).unwrap();
        let err = store.add(ih, test_peer(1, [1u8; 20], 0, 200)).unwrap_err();
        assert!(matches!(err, TrackerError::Duplicate));

        // The original membership is untouched
        assert_eq!(store.get(ih, [1u8; 20]).unwrap().announce_last, 100);
    }

    #[test]
    fn test_get_missing() {
        let store = MemoryPeerStore::new();
        let err = store.get([1u8; 20], [2u8; 20]).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound));
    }

    #[test]
    fn test_update_moves_leecher_to_seeder() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];

        store.add(ih, test_peer(1, [1u8; 20], 500, 100)).unwrap();
        assert_eq!(store.counts(ih), (0, 1));

        let mut peer = store.get(ih, [1u8; 20]).unwrap();
        peer.left = 0;
        store.update(ih, &peer).unwrap();

        assert_eq!(store.counts(ih), (1, 0));
    }

    #[test]
    fn test_update_missing() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        store.add(ih, test_peer(1, [1u8; 20], 0, 100)).unwrap();

        let ghost = test_peer(2, [9u8; 20], 0, 100);
        assert!(matches!(
            store.update(ih, &ghost).unwrap_err(),
            TrackerError::NotFound
        ));
    }

    #[test]
    fn test_delete_idempotency() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        store.add(ih, test_peer(1, [1u8; 20], 0, 100)).unwrap();

        store.delete(ih, [1u8; 20]).unwrap();
        let err = store.delete(ih, [1u8; 20]).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound));
        assert_eq!(store.counts(ih), (0, 0));
    }

    #[test]
    fn test_delete_last_peer_drops_swarm() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        store.add(ih, test_peer(1, [1u8; 20], 0, 100)).unwrap();
        store.delete(ih, [1u8; 20]).unwrap();

        assert!(store.swarms.get(&ih).is_none());
    }

    #[test]
    fn test_get_n_limit_and_membership() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];

        for i in 0u8..5 {
            store.add(ih, test_peer(i as u32, [i; 20], 100, 100)).unwrap();
        }

        let peers = store.get_n(ih, 3);
        assert_eq!(peers.len(), 3);
        for peer in &peers {
            assert!(store.get(ih, peer.peer_id).is_ok());
        }

        // Asking past the swarm size returns everyone
        assert_eq!(store.get_n(ih, 50).len(), 5);
        assert!(store.get_n([9u8; 20], 10).is_empty());
    }

    #[test]
    fn test_get_n_covers_all_peers_eventually() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        for i in 0u8..8 {
            store.add(ih, test_peer(i as u32, [i; 20], 100, 100)).unwrap();
        }

        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            for peer in store.get_n(ih, 2) {
                seen.insert(peer.peer_id);
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_reap_removes_only_stale() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        let now = unix_now();

        store.add(ih, test_peer(1, [1u8; 20], 0, now - 30)).unwrap();
        store.add(ih, test_peer(2, [2u8; 20], 100, now - 120)).unwrap();
        store.add(ih, test_peer(3, [3u8; 20], 0, now - 600)).unwrap();

        let reaped = store.reap(Duration::from_secs(60));
        assert_eq!(reaped.len(), 2);
        assert!(reaped.iter().all(|p| p.peer_id != [1u8; 20]));

        assert!(store.get(ih, [1u8; 20]).is_ok());
        assert_eq!(store.counts(ih), (1, 0));
    }

    #[test]
    fn test_reap_drops_emptied_swarms() {
        let store = MemoryPeerStore::new();
        let now = unix_now();

        store
            .add([1u8; 20], test_peer(1, [1u8; 20], 0, now - 600))
            .unwrap();
        store
            .add([2u8; 20], test_peer(2, [2u8; 20], 0, now - 10))
            .unwrap();

        let reaped = store.reap(Duration::from_secs(60));
        assert_eq!(reaped.len(), 1);
        assert!(store.swarms.get(&[1u8; 20]).is_none());
        assert!(store.swarms.get(&[2u8; 20]).is_some());
    }

    #[test]
    fn test_reap_returns_peer_counters() {
        let store = MemoryPeerStore::new();
        let ih = [1u8; 20];
        let now = unix_now();

        let mut peer = test_peer(7, [1u8; 20], 100, now - 600);
        peer.uploaded = 4096;
        peer.downloaded = 2048;
        store.add(ih, peer).unwrap();

        let reaped = store.reap(Duration::from_secs(60));
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].user_id, 7);
        assert_eq!(reaped[0].uploaded, 4096);
        assert_eq!(reaped[0].downloaded, 2048);
    }
}
