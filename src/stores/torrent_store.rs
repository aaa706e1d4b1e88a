use crate::core::error::TrackerError;
use crate::models::torrent::{Torrent, TorrentPatch};
use crate::models::InfoHash;
use crate::utils::time::unix_now;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

/// Counter increments coalesced by the batch updater and applied atomically
/// per torrent row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TorrentDelta {
    pub completed: u16,
    pub uploaded: u32,
    pub downloaded: u32,
}

/// Torrent store contract.
pub trait TorrentStore: Send + Sync {
    /// `Duplicate` when the info_hash is already tracked.
    fn add(&self, torrent: Torrent) -> Result<(), TrackerError>;

    /// `InvalidInfoHash` when the torrent is missing or soft-deleted.
    fn get(&self, info_hash: InfoHash) -> Result<Torrent, TrackerError>;

    /// Write the dirty fields carried by the patch; `updated_on` is bumped.
    fn update(&self, info_hash: InfoHash, patch: TorrentPatch) -> Result<(), TrackerError>;

    /// Soft-delete, or permanently remove the row when `drop_row` is set.
    fn delete(&self, info_hash: InfoHash, drop_row: bool) -> Result<(), TrackerError>;

    /// Batch-apply counter deltas. Unknown info hashes are skipped and
    /// logged once per batch.
    fn sync(&self, batch: &HashMap<InfoHash, TorrentDelta>) -> Result<(), TrackerError>;

    /// Release backing resources. Idempotent.
    fn close(&self) -> Result<(), TrackerError>;
}

/// Reference in-memory torrent store.
pub struct MemoryTorrentStore {
    torrents: DashMap<InfoHash, Torrent>,
    next_id: AtomicU32,
}

impl MemoryTorrentStore {
    pub fn new() -> Self {
        Self {
            torrents: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }
}

impl Default for MemoryTorrentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TorrentStore for MemoryTorrentStore {
    fn add(&self, mut torrent: Torrent) -> Result<(), TrackerError> {
        if self.torrents.contains_key(&torrent.info_hash) {
            return Err(TrackerError::Duplicate);
        }

        if torrent.torrent_id == 0 {
            torrent.torrent_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        }
        // Negative download multipliers are clamped on write
        if torrent.multi_dn < 0.0 {
            torrent.multi_dn = 0.0;
        }

        self.torrents.insert(torrent.info_hash, torrent);

        Ok(())
    }

    fn get(&self, info_hash: InfoHash) -> Result<Torrent, TrackerError> {
        match self.torrents.get(&info_hash) {
            Some(torrent) if !torrent.is_deleted => Ok(torrent.clone()),
            _ => Err(TrackerError::InvalidInfoHash),
        }
    }

    fn update(&self, info_hash: InfoHash, patch: TorrentPatch) -> Result<(), TrackerError> {
        let mut torrent = self
            .torrents
            .get_mut(&info_hash)
            .ok_or(TrackerError::NotFound)?;

        if let Some(release_name) = patch.release_name {
            torrent.release_name = release_name;
        }
        if let Some(is_deleted) = patch.is_deleted {
            torrent.is_deleted = is_deleted;
        }
        if let Some(is_enabled) = patch.is_enabled {
            torrent.is_enabled = is_enabled;
        }
        if let Some(reason) = patch.reason {
            torrent.reason = reason;
        }
        if let Some(multi_up) = patch.multi_up {
            torrent.multi_up = multi_up;
        }
        if let Some(multi_dn) = patch.multi_dn {
            torrent.multi_dn = multi_dn.max(0.0);
        }
        torrent.updated_on = unix_now();

        Ok(())
    }

    fn delete(&self, info_hash: InfoHash, drop_row: bool) -> Result<(), TrackerError> {
        if drop_row {
            self.torrents
                .remove(&info_hash)
                .map(|_| ())
                .ok_or(TrackerError::NotFound)
        } else {
            self.update(
                info_hash,
                TorrentPatch {
                    is_deleted: Some(true),
                    ..TorrentPatch::default()
                },
            )
        }
    }

    fn sync(&self, batch: &HashMap<InfoHash, TorrentDelta>) -> Result<(), TrackerError> {
        let mut unknown = 0usize;

        for (info_hash, delta) in batch {
            match self.torrents.get_mut(info_hash) {
                Some(mut torrent) => {
                    torrent.total_completed =
                        torrent.total_completed.saturating_add(delta.completed);
                    torrent.total_uploaded = torrent.total_uploaded.saturating_add(delta.uploaded);
                    torrent.total_downloaded =
                        torrent.total_downloaded.saturating_add(delta.downloaded);
                    torrent.updated_on = unix_now();
                }
                None => unknown += 1,
            }
        }

        if unknown > 0 {
            warn!(unknown, "Torrent sync skipped deltas for unknown info hashes");
        }

        Ok(())
    }

    fn close(&self) -> Result<(), TrackerError> {
        Ok(())
    }
}
