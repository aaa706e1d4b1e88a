use crate::core::state::AppState;
use crate::models::InfoHash;
use crate::stores::{Stores, TorrentDelta, TorrentStore, UserDelta, UserStore};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Coalesces per-announce counter deltas until the next flush tick.
///
/// Announce handlers append under a short-lived mutex; the flush swaps the
/// maps out wholesale so the request path never waits on a store write.
pub struct StatQueue {
    users: Mutex<HashMap<u32, UserDelta>>,
    torrents: Mutex<HashMap<InfoHash, TorrentDelta>>,
}

impl StatQueue {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            torrents: Mutex::new(HashMap::new()),
        }
    }

    pub fn queue_user(&self, user_id: u32, delta: UserDelta) {
        let mut users = self.users.lock().unwrap();
        let entry = users.entry(user_id).or_default();
        entry.uploaded = entry.uploaded.saturating_add(delta.uploaded);
        entry.downloaded = entry.downloaded.saturating_add(delta.downloaded);
    }

    pub fn queue_torrent(&self, info_hash: InfoHash, delta: TorrentDelta) {
        let mut torrents = self.torrents.lock().unwrap();
        let entry = torrents.entry(info_hash).or_default();
        entry.completed = entry.completed.saturating_add(delta.completed);
        entry.uploaded = entry.uploaded.saturating_add(delta.uploaded);
        entry.downloaded = entry.downloaded.saturating_add(delta.downloaded);
    }

    /// Drain both maps and apply them to the stores. On a store error the
    /// drained batch is merged back into the live maps so the deltas are
    /// redelivered on the next tick, never double-applied and never lost.
    pub fn flush(&self, stores: &Stores) {
        let users = std::mem::take(&mut *self.users.lock().unwrap());
        if !users.is_empty() {
            let count = users.len();
            if let Err(e) = stores.users.sync(&users) {
                warn!(error = %e, users = count, "User stat sync failed, requeueing batch");
                let mut live = self.users.lock().unwrap();
                for (user_id, delta) in users {
                    let entry = live.entry(user_id).or_default();
                    entry.uploaded = entry.uploaded.saturating_add(delta.uploaded);
                    entry.downloaded = entry.downloaded.saturating_add(delta.downloaded);
                }
            } else {
                debug!(users = count, "User stats flushed");
            }
        }

        let torrents = std::mem::take(&mut *self.torrents.lock().unwrap());
        if !torrents.is_empty() {
            let count = torrents.len();
            if let Err(e) = stores.torrents.sync(&torrents) {
                warn!(error = %e, torrents = count, "Torrent stat sync failed, requeueing batch");
                let mut live = self.torrents.lock().unwrap();
                for (info_hash, delta) in torrents {
                    let entry = live.entry(info_hash).or_default();
                    entry.completed = entry.completed.saturating_add(delta.completed);
                    entry.uploaded = entry.uploaded.saturating_add(delta.uploaded);
                    entry.downloaded = entry.downloaded.saturating_add(delta.downloaded);
                }
            } else {
                debug!(torrents = count, "Torrent stats flushed");
            }
        }
    }

    #[cfg(test)]
    fn pending(&self) -> (usize, usize) {
        (
            self.users.lock().unwrap().len(),
            self.torrents.lock().unwrap().len(),
        )
    }
}

impl Default for StatQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Flush loop. Runs until shutdown, then performs one final flush so
/// in-flight credit reaches the stores before the process exits.
pub async fn run(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.config.tracker.batch_update_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.stats.flush(&state.stores);
            }
            _ = shutdown.changed() => {
                state.stats.flush(&state.stores);
                info!("Batch updater stopped");
                break;
            }
        }
    }
}
