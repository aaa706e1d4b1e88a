use crate::core::state::AppState;
use crate::stores::PeerStore;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Eviction loop for peers that stopped announcing. Swarm locks are only
/// held per-bucket inside the store, so announces on other torrents are
/// never blocked by a reap pass.
pub async fn run(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.config.tracker.reaper_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = reap_swarms(&state);
                if removed > 0 {
                    info!(removed_peers = removed, "Reaped silent peers");
                } else {
                    debug!("Reap pass found no silent peers");
                }
            }
            _ = shutdown.changed() => {
                info!("Reaper stopped");
                break;
            }
        }
    }
}

/// One reap pass. Every announce already queued its stat deltas, so the
/// reaped peers' credit is pending in the stat queue; flushing right after
/// removal gets it to durable storage before the peers are forgotten.
pub fn reap_swarms(state: &AppState) -> usize {
    let reaped = state
        .stores
        .peers
        .reap(state.config.tracker.reaper_interval);

    if !reaped.is_empty() {
        state.stats.flush(&state.stores);
    }

    reaped.len()
}
