use crate::bencode::response;
use crate::core::error::TrackerError;
use crate::core::state::AppState;
use crate::handlers::resolve_user;
use crate::models::peer::Peer;
use crate::models::torrent::Torrent;
use crate::models::InfoHash;
use crate::stores::{PeerStore, TorrentDelta, TorrentStore, UserDelta};
use crate::utils::time::unix_now;
use crate::validation::ip::select_peer_ip;
use crate::validation::params::{parse_announce, AnnounceEvent, AnnounceRequest};
use axum::{
    extract::{ConnectInfo, Path, RawQuery, State},
    http::StatusCode,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The announce state machine, executed synchronously per request:
/// auth, parse, IP selection, torrent resolution, peer mutation, event
/// dispatch, peer list, bencoded response.
pub async fn announce_handler(
    State(state): State<Arc<AppState>>,
    Path(passkey): Path<String>,
    RawQuery(raw_query): RawQuery,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Response, TrackerError> {
    let user = resolve_user(&state, &passkey)?;

    let raw_query = raw_query.ok_or(TrackerError::MalformedRequest)?;
    let req = parse_announce(&raw_query)?;

    let ip = select_peer_ip(
        addr.ip(),
        req.supplied_ip,
        state.config.tracker.allow_client_ip,
        state.config.tracker.allow_non_routable,
    )?;

    let torrent = resolve_torrent(&state, req.info_hash)?;
    if !torrent.is_enabled && !torrent.reason.is_empty() {
        return Err(TrackerError::TorrentDisabled(torrent.reason));
    }

    debug!(
        user_id = user.user_id,
        torrent_id = torrent.torrent_id,
        ip = %ip,
        port = req.port,
        event = ?req.event,
        left = req.left,
        "Processing announce"
    );

    let now = unix_now();
    let mut peer = resolve_peer(&state, &req, user.user_id, ip, now)?;

    // Speed/counter bookkeeping over the window since the previous announce
    let delta_time = if peer.is_new() {
        peer.announce_first = now;
        0
    } else {
        (now - peer.announce_last).max(0)
    };
    let elapsed = delta_time.max(1) as u64;

    // A first announce has no observation window, and counters that went
    // backwards mean the client restarted; both credit nothing
    let (delta_up, delta_dn) = if peer.is_new() {
        (0, 0)
    } else {
        (
            req.uploaded.saturating_sub(peer.uploaded),
            req.downloaded.saturating_sub(peer.downloaded),
        )
    };

    peer.speed_up = (delta_up / elapsed).min(u32::MAX as u64) as u32;
    peer.speed_dn = (delta_dn / elapsed).min(u32::MAX as u64) as u32;
    peer.speed_up_max = peer.speed_up_max.max(peer.speed_up);
    peer.speed_dn_max = peer.speed_dn_max.max(peer.speed_dn);

    peer.uploaded = req.uploaded;
    peer.downloaded = req.downloaded;
    peer.corrupt = req.corrupt;
    peer.left = req.left;
    peer.ip = ip;
    peer.port = req.port;
    peer.announces += 1;

    let reaper_secs = state.config.tracker.reaper_interval.as_secs() as i64;
    peer.total_time += delta_time.clamp(0, reaper_secs) as u32;

    peer.announce_last = now;
    peer.updated_on = now;

    match state.stores.peers.update(req.info_hash, &peer) {
        Ok(()) | Err(TrackerError::NotFound) => {}
        Err(e) => return Err(e),
    }

    let mut torrent_delta = TorrentDelta {
        completed: 0,
        uploaded: delta_up.min(u32::MAX as u64) as u32,
        downloaded: delta_dn.min(u32::MAX as u64) as u32,
    };

    match req.event {
        Some(AnnounceEvent::Completed) => {
            // Counted regardless of the reported `left`; the client is
            // trusted on partial-selection downloads
            torrent_delta.completed = 1;
            info!(
                user_id = user.user_id,
                torrent_id = torrent.torrent_id,
                "Peer completed download"
            );
        }
        Some(AnnounceEvent::Stopped) => {
            match state.stores.peers.delete(req.info_hash, req.peer_id) {
                Ok(()) | Err(TrackerError::NotFound) => {}
                Err(e) => {
                    warn!(
                        user_id = user.user_id,
                        torrent_id = torrent.torrent_id,
                        error = %e,
                        "Failed to remove stopped peer"
                    );
                    return Err(e);
                }
            }
            debug!(
                user_id = user.user_id,
                torrent_id = torrent.torrent_id,
                "Peer stopped and removed"
            );
        }
        Some(AnnounceEvent::Started) | None => {}
    }

    // Anonymous (public-mode) peers accrue no user credit
    if user.user_id != 0 && (delta_up > 0 || delta_dn > 0) {
        state.stats.queue_user(
            user.user_id,
            UserDelta {
                uploaded: (delta_up as f64 * torrent.multi_up) as u64,
                downloaded: (delta_dn as f64 * torrent.multi_dn) as u64,
            },
        );
    }
    if torrent_delta != TorrentDelta::default() {
        state.stats.queue_torrent(req.info_hash, torrent_delta);
    }

    let limit = req.numwant.min(state.config.tracker.max_peers);
    let peers: Vec<Peer> = state
        .stores
        .peers
        .get_n(req.info_hash, limit)
        .into_iter()
        .filter(|p| p.peer_id != req.peer_id)
        .collect();

    let (seeders, leechers) = state.stores.peers.counts(req.info_hash);

    let body = response::announce(
        seeders,
        leechers,
        state.config.tracker.announce_interval.as_secs() as i64,
        state.config.tracker.announce_interval_minimum.as_secs() as i64,
        &peers,
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(body.into())
        .unwrap())
}

/// Torrent lookup, optionally creating the row on first sight when
/// auto-registration is enabled.
fn resolve_torrent(state: &AppState, info_hash: InfoHash) -> Result<Torrent, TrackerError> {
    match state.stores.torrents.get(info_hash) {
        Ok(torrent) => Ok(torrent),
        Err(TrackerError::InvalidInfoHash) if state.config.tracker.auto_register => {
            let fresh = Torrent::new(0, info_hash, hex::encode(info_hash), unix_now());
            match state.stores.torrents.add(fresh) {
                // A concurrent announce may have registered it first
                Ok(()) | Err(TrackerError::Duplicate) => {}
                Err(e) => return Err(e),
            }
            info!(info_hash = %hex::encode(info_hash), "Auto-registered torrent");
            state.stores.torrents.get(info_hash)
        }
        Err(e) => Err(e),
    }
}

/// Existing swarm member, or a fresh one added to the swarm. An `add` losing
/// a race to a concurrent first announce falls back to the winner's row.
fn resolve_peer(
    state: &AppState,
    req: &AnnounceRequest,
    user_id: u32,
    ip: std::net::IpAddr,
    now: i64,
) -> Result<Peer, TrackerError> {
    match state.stores.peers.get(req.info_hash, req.peer_id) {
        Ok(peer) => Ok(peer),
        Err(TrackerError::NotFound) => {
            let mut fresh = Peer::new(user_id, req.peer_id, ip, req.port, now);
            fresh.left = req.left;

            match state.stores.peers.add(req.info_hash, fresh.clone()) {
                Ok(()) => {
                    debug!(user_id, port = req.port, "Peer joined swarm");
                    Ok(fresh)
                }
                Err(TrackerError::Duplicate) => state.stores.peers.get(req.info_hash, req.peer_id),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}
