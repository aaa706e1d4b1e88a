use crate::bencode::response::{self, ScrapeEntry};
use crate::core::error::TrackerError;
use crate::core::state::AppState;
use crate::handlers::resolve_user;
use crate::stores::{PeerStore, TorrentStore};
use crate::validation::params::parse_scrape;
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Bulk (seeders, snatches, leechers) lookup for a list of info hashes.
/// Hashes the tracker does not know are omitted from the reply.
pub async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Path(passkey): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<Response, TrackerError> {
    resolve_user(&state, &passkey)?;

    let raw_query = raw_query.ok_or(TrackerError::MalformedRequest)?;
    let hashes = parse_scrape(&raw_query)?;

    let mut entries: Vec<ScrapeEntry> = Vec::with_capacity(hashes.len());
    for info_hash in hashes {
        match state.stores.torrents.get(info_hash) {
            Ok(torrent) => {
                let (seeders, leechers) = state.stores.peers.counts(info_hash);
                entries.push(ScrapeEntry {
                    info_hash,
                    complete: seeders,
                    downloaded: torrent.total_completed,
                    incomplete: leechers,
                });
            }
            Err(TrackerError::InvalidInfoHash) => continue,
            Err(e) => return Err(e),
        }
    }

    debug!(files = entries.len(), "Scrape served");

    let body = response::scrape(&mut entries);

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(body.into())
        .unwrap())
}
