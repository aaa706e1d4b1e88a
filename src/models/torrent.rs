use crate::models::InfoHash;

/// A tracked torrent row. The swarm itself lives in the peer store; this
/// carries identity, lifecycle flags and the aggregate counters.
#[derive(Clone, Debug)]
pub struct Torrent {
    pub torrent_id: u32,
    pub info_hash: InfoHash,
    pub release_name: String,
    /// Times any peer reported the `completed` event
    pub total_completed: u16,
    /// Aggregate bytes downloaded across the swarm
    pub total_downloaded: u32,
    /// Aggregate bytes uploaded across the swarm
    pub total_uploaded: u32,
    /// Upload credit multiplier applied to user stats
    pub multi_up: f64,
    /// Download credit multiplier, never negative
    pub multi_dn: f64,
    /// Soft-delete flag; deleted torrents are invisible to lookups
    pub is_deleted: bool,
    /// Disabled torrents with a reason reject announces with that reason
    pub is_enabled: bool,
    pub reason: String,
    pub created_on: i64,
    pub updated_on: i64,
}

impl Torrent {
    pub fn new(torrent_id: u32, info_hash: InfoHash, release_name: String, now: i64) -> Self {
        Self {
            torrent_id,
            info_hash,
            release_name,
            total_completed: 0,
            total_downloaded: 0,
            total_uploaded: 0,
            multi_up: 1.0,
            multi_dn: 1.0,
            is_deleted: false,
            is_enabled: true,
            reason: String::new(),
            created_on: now,
            updated_on: now,
        }
    }
}

/// Field patch for `TorrentStore::update`. `Some` marks a field dirty; only
/// dirty fields are written.
#[derive(Clone, Debug, Default)]
pub struct TorrentPatch {
    pub release_name: Option<String>,
    pub is_deleted: Option<bool>,
    pub is_enabled: Option<bool>,
    pub reason: Option<String>,
    pub multi_up: Option<f64>,
    pub multi_dn: Option<f64>,
}
