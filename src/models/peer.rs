use crate::models::PeerId;
use std::net::IpAddr;

/// GeoIP coordinates for a peer. Never populated by the core itself; an
/// external enrichment step may fill it in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LatLong {
    pub latitude: f64,
    pub longitude: f64,
}

/// A single unique member of a swarm, keyed by (info_hash, peer_id).
#[derive(Clone, Debug)]
pub struct Peer {
    /// Owning user from the user store
    pub user_id: u32,
    /// Row id of the (user, peer) association in durable storage, 0 if memory-only
    pub user_peer_id: u32,
    /// 20-byte peer identifier reported by the client
    pub peer_id: PeerId,
    /// IP address (IPv4 or IPv6) selected by the announce handler
    pub ip: IpAddr,
    /// Client listen port
    pub port: u16,
    /// Total bytes uploaded as reported by the client
    pub uploaded: u64,
    /// Total bytes downloaded as reported by the client
    pub downloaded: u64,
    /// Bytes the client discarded due to failed integrity checks
    pub corrupt: u64,
    /// Bytes left to download, 0 for seeders
    pub left: u64,
    /// Upload speed over the last announce window, bytes/sec
    pub speed_up: u32,
    /// Download speed over the last announce window, bytes/sec
    pub speed_dn: u32,
    /// Highest recorded upload speed, bytes/sec
    pub speed_up_max: u32,
    /// Highest recorded download speed, bytes/sec
    pub speed_dn_max: u32,
    /// Number of announces received for this swarm membership
    pub announces: u32,
    /// Accumulated seconds of swarm participation
    pub total_time: u32,
    /// Unix timestamp of the first announce
    pub announce_first: i64,
    /// Unix timestamp of the most recent announce, 0 until the first one lands
    pub announce_last: i64,
    pub location: LatLong,
    pub created_on: i64,
    pub updated_on: i64,
}

impl Peer {
    /// A freshly joined peer. Announce bookkeeping (speeds, counters,
    /// timestamps) is applied by the announce handler.
    pub fn new(user_id: u32, peer_id: PeerId, ip: IpAddr, port: u16, now: i64) -> Self {
        Self {
            user_id,
            user_peer_id: 0,
            peer_id,
            ip,
            port,
            uploaded: 0,
            downloaded: 0,
            corrupt: 0,
            left: 0,
            speed_up: 0,
            speed_dn: 0,
            speed_up_max: 0,
            speed_dn_max: 0,
            announces: 0,
            total_time: 0,
            announce_first: now,
            announce_last: 0,
            location: LatLong::default(),
            created_on: now,
            updated_on: now,
        }
    }

    /// A peer with `left == 0` has the full content.
    pub fn is_seeder(&self) -> bool {
        self.left == 0
    }

    /// True until the peer's first announce has been applied.
    pub fn is_new(&self) -> bool {
        self.announce_last == 0
    }
}

/// Snapshot of one torrent's active peers. Derived from the swarm index,
/// never persisted as a unit.
pub type Swarm = Vec<Peer>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_new_peer_is_new() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let peer = Peer::new(42, [1u8; 20], ip, 6881, 1000);

        assert!(peer.is_new());
        assert_eq!(peer.announces, 0);
        assert_eq!(peer.announce_first, 1000);
        assert_eq!(peer.created_on, 1000);
    }

    #[test]
    fn test_seeder_status() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let mut peer = Peer::new(1, [1u8; 20], ip, 6881, 1000);

        assert!(peer.is_seeder());
        peer.left = 512;
        assert!(!peer.is_seeder());
    }
}
