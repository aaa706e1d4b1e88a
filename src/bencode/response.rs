use crate::bencode::encoder::{close_dict, open_dict, BencodeEncode};
use crate::models::peer::Peer;
use crate::models::InfoHash;
use std::net::IpAddr;

/// Build the bencoded announce response. Responses are always compact; the
/// non-compact peer dictionary format from BEP-3 is not supported by design.
///
/// IPv4 peers land in `peers` (6 bytes each), IPv6 peers in `peers6`
/// (18 bytes each).
pub fn announce(
    seeders: u32,
    leechers: u32,
    interval: i64,
    min_interval: i64,
    peers: &[Peer],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(96 + peers.len() * 18);

    open_dict(&mut buf);

    "complete".bencode(&mut buf);
    seeders.bencode(&mut buf);

    "incomplete".bencode(&mut buf);
    leechers.bencode(&mut buf);

    "interval".bencode(&mut buf);
    interval.bencode(&mut buf);

    "min interval".bencode(&mut buf);
    min_interval.bencode(&mut buf);

    "peers".bencode(&mut buf);
    compact_v4(peers).bencode(&mut buf);

    "peers6".bencode(&mut buf);
    compact_v6(peers).bencode(&mut buf);

    close_dict(&mut buf);

    buf
}

/// One torrent's scrape counters.
pub struct ScrapeEntry {
    pub info_hash: InfoHash,
    pub complete: u32,
    pub downloaded: u16,
    pub incomplete: u32,
}

/// Build the bencoded scrape response: a `files` dict keyed by raw 20-byte
/// info hashes. Keys are emitted in byte order as bencode requires.
pub fn scrape(entries: &mut [ScrapeEntry]) -> Vec<u8> {
    entries.sort_by(|a, b| a.info_hash.cmp(&b.info_hash));

    let mut buf = Vec::with_capacity(32 + entries.len() * 96);

    open_dict(&mut buf);
    "files".bencode(&mut buf);
    open_dict(&mut buf);

    for entry in entries.iter() {
        entry.info_hash.as_slice().bencode(&mut buf);

        open_dict(&mut buf);
        "complete".bencode(&mut buf);
        entry.complete.bencode(&mut buf);
        "downloaded".bencode(&mut buf);
        entry.downloaded.bencode(&mut buf);
        "incomplete".bencode(&mut buf);
        entry.incomplete.bencode(&mut buf);
        close_dict(&mut buf);
    }

    close_dict(&mut buf);
    close_dict(&mut buf);

    buf
}

/// Build a protocol failure body: `d14:failure reason<n>:<msg>e`.
/// Served with HTTP 200 per BEP-3.
pub fn failure(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + message.len());

    open_dict(&mut buf);
    "failure reason".bencode(&mut buf);
    message.bencode(&mut buf);
    close_dict(&mut buf);

    buf
}

/// 4 address bytes + 2 port bytes per IPv4 peer, big-endian, concatenated.
fn compact_v4(peers: &[Peer]) -> Vec<u8> {
    let mut out = Vec::with_capacity(peers.len() * 6);
    for peer in peers {
        if let IpAddr::V4(ip) = peer.ip {
            out.extend_from_slice(&ip.octets());
            out.extend_from_slice(&peer.port.to_be_bytes());
        }
    }
    out
}

/// 16 address bytes + 2 port bytes per IPv6 peer.
fn compact_v6(peers: &[Peer]) -> Vec<u8> {
    let mut out = Vec::with_capacity(peers.len() * 18);
    for peer in peers {
        if let IpAddr::V6(ip) = peer.ip {
            out.extend_from_slice(&ip.octets());
            out.extend_from_slice(&peer.port.to_be_bytes());
        }
    }
    out
}
