use crate::core::error::TrackerError;
use crate::models::{InfoHash, PeerId};
use crate::utils::hex::url_decode;
use std::net::IpAddr;

/// Peers handed out when the client does not ask for a specific count.
pub const NUMWANT_DEFAULT: usize = 30;

/// Listen ports below this need root to bind on unix; clients claiming one
/// are lying or misconfigured.
const PORT_MIN: u16 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceEvent {
    Started,
    Stopped,
    Completed,
}

/// A parsed and validated announce query.
#[derive(Debug)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub corrupt: u64,
    pub left: u64,
    pub event: Option<AnnounceEvent>,
    pub numwant: usize,
    /// Client-claimed address; trusted only under the rules in
    /// `validation::ip`
    pub supplied_ip: Option<IpAddr>,
}

/// Parse the raw announce query string.
///
/// The query is split by hand rather than through a form decoder because
/// `info_hash` and `peer_id` are percent-encoded binary, not UTF-8.
pub fn parse_announce(raw_query: &str) -> Result<AnnounceRequest, TrackerError> {
    let mut info_hash: Option<&str> = None;
    let mut peer_id: Option<&str> = None;
    let mut port: Option<&str> = None;
    let mut uploaded: Option<&str> = None;
    let mut downloaded: Option<&str> = None;
    let mut left: Option<&str> = None;
    let mut corrupt: Option<&str> = None;
    let mut event: Option<&str> = None;
    let mut numwant: Option<&str> = None;
    let mut ip: Option<&str> = None;

    for pair in raw_query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            match key {
                "info_hash" => info_hash.get_or_insert(value),
                "peer_id" => peer_id.get_or_insert(value),
                "port" => port.get_or_insert(value),
                "uploaded" => uploaded.get_or_insert(value),
                "downloaded" => downloaded.get_or_insert(value),
                "left" => left.get_or_insert(value),
                "corrupt" => corrupt.get_or_insert(value),
                "event" => event.get_or_insert(value),
                "numwant" => numwant.get_or_insert(value),
                "ip" => ip.get_or_insert(value),
                _ => continue,
            };
        }
    }

    let info_hash = decode_hash(info_hash, || TrackerError::InvalidInfoHash)?;
    let peer_id = decode_hash(peer_id, || TrackerError::InvalidPeerId)?;

    let port: u16 = port
        .and_then(|v| v.parse().ok())
        .ok_or(TrackerError::InvalidPort)?;
    if port < PORT_MIN {
        return Err(TrackerError::InvalidPort);
    }

    let uploaded = required_u64(uploaded)?;
    let downloaded = required_u64(downloaded)?;
    let left = required_u64(left)?;
    let corrupt = corrupt.and_then(|v| v.parse().ok()).unwrap_or(0);

    // Unknown event names fall through to a regular announce rather than
    // rejecting clients that send extensions like "paused"
    let event = match event.unwrap_or("") {
        "started" => Some(AnnounceEvent::Started),
        "stopped" => Some(AnnounceEvent::Stopped),
        "completed" => Some(AnnounceEvent::Completed),
        _ => None,
    };

    let numwant = numwant
        .and_then(|v| v.parse().ok())
        .unwrap_or(NUMWANT_DEFAULT);

    let supplied_ip = match ip {
        Some(raw) => Some(
            raw.parse::<IpAddr>()
                .map_err(|_| TrackerError::MalformedRequest)?,
        ),
        None => None,
    };

    Ok(AnnounceRequest {
        info_hash,
        peer_id,
        port,
        uploaded,
        downloaded,
        corrupt,
        left,
        event,
        numwant,
        supplied_ip,
    })
}

/// Parse a scrape query: every repeated `info_hash` key, in order.
pub fn parse_scrape(raw_query: &str) -> Result<Vec<InfoHash>, TrackerError> {
    let mut hashes = Vec::new();

    for pair in raw_query.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            if key == "info_hash" {
                hashes.push(decode_hash(Some(value), || TrackerError::InvalidInfoHash)?);
            }
        }
    }

    if hashes.is_empty() {
        return Err(TrackerError::MalformedRequest);
    }

    Ok(hashes)
}

fn decode_hash(value: Option<&str>, err: fn() -> TrackerError) -> Result<[u8; 20], TrackerError> {
    let raw = value.ok_or_else(err)?;
    let bytes = url_decode(raw).map_err(|_| err())?;
    bytes.try_into().map_err(|_| err())
}

fn required_u64(value: Option<&str>) -> Result<u64, TrackerError> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or(TrackerError::MalformedRequest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "%12%34%56%78%9a%bc%de%f0%11%22%33%44%55%66%77%88%99%aa%bb%cc";

    fn query(extra: &str) -> String {
        format!(
            "info_hash={}&peer_id={}&port=6881&uploaded=10&downloaded=20&left=30{}",
            HASH, HASH, extra
        )
    }

    #[test]
    fn test_parse_full_announce() {
        let req = parse_announce(&query("&event=started&numwant=25&corrupt=5")).unwrap();

        assert_eq!(req.info_hash[0], 0x12);
        assert_eq!(req.info_hash[19], 0xcc);
        assert_eq!(req.port, 6881);
        assert_eq!(req.uploaded, 10);
        assert_eq!(req.downloaded, 20);
        assert_eq!(req.left, 30);
        assert_eq!(req.corrupt, 5);
        assert_eq!(req.event, Some(AnnounceEvent::Started));
        assert_eq!(req.numwant, 25);
        assert!(req.supplied_ip.is_none());
    }

    #[test]
    fn test_numwant_defaults() {
        let req = parse_announce(&query("")).unwrap();
        assert_eq!(req.numwant, NUMWANT_DEFAULT);
    }

    #[test]
    fn test_missing_info_hash() {
        let q = format!("peer_id={}&port=6881&uploaded=0&downloaded=0&left=0", HASH);
        assert!(matches!(
            parse_announce(&q).unwrap_err(),
            TrackerError::InvalidInfoHash
        ));
    }

    #[test]
    fn test_short_info_hash() {
        let q = format!(
            "info_hash=%12%34&peer_id={}&port=6881&uploaded=0&downloaded=0&left=0",
            HASH
        );
        assert!(matches!(
            parse_announce(&q).unwrap_err(),
            TrackerError::InvalidInfoHash
        ));
    }

    #[test]
    fn test_missing_peer_id() {
        let q = format!("info_hash={}&port=6881&uploaded=0&downloaded=0&left=0", HASH);
        assert!(matches!(
            parse_announce(&q).unwrap_err(),
            TrackerError::InvalidPeerId
        ));
    }

    #[test]
    fn test_privileged_port_rejected() {
        let q = format!(
            "info_hash={}&peer_id={}&port=80&uploaded=0&downloaded=0&left=0",
            HASH, HASH
        );
        assert!(matches!(
            parse_announce(&q).unwrap_err(),
            TrackerError::InvalidPort
        ));
    }

    #[test]
    fn test_port_bounds() {
        let ok = format!(
            "info_hash={}&peer_id={}&port=1024&uploaded=0&downloaded=0&left=0",
            HASH, HASH
        );
        assert_eq!(parse_announce(&ok).unwrap().port, 1024);

        let ok = format!(
            "info_hash={}&peer_id={}&port=65535&uploaded=0&downloaded=0&left=0",
            HASH, HASH
        );
        assert_eq!(parse_announce(&ok).unwrap().port, 65535);

        let bad = format!(
            "info_hash={}&peer_id={}&port=65536&uploaded=0&downloaded=0&left=0",
            HASH, HASH
        );
        assert!(parse_announce(&bad).is_err());
    }

    #[test]
    fn test_missing_counters_malformed() {
        let q = format!("info_hash={}&peer_id={}&port=6881", HASH, HASH);
        assert!(matches!(
            parse_announce(&q).unwrap_err(),
            TrackerError::MalformedRequest
        ));
    }

    #[test]
    fn test_unknown_event_is_regular() {
        let req = parse_announce(&query("&event=paused")).unwrap();
        assert_eq!(req.event, None);
    }

    #[test]
    fn test_supplied_ip_parsed() {
        let req = parse_announce(&query("&ip=10.0.0.2")).unwrap();
        assert_eq!(req.supplied_ip, Some("10.0.0.2".parse().unwrap()));

        let req = parse_announce(&query("&ip=2001%3Adb8%3A%3A1"));
        // Percent-encoded colons are not decoded for plain params; clients
        // send the address literally
        assert!(req.is_err());

        let req = parse_announce(&query("&ip=2001:db8::1")).unwrap();
        assert_eq!(req.supplied_ip, Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_bad_supplied_ip_malformed() {
        assert!(matches!(
            parse_announce(&query("&ip=not-an-ip")).unwrap_err(),
            TrackerError::MalformedRequest
        ));
    }

    #[test]
    fn test_first_repeated_key_wins() {
        let req = parse_announce(&query("&numwant=5&numwant=50")).unwrap();
        assert_eq!(req.numwant, 5);
    }

    #[test]
    fn test_parse_scrape_multiple_hashes() {
        let q = format!("info_hash={}&info_hash={}", HASH, HASH);
        let hashes = parse_scrape(&q).unwrap();
        assert_eq!(hashes.len(), 2);
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn test_parse_scrape_empty_rejected() {
        assert!(matches!(
            parse_scrape("numwant=10").unwrap_err(),
            TrackerError::MalformedRequest
        ));
    }
}
