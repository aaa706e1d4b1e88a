use crate::core::error::TrackerError;
use std::net::IpAddr;

/// Pick the peer address to record for an announce.
///
/// The client-supplied `ip` parameter is adversarial input: honoring it
/// blindly lets anyone spoof third parties into a swarm. It is used only
/// when the operator opted in AND the request arrived from RFC1918 space
/// (a NAT'd client telling us its external address) AND the supplied value
/// is itself routable. Everything else falls back to the socket address.
pub fn select_peer_ip(
    source: IpAddr,
    supplied: Option<IpAddr>,
    allow_client_ip: bool,
    allow_non_routable: bool,
) -> Result<IpAddr, TrackerError> {
    let chosen = match supplied {
        Some(ip) if allow_client_ip && is_rfc1918(source) && is_routable(ip) => ip,
        _ => source,
    };

    if !allow_non_routable && !is_routable(chosen) {
        return Err(TrackerError::InvalidIp);
    }

    Ok(chosen)
}

/// RFC1918 private IPv4 space. IPv6 sources never qualify.
pub fn is_rfc1918(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(_) => false,
    }
}

/// An address external peers could plausibly reach.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_multicast()
                || v4.is_broadcast()
                || v4.is_unspecified())
        }
        IpAddr::V6(v6) => {
            if v6.is_loopback() || v6.is_multicast() || v6.is_unspecified() {
                return false;
            }
            let segments = v6.segments();
            // fc00::/7 unique-local and fe80::/10 link-local
            if segments[0] & 0xfe00 == 0xfc00 {
                return false;
            }
            if segments[0] & 0xffc0 == 0xfe80 {
                return false;
            }
            true
        }
    }
}
