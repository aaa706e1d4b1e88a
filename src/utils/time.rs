use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. Peer and row timestamps are plain unix
/// seconds throughout.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("System time is before Unix epoch")
        .as_secs() as i64
}
