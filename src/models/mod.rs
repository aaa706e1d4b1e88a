pub mod peer;
pub mod torrent;
pub mod user;

/// 20-byte SHA-1 of a torrent's info dictionary. Compared and hashed by bytes.
pub type InfoHash = [u8; 20];

/// 20-byte client-generated peer identifier.
pub type PeerId = [u8; 20];
