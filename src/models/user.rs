/// An authenticated tracker user. Byte totals are advanced by the batch
/// updater, not by announce handlers directly.
#[derive(Clone, Debug)]
pub struct User {
    pub user_id: u32,
    /// Opaque token identifying the user in announce URLs. Never logged.
    pub passkey: String,
    pub downloaded_total: u64,
    pub uploaded_total: u64,
    /// Soft-disable; disabled users fail announce auth
    pub enabled: bool,
    pub created_on: i64,
    pub updated_on: i64,
}

impl User {
    pub fn new(user_id: u32, passkey: String, now: i64) -> Self {
        Self {
            user_id,
            passkey,
            downloaded_total: 0,
            uploaded_total: 0,
            enabled: true,
            created_on: now,
            updated_on: now,
        }
    }
}

/// Field patch for `UserStore::update`. `Some` marks a field dirty.
#[derive(Clone, Debug, Default)]
pub struct UserPatch {
    pub passkey: Option<String>,
    pub enabled: Option<bool>,
    pub downloaded_total: Option<u64>,
    pub uploaded_total: Option<u64>,
}
