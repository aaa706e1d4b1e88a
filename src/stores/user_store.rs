use crate::core::error::TrackerError;
use crate::models::user::{User, UserPatch};
use crate::utils::time::unix_now;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::warn;

/// Byte credit coalesced by the batch updater, applied to user totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UserDelta {
    pub uploaded: u64,
    pub downloaded: u64,
}

/// User store contract. `get_by_passkey` runs once per announce and must be
/// O(1) or O(log n).
pub trait UserStore: Send + Sync {
    /// `Duplicate` when the passkey or user id is already registered.
    fn add(&self, user: User) -> Result<(), TrackerError>;

    /// `Unauthorized` when no user carries the passkey.
    fn get_by_passkey(&self, passkey: &str) -> Result<User, TrackerError>;

    fn get_by_id(&self, user_id: u32) -> Result<User, TrackerError>;

    fn delete(&self, passkey: &str) -> Result<(), TrackerError>;

    /// Write the dirty fields carried by the patch; `updated_on` is bumped.
    fn update(&self, passkey: &str, patch: UserPatch) -> Result<(), TrackerError>;

    /// Batch-apply byte credit keyed by user id. Unknown ids are skipped and
    /// logged once per batch.
    fn sync(&self, batch: &HashMap<u32, UserDelta>) -> Result<(), TrackerError>;

    /// Release backing resources. Idempotent.
    fn close(&self) -> Result<(), TrackerError>;
}

/// Reference in-memory user store: passkey-keyed primary map with a
/// user-id index so both announce auth and stat sync stay O(1).
pub struct MemoryUserStore {
    users: DashMap<String, User>,
    by_id: DashMap<u32, String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            by_id: DashMap::new(),
        }
    }
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore for MemoryUserStore {
    fn add(&self, user: User) -> Result<(), TrackerError> {
        if self.users.contains_key(&user.passkey) || self.by_id.contains_key(&user.user_id) {
            return Err(TrackerError::Duplicate);
        }

        self.by_id.insert(user.user_id, user.passkey.clone());
        self.users.insert(user.passkey.clone(), user);

        Ok(())
    }

    fn get_by_passkey(&self, passkey: &str) -> Result<User, TrackerError> {
        self.users
            .get(passkey)
            .map(|entry| entry.value().clone())
            .ok_or(TrackerError::Unauthorized)
    }

    fn get_by_id(&self, user_id: u32) -> Result<User, TrackerError> {
        let passkey = self
            .by_id
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or(TrackerError::NotFound)?;
        self.users
            .get(&passkey)
            .map(|entry| entry.value().clone())
            .ok_or(TrackerError::NotFound)
    }

    fn delete(&self, passkey: &str) -> Result<(), TrackerError> {
        let (_, user) = self.users.remove(passkey).ok_or(TrackerError::NotFound)?;
        self.by_id.remove(&user.user_id);
        Ok(())
    }

    fn update(&self, passkey: &str, patch: UserPatch) -> Result<(), TrackerError> {
        let (_, mut user) = self.users.remove(passkey).ok_or(TrackerError::NotFound)?;

        if let Some(new_passkey) = patch.passkey {
            self.by_id.insert(user.user_id, new_passkey.clone());
            user.passkey = new_passkey;
        }
        if let Some(enabled) = patch.enabled {
            user.enabled = enabled;
        }
        if let Some(downloaded_total) = patch.downloaded_total {
            user.downloaded_total = downloaded_total;
        }
        if let Some(uploaded_total) = patch.uploaded_total {
            user.uploaded_total = uploaded_total;
        }
        user.updated_on = unix_now();

        self.users.insert(user.passkey.clone(), user);

        Ok(())
    }

    fn sync(&self, batch: &HashMap<u32, UserDelta>) -> Result<(), TrackerError> {
        let mut unknown = 0usize;

        for (user_id, delta) in batch {
            let passkey = match self.by_id.get(user_id) {
                Some(entry) => entry.value().clone(),
                None => {
                    unknown += 1;
                    continue;
                }
            };
            if let Some(mut user) = self.users.get_mut(&passkey) {
                user.uploaded_total = user.uploaded_total.saturating_add(delta.uploaded);
                user.downloaded_total = user.downloaded_total.saturating_add(delta.downloaded);
                user.updated_on = unix_now();
            }
        }

        if unknown > 0 {
            warn!(unknown, "User sync skipped deltas for unknown user ids");
        }

        Ok(())
    }

    fn close(&self) -> Result<(), TrackerError> {
        Ok(())
    }
}
