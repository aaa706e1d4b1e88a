pub mod announce;
pub mod scrape;

use crate::core::error::TrackerError;
use crate::core::state::AppState;
use crate::models::user::User;
use crate::stores::UserStore;
use crate::utils::time::unix_now;

/// Shortest passkey worth a store lookup.
const PASSKEY_MIN_LEN: usize = 20;

/// Resolve the announcing user from the URL passkey.
///
/// In public mode an unknown passkey degrades to the anonymous user (id 0)
/// instead of rejecting; explicitly disabled accounts stay rejected either
/// way.
pub(crate) fn resolve_user(state: &AppState, passkey: &str) -> Result<User, TrackerError> {
    if passkey.len() < PASSKEY_MIN_LEN {
        if state.config.tracker.public {
            return Ok(anonymous_user());
        }
        return Err(TrackerError::Unauthorized);
    }

    match state.stores.users.get_by_passkey(passkey) {
        Ok(user) if user.enabled => Ok(user),
        Ok(_) => Err(TrackerError::Unauthorized),
        Err(TrackerError::Unauthorized) if state.config.tracker.public => Ok(anonymous_user()),
        Err(e) => Err(e),
    }
}

fn anonymous_user() -> User {
    User::new(0, String::new(), unix_now())
}
