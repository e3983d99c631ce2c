//! Session source: where the permission store learns the current role.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AclError;
use crate::model::Role;
use crate::storage::SessionStorage;

/// Storage key holding the signed-in user as JSON.
pub const USER_KEY: &str = "user";

/// Provides the role of the signed-in user, if any.
pub trait SessionSource: Send + Sync {
    fn current_role(&self) -> Option<Role>;
}

/// Stored user shape. Only the role matters here; other fields are ignored.
#[derive(Debug, Serialize, Deserialize)]
struct StoredUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<Role>,
}

/// Reads `user` from storage. Unparsable data is treated as "no session".
impl SessionSource for SessionStorage {
    fn current_role(&self) -> Option<Role> {
        let raw = self.get(USER_KEY)?;
        match serde_json::from_str::<StoredUser>(&raw) {
            Ok(user) => user.role,
            Err(e) => {
                warn!(error = %e, "stored session is malformed; treating as signed out");
                None
            }
        }
    }
}

/// Write the signed-in user's role, as the login screen does.
pub fn sign_in(storage: &SessionStorage, role: &Role) -> Result<(), AclError> {
    let json = serde_json::to_string(&StoredUser { role: Some(role.clone()) })
        .map_err(|e| AclError::Session(e.to_string()))?;
    storage.set(USER_KEY, json);
    Ok(())
}

/// Drop the stored session.
pub fn sign_out(storage: &SessionStorage) {
    storage.remove(USER_KEY);
}

/// A session source with a fixed role, for tools and tests.
#[derive(Debug, Clone, Default)]
pub struct FixedSession(pub Option<Role>);

impl SessionSource for FixedSession {
    fn current_role(&self) -> Option<Role> {
        self.0.clone()
    }
}
