use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use posadmin_client::{ApiError, PermissionClient};

use crate::error::AclError;
use crate::model::PermissionGrant;

/// Where a role's grants come from. The REST client is the production
/// implementation; tests plug in scripted sources.
#[async_trait::async_trait]
pub trait GrantSource: Send + Sync + 'static {
    async fn fetch_grants(&self, role_id: &str) -> Result<Vec<PermissionGrant>, AclError>;
}

#[async_trait::async_trait]
impl GrantSource for PermissionClient {
    async fn fetch_grants(&self, role_id: &str) -> Result<Vec<PermissionGrant>, AclError> {
        let records = self.list_for_role(role_id).await?;
        Ok(records
            .into_iter()
            .map(|r| PermissionGrant::from_record(r, role_id))
            .collect())
    }
}

/// Grants held in memory. Used by `navcheck --grants-file` and by tests to
/// script backend behaviour (revocations, outages).
pub struct StaticGrants {
    response: RwLock<Result<Vec<PermissionGrant>, String>>,
    calls: AtomicUsize,
}

impl StaticGrants {
    pub fn new(grants: Vec<PermissionGrant>) -> Self {
        Self {
            response: RwLock::new(Ok(grants)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Serve these grants from now on.
    pub fn set_grants(&self, grants: Vec<PermissionGrant>) {
        *self.response.write().unwrap_or_else(PoisonError::into_inner) = Ok(grants);
    }

    /// Fail every fetch with a 503 until `set_grants` is called again.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.response.write().unwrap_or_else(PoisonError::into_inner) = Err(message.into());
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GrantSource for StaticGrants {
    async fn fetch_grants(&self, role_id: &str) -> Result<Vec<PermissionGrant>, AclError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self.response.read().unwrap_or_else(PoisonError::into_inner);
        match &*response {
            Ok(grants) => Ok(grants
                .iter()
                .filter(|g| g.role_id == role_id)
                .cloned()
                .collect()),
            Err(message) => Err(AclError::Fetch(ApiError::Server {
                status: 503,
                message: message.clone(),
            })),
        }
    }
}
