use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ApiError, TokenSource};

/// One permission record as served by the backend: a role's access to a
/// single menu category and the submenus inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    /// Category id, e.g. "products".
    pub menu_category: String,

    /// Submenu display names the role may open.
    #[serde(default)]
    pub submenus: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Role id the record belongs to. Some backends omit it on reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Client for the role-permission endpoints:
///
/// - `GET  {base}/permissions/role/{role_id}`: list a role's records
/// - `PUT  {base}/permissions/role/{role_id}`: replace a role's records
pub struct PermissionClient {
    http: reqwest::Client,
    base_url: String,
    token_source: Arc<dyn TokenSource>,
}

impl PermissionClient {
    pub fn new(base_url: impl Into<String>, token_source: Arc<dyn TokenSource>) -> Self {
        Self::with_http(reqwest::Client::new(), base_url, token_source)
    }

    /// Build on a preconfigured reqwest client (timeouts, proxies).
    pub fn with_http(
        http: reqwest::Client,
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_source,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn role_url(&self, role_id: &str) -> Result<String, ApiError> {
        if role_id.is_empty() || role_id.contains('/') {
            return Err(ApiError::InvalidRequest(format!("bad role id '{}'", role_id)));
        }
        Ok(format!("{}/permissions/role/{}", self.base_url, role_id))
    }

    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, ApiError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Server { status: code, message: body });
        }
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }

    /// Fetch every permission record of a role.
    pub async fn list_for_role(&self, role_id: &str) -> Result<Vec<PermissionRecord>, ApiError> {
        let url = self.role_url(role_id)?;
        debug!(%url, "fetching role permissions");
        let req = self.authed(self.http.get(&url)).await?;
        let resp = req.send().await?;
        Self::parse(resp).await
    }

    /// Replace a role's permission records; returns what the server stored.
    pub async fn replace_for_role(
        &self,
        role_id: &str,
        records: &[PermissionRecord],
    ) -> Result<Vec<PermissionRecord>, ApiError> {
        let url = self.role_url(role_id)?;
        debug!(%url, count = records.len(), "saving role permissions");
        let req = self.authed(self.http.put(&url).json(records)).await?;
        let resp = req.send().await?;
        Self::parse(resp).await
    }
}
