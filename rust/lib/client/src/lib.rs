//! posadmin HTTP client.
//!
//! Talks to the back-office REST backend for the one resource the menu
//! permission core needs: per-role permission records. Authentication is
//! handled by pluggable [`TokenSource`] implementations.
//!
//! # Usage
//!
//! ```ignore
//! use posadmin_client::{PermissionClient, StaticToken};
//!
//! let client = PermissionClient::new("http://localhost:4000/api", Arc::new(StaticToken::new(jwt)));
//! let records = client.list_for_role("64f1c2...").await?;
//! ```

pub mod permissions;

pub use permissions::{PermissionClient, PermissionRecord};

// ── Error ───────────────────────────────────────────────────────────

/// Client-side API error.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("auth: {0}")]
    Auth(String),

    #[error("decode: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// True for failures that a later retry may resolve (transport errors, 5xx).
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
///
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication; requests go out anonymous.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Bearer token obtained at login and kept for the session.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        if self.0.is_empty() {
            return Err(ApiError::Auth("empty bearer token".into()));
        }
        Ok(Some(self.0.clone()))
    }
}
