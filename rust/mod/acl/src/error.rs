use thiserror::Error;

use posadmin_client::ApiError;

/// Menu permission core error type.
///
/// Access checks and route resolution never return these; only
/// construction (taxonomy, config, matrix edits) and the grant fetch do.
#[derive(Debug, Error)]
pub enum AclError {
    #[error("taxonomy: {0}")]
    Taxonomy(String),

    #[error("config: {0}")]
    Config(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("session: {0}")]
    Session(String),

    #[error("fetch: {0}")]
    Fetch(#[from] ApiError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
