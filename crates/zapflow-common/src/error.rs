//! Error types for zapflow

use thiserror::Error;

/// Main error type for zapflow
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Trial-tier limit reached; the message is shown to the user as-is
    #[error("{0}")]
    QuotaExceeded(String),

    /// Campaign (or other record) is not in a state that allows the action
    #[error("{0}")]
    InvalidState(String),

    #[error("Messaging gateway error: {0}")]
    Gateway(String),

    #[error("{0}")]
    GatewayNotConnected(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for zapflow
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Validation(_) => 400,
            Error::NotFound(_) => 404,
            Error::QuotaExceeded(_) => 403,
            Error::InvalidState(_) => 409,
            Error::Gateway(_) => 502,
            Error::GatewayNotConnected(_) => 400,
            Error::Auth(_) => 401,
            Error::PermissionDenied(_) => 403,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::QuotaExceeded(_) => "QUOTA_EXCEEDED",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::Gateway(_) => "GATEWAY_ERROR",
            Error::GatewayNotConnected(_) => "GATEWAY_NOT_CONNECTED",
            Error::Auth(_) => "UNAUTHORIZED",
            Error::PermissionDenied(_) => "FORBIDDEN",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message may be shown to the caller verbatim.
    ///
    /// Storage and internal failures are logged but replaced by a generic
    /// message at the API boundary.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::Database(_) | Error::Internal(_) | Error::Other(_)
        )
    }
}
