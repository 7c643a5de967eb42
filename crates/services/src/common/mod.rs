//! Error taxonomy shared by every service
//!
//! Callers (the HTTP layer, out of scope here) only ever see these four
//! kinds plus Internal; module-level errors convert into them via `From`.

use crate::access::AccessError;
use crate::sessions::SessionError;
use ad_platforms::PlatformError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// No session, or refresh failed and the session was purged; the caller
    /// must re-authenticate with the platform
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// Session is valid but the seat/subscription check failed
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Malformed filter, or the platform returned a business-rule 4xx
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Network failure or 5xx from the platform's API
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SessionError> for CoreError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected => {
                CoreError::Unauthorized("platform not connected".to_string())
            }
            SessionError::Internal(e) => CoreError::Internal(e),
        }
    }
}

impl From<AccessError> for CoreError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Forbidden(reason) => CoreError::Forbidden(reason),
            AccessError::Internal(e) => CoreError::Internal(e),
        }
    }
}

impl From<PlatformError> for CoreError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unauthorized(msg) => CoreError::Unauthorized(msg),
            PlatformError::BadRequest(msg) => CoreError::BadRequest(msg),
            PlatformError::Unavailable(msg) => CoreError::Unavailable(msg),
            PlatformError::InvalidResponse(msg) => CoreError::Unavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_errors_map_onto_taxonomy() {
        let unauthorized: CoreError = PlatformError::Unauthorized("no token".into()).into();
        assert!(matches!(unauthorized, CoreError::Unauthorized(_)));

        let bad: CoreError = PlatformError::BadRequest("invalid campaign id".into()).into();
        assert!(matches!(bad, CoreError::BadRequest(_)));

        let down: CoreError = PlatformError::Unavailable("503".into()).into();
        assert!(matches!(down, CoreError::Unavailable(_)));
    }
}
