//! Error types for identity and session operations
//!
//! This module defines the errors an identity provider can report. They are
//! always returned as values; the session manager never panics on provider
//! failure.

use thiserror::Error;

/// Authentication error types.
///
/// These errors cover credential checks, session lifecycle failures and
/// transient provider outages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Email/password pair was rejected
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Sign-up attempted with an email that already has an identity
    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    /// Operation requires a signed-in session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Session has expired and cannot be refreshed
    #[error("Session has expired")]
    SessionExpired,

    /// Session was revoked or is unknown to the provider
    #[error("Session invalidated")]
    SessionInvalidated,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider could not be reached or answered with a failure
    #[error("Identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if this error should be logged at error level.
    ///
    /// Some errors (like invalid credentials) are expected and
    /// should not be logged as errors.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            AuthError::Internal(_) | AuthError::ConfigError(_) | AuthError::ProviderUnavailable(_)
        )
    }

    /// Check if the failure may succeed when the caller tries again.
    ///
    /// The session manager never retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthError::ProviderUnavailable(_) | AuthError::RateLimitExceeded
        )
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::NotAuthenticated
            | AuthError::SessionExpired
            | AuthError::SessionInvalidated => 401,

            AuthError::UserAlreadyExists(_) => 409,
            AuthError::RateLimitExceeded => 429,
            AuthError::ProviderUnavailable(_) => 503,

            AuthError::ConfigError(_) | AuthError::Internal(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::UserAlreadyExists(_) => "USER_ALREADY_EXISTS",
            AuthError::NotAuthenticated => "NOT_AUTHENTICATED",
            AuthError::SessionExpired => "SESSION_EXPIRED",
            AuthError::SessionInvalidated => "SESSION_INVALIDATED",
            AuthError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AuthError::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AuthError::ConfigError(_) => "CONFIG_ERROR",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AuthError::ProviderUnavailable("timeout".into()).is_transient());
        assert!(AuthError::RateLimitExceeded.is_transient());
        assert!(!AuthError::InvalidCredentials.is_transient());
    }

    #[test]
    fn test_status_and_codes() {
        assert_eq!(AuthError::InvalidCredentials.status_code(), 401);
        assert_eq!(AuthError::UserAlreadyExists("a@b.c".into()).status_code(), 409);
        assert_eq!(
            AuthError::ProviderUnavailable("down".into()).error_code(),
            "PROVIDER_UNAVAILABLE"
        );
        assert!(AuthError::Internal("boom".into()).is_server_error());
        assert!(!AuthError::SessionExpired.is_server_error());
    }
}
