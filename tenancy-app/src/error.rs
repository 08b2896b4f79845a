//! Application error types.

use tenancy_auth::AuthError;
use tenancy_org::OrgError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by the composition root.
#[derive(Debug, Error)]
pub enum AppError {
    /// Identity provider failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Organization context failure.
    #[error(transparent)]
    Org(#[from] OrgError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for composition root operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Auth(e) => e.status_code(),
            AppError::Org(e) => e.status_code(),
            AppError::Config(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Auth(e) => e.error_code(),
            AppError::Org(e) => e.error_code(),
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: AppError = OrgError::Busy.into();
        assert_eq!(err.error_code(), "BUSY");

        let err: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status_code(), AuthError::InvalidCredentials.status_code());
    }
}
