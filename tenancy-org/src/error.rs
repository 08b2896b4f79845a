//! Organization error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors reported by an [`OrganizationStore`](crate::store::OrganizationStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("Conflict on {entity}: {detail}")]
    Conflict {
        /// Entity kind ("organization", "membership", "profile").
        entity: &'static str,
        /// What collided.
        detail: String,
    },

    /// A stored row could not be decoded into its record type.
    #[error("Malformed {entity} row: {reason}")]
    MalformedRow {
        /// Entity kind.
        entity: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// The write would leave the organization without an active owner.
    #[error("Organization {0} must keep at least one active owner")]
    LastOwner(Uuid),

    /// The storage backend failed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if this is a uniqueness violation.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during organization context operations.
#[derive(Debug, Error)]
pub enum OrgError {
    /// Operation needs a signed-in identity.
    #[error("No authenticated identity")]
    Unauthenticated,

    /// Slug or membership already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller's membership or role does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Another organization switch is still in flight.
    #[error("An organization switch is already in progress")]
    Busy,

    /// Organization or membership not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// The ID that was not found.
        id: Uuid,
    },

    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The identity changed while the operation was in flight.
    #[error("Identity changed before the operation completed")]
    Superseded,

    /// Storage collaborator failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for organization context operations.
pub type OrgResult<T> = Result<T, OrgError>;

impl OrgError {
    /// Create a forbidden error.
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// Create a not-found error for an organization.
    pub fn organization_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "organization",
            id,
        }
    }

    /// Create a not-found error for a membership.
    pub fn membership_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "membership",
            id,
        }
    }

    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            OrgError::Unauthenticated => 401,
            OrgError::Forbidden(_) => 403,
            OrgError::NotFound { .. } => 404,
            OrgError::Conflict(_) | OrgError::Busy | OrgError::Superseded => 409,
            OrgError::Validation(_) => 422,
            OrgError::Storage(_) => 500,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrgError::Unauthenticated => "UNAUTHENTICATED",
            OrgError::Conflict(_) => "CONFLICT",
            OrgError::Forbidden(_) => "FORBIDDEN",
            OrgError::Busy => "BUSY",
            OrgError::NotFound { .. } => "NOT_FOUND",
            OrgError::Validation(_) => "VALIDATION_FAILED",
            OrgError::Superseded => "SUPERSEDED",
            OrgError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
