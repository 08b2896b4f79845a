//! Identity and session records
//!
//! The identity provider owns these values. This crate only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The authenticated principal returned by the identity provider.
///
/// Created by the provider on sign-up and immutable from this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Identity ID (also the user ID used by memberships and profiles)
    pub id: Uuid,

    /// Primary email
    pub email: String,

    /// When the identity was created
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Creates a new identity with a fresh UUID v7.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenancy_auth::Identity;
    ///
    /// let identity = Identity::new("ada@example.com");
    /// assert_eq!(identity.email, "ada@example.com");
    /// ```
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// An active session for an identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Signed-in identity
    pub identity: Identity,

    /// Opaque access token
    pub access_token: String,

    /// Opaque refresh token
    pub refresh_token: String,

    /// When the access token was issued
    pub issued_at: DateTime<Utc>,

    /// When the access token stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the access token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// ID of the signed-in identity.
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Email/password credentials for sign-in and sign-up.
#[derive(Clone)]
pub struct Credentials {
    /// Account email
    pub email: String,

    /// Plaintext password (never logged)
    pub password: String,
}

impl Credentials {
    /// Create credentials from an email and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Email normalized for lookups (trimmed, lowercase).
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("ada@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("ada@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_normalized_email() {
        let creds = Credentials::new("  Ada@Example.COM ", "pw");
        assert_eq!(creds.normalized_email(), "ada@example.com");
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let mut session = Session {
            identity: Identity::new("ada@example.com"),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            issued_at: now,
            expires_at: now + Duration::hours(1),
        };
        assert!(!session.is_expired());
        assert!(!format!("{:?}", session).contains("access"));

        session.expires_at = now - Duration::seconds(1);
        assert!(session.is_expired());
    }
}
