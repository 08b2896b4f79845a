//! User profiles
//!
//! Profiles carry display data for an identity and are created lazily the
//! first time an authenticated user's profile is read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenancy_auth::Identity;
use uuid::Uuid;

/// Display profile for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Same as the identity ID
    pub id: Uuid,

    /// Contact email
    pub email: String,

    /// Given name
    #[serde(default)]
    pub first_name: Option<String>,

    /// Family name
    #[serde(default)]
    pub last_name: Option<String>,

    /// Avatar image reference
    #[serde(default)]
    pub avatar_url: Option<String>,

    /// When the profile was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Creates the minimal profile for an identity: ID and email only.
    ///
    /// ```
    /// use tenancy_auth::Identity;
    /// use tenancy_org::UserProfile;
    ///
    /// let identity = Identity::new("ada@example.com");
    /// let profile = UserProfile::minimal(&identity);
    /// assert_eq!(profile.id, identity.id);
    /// assert_eq!(profile.display_name(), "ada@example.com");
    /// ```
    pub fn minimal(identity: &Identity) -> Self {
        let now = Utc::now();
        Self {
            id: identity.id,
            email: identity.email.clone(),
            first_name: None,
            last_name: None,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Name to show in member lists, falling back to the email.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.clone(),
        }
    }
}
