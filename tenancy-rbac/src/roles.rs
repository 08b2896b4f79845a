//! Organization role hierarchy
//!
//! This module defines the single role a user holds within an organization,
//! ordered from least to most privileged.

use serde::{Deserialize, Serialize};

/// User role within an organization.
///
/// Roles form a total order: Viewer < Member < Admin < Owner. A membership
/// carries exactly one role.
///
/// # Permission Model
///
/// - **Viewer**: Read-only access to organization resources
/// - **Member**: Regular participant in the organization
/// - **Admin**: Can invite and remove members and viewers
/// - **Owner**: Full organization control, including other admins and owners
///
/// # Examples
///
/// ```
/// use tenancy_rbac::Role;
///
/// assert!(Role::Owner > Role::Admin);
/// assert!(Role::Admin.is_admin());
/// assert!(!Role::Member.is_admin());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access to organization resources
    Viewer = 1,

    /// Regular organization member
    Member = 2,

    /// Can manage members below admin
    Admin = 3,

    /// Full organization control
    Owner = 4,
}

impl Role {
    /// Every role, from least to most privileged.
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Member, Role::Admin, Role::Owner];

    /// Check if this role has admin privileges.
    ///
    /// # Returns
    ///
    /// `true` for Admin and Owner roles
    pub fn is_admin(&self) -> bool {
        *self >= Role::Admin
    }

    /// Check if this is the owner role.
    pub fn is_owner(&self) -> bool {
        *self == Role::Owner
    }

    /// Check if this role sits strictly above `other` in the hierarchy.
    pub fn outranks(&self, other: Role) -> bool {
        *self > other
    }

    /// Parse role from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, surrounding whitespace ignored)
    ///
    /// # Returns
    ///
    /// `Some(Role)` if valid, `None` otherwise
    ///
    /// # Examples
    ///
    /// ```
    /// use tenancy_rbac::Role;
    ///
    /// assert_eq!(Role::parse("admin"), Some(Role::Admin));
    /// assert_eq!(Role::parse("VIEWER"), Some(Role::Viewer));
    /// assert_eq!(Role::parse("superuser"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Some(Self::Viewer),
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Parse a role, falling back to the lowest privilege.
    ///
    /// Unrecognized strings become [`Role::Viewer`]. Policy checks use this so
    /// that an unknown role can never grant more than read access.
    ///
    /// ```
    /// use tenancy_rbac::Role;
    ///
    /// assert_eq!(Role::parse_lossy("owner"), Role::Owner);
    /// assert_eq!(Role::parse_lossy("root"), Role::Viewer);
    /// ```
    pub fn parse_lossy(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Get string representation of the role.
    ///
    /// # Examples
    ///
    /// ```
    /// use tenancy_rbac::Role;
    ///
    /// assert_eq!(Role::Admin.as_str(), "admin");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Viewer => "Viewer",
            Self::Member => "Member",
            Self::Admin => "Admin",
            Self::Owner => "Owner",
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Viewer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::parse_lossy(s)
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Self::parse_lossy(&s)
    }
}

impl From<&String> for Role {
    fn from(s: &String) -> Self {
        Self::parse_lossy(s)
    }
}
