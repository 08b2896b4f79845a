//! Membership domain models
//!
//! A membership links one user to one organization with a single role and a
//! status. Memberships are never hard-deleted; removal is a transition to
//! [`MembershipStatus::Suspended`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tenancy_rbac::Role;
use uuid::Uuid;

/// Membership lifecycle status.
///
/// ```text
/// invited --accept--> active --remove--> suspended
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Counts toward visibility and context resolution
    Active,
    /// Waiting for the invited user to accept
    Invited,
    /// Logically removed
    Suspended,
}

impl MembershipStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Invited => "invited",
            Self::Suspended => "suspended",
        }
    }
}

/// Organization membership linking a user to an organization.
///
/// `(user_id, organization_id)` identifies a membership uniquely.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use tenancy_org::OrganizationMembership;
/// use tenancy_rbac::Role;
///
/// let org_id = Uuid::now_v7();
/// let user_id = Uuid::now_v7();
/// let membership = OrganizationMembership::owner(org_id, user_id);
/// assert!(membership.is_active());
/// assert_eq!(membership.role, Role::Owner);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    /// Unique membership ID
    pub id: Uuid,

    /// Organization ID
    pub organization_id: Uuid,

    /// User ID
    pub user_id: Uuid,

    /// Role within the organization
    pub role: Role,

    /// Lifecycle status
    pub status: MembershipStatus,

    /// Who invited this user (if applicable)
    #[serde(default)]
    pub invited_by: Option<Uuid>,

    /// When the invitation was sent
    #[serde(default)]
    pub invited_at: Option<DateTime<Utc>>,

    /// When the membership became active
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    /// Row creation time
    pub created_at: DateTime<Utc>,

    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl OrganizationMembership {
    /// Creates the active owner membership for an organization's creator.
    pub fn owner(organization_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            organization_id,
            user_id,
            role: Role::Owner,
            status: MembershipStatus::Active,
            invited_by: None,
            invited_at: None,
            joined_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an active membership with the given role.
    pub fn active(organization_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self {
            role,
            ..Self::owner(organization_id, user_id)
        }
    }

    /// Creates a pending invitation.
    ///
    /// # Arguments
    ///
    /// * `organization_id` - The organization ID
    /// * `user_id` - The invited user
    /// * `role` - Role granted on acceptance
    /// * `inviter_id` - The user sending the invitation
    pub fn invited(organization_id: Uuid, user_id: Uuid, role: Role, inviter_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            organization_id,
            user_id,
            role,
            status: MembershipStatus::Invited,
            invited_by: Some(inviter_id),
            invited_at: Some(now),
            joined_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the membership is active.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Check if this is an active owner membership.
    pub fn is_active_owner(&self) -> bool {
        self.is_active() && self.role == Role::Owner
    }

    /// Mark an invitation as accepted.
    pub fn activate(&mut self) {
        let now = Utc::now();
        self.status = MembershipStatus::Active;
        self.joined_at = Some(now);
        self.updated_at = now;
    }

    /// Turn a suspended membership back into a pending invitation.
    pub fn reinvite(&mut self, role: Role, inviter_id: Uuid) {
        let now = Utc::now();
        self.role = role;
        self.status = MembershipStatus::Invited;
        self.invited_by = Some(inviter_id);
        self.invited_at = Some(now);
        self.joined_at = None;
        self.updated_at = now;
    }

    /// Logically remove the membership.
    pub fn suspend(&mut self) {
        self.status = MembershipStatus::Suspended;
        self.updated_at = Utc::now();
    }

    /// Order by join date ascending.
    ///
    /// Rows that never joined sort last; ties fall back to creation time and
    /// then ID so the order is total.
    pub fn cmp_join_order(&self, other: &Self) -> Ordering {
        match (self.joined_at, other.joined_at) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| self.created_at.cmp(&other.created_at))
        .then_with(|| self.id.cmp(&other.id))
    }
}
