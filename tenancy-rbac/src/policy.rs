//! # Membership policy
//!
//! Pure permission decisions over [`Role`] values. Nothing here performs I/O
//! or keeps state, and no function can fail: every check answers `true` or
//! `false`.
//!
//! Role arguments take anything convertible into a [`Role`], including raw
//! strings. An unrecognized string is evaluated as [`Role::Viewer`].

use uuid::Uuid;

use crate::roles::Role;

/// Check whether a role may manage an organization's members.
///
/// # Example
///
/// ```
/// use tenancy_rbac::{can_manage_members, Role};
///
/// assert!(can_manage_members(Role::Admin));
/// assert!(can_manage_members("owner"));
/// assert!(!can_manage_members("member"));
/// assert!(!can_manage_members("root"));
/// ```
pub fn can_manage_members(role: impl Into<Role>) -> bool {
    role.into().is_admin()
}

/// Check whether the acting user may remove the target user.
///
/// The rules, in order:
/// 1. Only owners and admins may remove anyone.
/// 2. Nobody removes themselves through this path.
/// 3. Admins may remove members and viewers, never admins or owners.
/// 4. Owners may remove anyone except the last remaining active owner.
///
/// # Arguments
///
/// * `acting_role` - Role of the user performing the removal
/// * `acting_user_id` - ID of the user performing the removal
/// * `target_role` - Role of the user being removed
/// * `target_user_id` - ID of the user being removed
/// * `active_owner_count` - Active owners currently in the organization
///
/// # Example
///
/// ```
/// use tenancy_rbac::{can_remove_member, Role};
/// use uuid::Uuid;
///
/// let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
///
/// assert!(can_remove_member(Role::Admin, a, Role::Member, b, 1));
/// assert!(!can_remove_member(Role::Admin, a, Role::Admin, b, 1));
/// assert!(can_remove_member(Role::Owner, a, Role::Owner, b, 2));
/// assert!(!can_remove_member(Role::Owner, a, Role::Owner, b, 1));
/// ```
pub fn can_remove_member(
    acting_role: impl Into<Role>,
    acting_user_id: Uuid,
    target_role: impl Into<Role>,
    target_user_id: Uuid,
    active_owner_count: usize,
) -> bool {
    let acting_role = acting_role.into();
    let target_role = target_role.into();

    if !can_manage_members(acting_role) {
        return false;
    }

    if acting_user_id == target_user_id {
        return false;
    }

    match acting_role {
        Role::Admin => matches!(target_role, Role::Member | Role::Viewer),
        Role::Owner => !(target_role == Role::Owner && active_owner_count <= 1),
        Role::Member | Role::Viewer => false,
    }
}

/// Check whether the acting role may invite a user with `invited_role`.
///
/// Owners may invite any role. Admins may invite members and viewers.
///
/// ```
/// use tenancy_rbac::{can_invite_role, Role};
///
/// assert!(can_invite_role(Role::Owner, Role::Owner));
/// assert!(can_invite_role("admin", "viewer"));
/// assert!(!can_invite_role(Role::Admin, Role::Admin));
/// ```
pub fn can_invite_role(acting_role: impl Into<Role>, invited_role: impl Into<Role>) -> bool {
    let acting_role = acting_role.into();
    let invited_role = invited_role.into();

    match acting_role {
        Role::Owner => true,
        Role::Admin => matches!(invited_role, Role::Member | Role::Viewer),
        Role::Member | Role::Viewer => false,
    }
}
