//! Storage collaborator trait.
//!
//! The store persists organizations, memberships and profiles. It is assumed
//! to enforce row-level authorization on its own; the context manager only
//! relies on it for uniqueness:
//!
//! - organization slugs are unique
//! - `(organization_id, user_id)` identifies at most one membership
//! - a profile ID exists at most once
//!
//! Violations are reported as [`StoreError::Conflict`](crate::StoreError).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::membership::OrganizationMembership;
use crate::organization::Organization;
use crate::profile::UserProfile;

/// Row-oriented storage for organizations, memberships and profiles.
///
/// # Example
///
/// ```rust,ignore
/// use tenancy_org::{OrganizationStore, Organization, StoreResult};
/// use async_trait::async_trait;
///
/// struct PgStore { pool: PgPool }
///
/// #[async_trait]
/// impl OrganizationStore for PgStore {
///     async fn insert_organization(&self, org: &Organization) -> StoreResult<()> {
///         let row = tenancy_org::rows::encode(org)?;
///         self.pool.insert("organizations", row).await
///     }
///     // ...
/// }
/// ```
#[async_trait]
pub trait OrganizationStore: Send + Sync {
    /// Insert a new organization.
    async fn insert_organization(&self, org: &Organization) -> StoreResult<()>;

    /// Get an organization by ID.
    async fn get_organization(&self, id: Uuid) -> StoreResult<Option<Organization>>;

    /// Find an organization by slug.
    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>>;

    /// Delete an organization row.
    ///
    /// Only used to roll back a creation whose owner membership could not be
    /// written.
    async fn delete_organization(&self, id: Uuid) -> StoreResult<()>;

    /// Insert a new membership.
    async fn insert_membership(&self, membership: &OrganizationMembership) -> StoreResult<()>;

    /// Replace an existing membership.
    async fn update_membership(&self, membership: &OrganizationMembership) -> StoreResult<()>;

    /// Replace an existing membership unless that leaves its organization
    /// without an active owner.
    ///
    /// The owner check and the write must be atomic: of two concurrent calls
    /// demoting an organization's last two owners, one fails with
    /// [`StoreError::LastOwner`](crate::StoreError::LastOwner).
    async fn update_membership_keeping_owner(
        &self,
        membership: &OrganizationMembership,
    ) -> StoreResult<()>;

    /// Get the membership for `(organization_id, user_id)`.
    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<OrganizationMembership>>;

    /// List every membership a user holds, in any status.
    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<OrganizationMembership>>;

    /// List every membership of an organization, in any status.
    async fn list_memberships_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<OrganizationMembership>>;

    /// Get a user's profile.
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;

    /// Insert a new profile.
    async fn insert_profile(&self, profile: &UserProfile) -> StoreResult<()>;

    /// Count the active owners of an organization.
    async fn count_active_owners(&self, organization_id: Uuid) -> StoreResult<usize> {
        Ok(self
            .list_memberships_for_organization(organization_id)
            .await?
            .iter()
            .filter(|m| m.is_active_owner())
            .count())
    }
}
