//! Organization context manager
//!
//! This module tracks which organization the signed-in identity is working
//! in. It owns three disjoint slots of state:
//!
//! - the context slot: identity, lifecycle state, current organization, role
//!   and the visible organization list
//! - the profile slot: the identity's [`UserProfile`]
//! - the switch lock: serializes organization switches
//!
//! ```text
//! Init --resolve--> Loading --+--> NoOrg
//!                             +--> HasOrg
//! ```
//!
//! Each resolution pass takes a number from a monotonically increasing
//! generation counter. A pass only commits if no newer pass (or `clear`)
//! started while it was loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tenancy_auth::Identity;
use tenancy_rbac::{can_invite_role, can_manage_members, can_remove_member, Role};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ContextConfig;
use crate::error::{OrgError, OrgResult, StoreError};
use crate::membership::{MembershipStatus, OrganizationMembership};
use crate::organization::{validate_slug, Organization};
use crate::profile::UserProfile;
use crate::store::OrganizationStore;

/// Organization context lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// No resolution has run for the current identity
    #[default]
    Init,
    /// Active memberships are being loaded
    Loading,
    /// The identity has no active membership
    NoOrg,
    /// An organization is selected
    HasOrg,
}

impl ContextState {
    /// Check if the state is settled (`NoOrg` or `HasOrg`).
    pub fn is_settled(&self) -> bool {
        matches!(self, ContextState::NoOrg | ContextState::HasOrg)
    }
}

/// Derived view of the identity's organization context.
#[derive(Debug, Clone, Default)]
pub struct CurrentContext {
    /// Identity the context belongs to
    pub identity: Option<Identity>,
    /// Selected organization
    pub organization: Option<Organization>,
    /// Identity's role in the selected organization
    pub role: Option<Role>,
    /// Organizations with an active membership, earliest joined first
    pub organizations: Vec<Organization>,
}

/// One row of an organization's member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberEntry {
    /// The membership
    pub membership: OrganizationMembership,
    /// The member's profile, `None` when it could not be resolved
    pub profile: Option<UserProfile>,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The pass committed and left the manager in this state
    Committed(ContextState),
    /// A newer pass started first; this pass's result was dropped
    Discarded,
}

#[derive(Debug, Default)]
struct ContextSlot {
    state: ContextState,
    identity: Option<Identity>,
    organization: Option<Organization>,
    role: Option<Role>,
    organizations: Vec<Organization>,
    resolved_at: Option<DateTime<Utc>>,
}

impl ContextSlot {
    fn identity_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.id)
    }

    fn select(&mut self, organization: Organization, role: Role) {
        match self.organizations.iter_mut().find(|o| o.id == organization.id) {
            Some(existing) => *existing = organization.clone(),
            None => self.organizations.push(organization.clone()),
        }
        self.organization = Some(organization);
        self.role = Some(role);
        self.state = ContextState::HasOrg;
    }
}

/// Organization context manager.
///
/// One manager serves one session at a time: it is created at session start,
/// pointed at an identity with [`resolve`](Self::resolve), and torn down with
/// [`clear`](Self::clear) at sign-out.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tenancy_auth::Identity;
/// use tenancy_org::{ContextConfig, MemoryOrganizationStore, OrganizationContextManager};
///
/// async fn example() {
///     let store = Arc::new(MemoryOrganizationStore::new());
///     let manager = OrganizationContextManager::new(store, ContextConfig::default());
///
///     manager.resolve(Some(Identity::new("ada@example.com"))).await.unwrap();
///     let org = manager.create_organization("Acme", "acme").await.unwrap();
///     assert_eq!(manager.current_context().await.organization, Some(org));
/// }
/// ```
pub struct OrganizationContextManager {
    store: Arc<dyn OrganizationStore>,
    config: ContextConfig,
    context: RwLock<ContextSlot>,
    profile: RwLock<Option<UserProfile>>,
    generation: AtomicU64,
    switch_lock: Mutex<()>,
    state_tx: watch::Sender<ContextState>,
}

impl std::fmt::Debug for OrganizationContextManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganizationContextManager")
            .field("config", &self.config)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl OrganizationContextManager {
    /// Create a manager in the `Init` state.
    pub fn new(store: Arc<dyn OrganizationStore>, config: ContextConfig) -> Self {
        let (state_tx, _) = watch::channel(ContextState::Init);
        Self {
            store,
            config,
            context: RwLock::new(ContextSlot::default()),
            profile: RwLock::new(None),
            generation: AtomicU64::new(0),
            switch_lock: Mutex::new(()),
            state_tx,
        }
    }

    /// Get a reference to the store.
    pub fn store(&self) -> &Arc<dyn OrganizationStore> {
        &self.store
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ContextState {
        self.context.read().await.state
    }

    /// Identity the context is resolved for.
    pub async fn identity(&self) -> Option<Identity> {
        self.context.read().await.identity.clone()
    }

    /// Snapshot of the current context.
    pub async fn current_context(&self) -> CurrentContext {
        let slot = self.context.read().await;
        CurrentContext {
            identity: slot.identity.clone(),
            organization: slot.organization.clone(),
            role: slot.role,
            organizations: slot.organizations.clone(),
        }
    }

    /// When the last resolution pass committed.
    pub async fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.context.read().await.resolved_at
    }

    /// Last profile loaded by [`refresh_user_profile`](Self::refresh_user_profile).
    pub async fn profile(&self) -> Option<UserProfile> {
        self.profile.read().await.clone()
    }

    /// Watch lifecycle state changes.
    pub fn subscribe(&self) -> watch::Receiver<ContextState> {
        self.state_tx.subscribe()
    }

    /// Resolve the organization context for `identity`.
    ///
    /// Loads the identity's active memberships and selects:
    /// - nothing when there are none (`NoOrg`)
    /// - the only one when there is exactly one
    /// - otherwise the currently selected organization if it is still
    ///   visible, else the earliest joined
    ///
    /// Passing `None` resets the manager to `Init`.
    #[instrument(skip(self, identity), fields(user_id = ?identity.as_ref().map(|i| i.id)))]
    pub async fn resolve(&self, identity: Option<Identity>) -> OrgResult<ResolveOutcome> {
        let generation = self.next_generation();

        let Some(identity) = identity else {
            return Ok(self.reset(generation).await);
        };

        let fallback = {
            let mut slot = self.context.write().await;
            if !self.is_current(generation) {
                return Ok(ResolveOutcome::Discarded);
            }

            let same_identity = slot.identity_id() == Some(identity.id);
            let fallback = if same_identity && slot.state.is_settled() {
                slot.state
            } else {
                ContextState::Init
            };
            if !same_identity {
                *slot = ContextSlot::default();
                *self.profile.write().await = None;
            }
            slot.identity = Some(identity.clone());
            slot.state = ContextState::Loading;
            self.publish(ContextState::Loading);
            fallback
        };

        let loaded = self.load_visible(identity.id).await;

        let mut slot = self.context.write().await;
        if !self.is_current(generation) {
            debug!(generation, "Discarding stale organization resolution");
            return Ok(ResolveOutcome::Discarded);
        }

        let visible = match loaded {
            Ok(visible) => visible,
            Err(e) => {
                warn!(error = %e, "Organization resolution failed");
                slot.state = fallback;
                self.publish(fallback);
                return Err(e);
            }
        };

        let retained = slot
            .organization
            .as_ref()
            .and_then(|current| visible.iter().position(|(_, org)| org.id == current.id));
        let selected = retained.or(if visible.is_empty() { None } else { Some(0) });

        slot.organizations = visible.iter().map(|(_, org)| org.clone()).collect();
        match selected {
            Some(index) => {
                let (membership, organization) = &visible[index];
                slot.organization = Some(organization.clone());
                slot.role = Some(membership.role);
                slot.state = ContextState::HasOrg;
            }
            None => {
                slot.organization = None;
                slot.role = None;
                slot.state = ContextState::NoOrg;
            }
        }
        slot.resolved_at = Some(Utc::now());
        self.publish(slot.state);

        info!(
            generation,
            visible = slot.organizations.len(),
            organization_id = ?slot.organization.as_ref().map(|o| o.id),
            "Organization context resolved"
        );

        Ok(ResolveOutcome::Committed(slot.state))
    }

    /// Tear the context down (sign-out) and drop any in-flight resolution.
    pub async fn clear(&self) {
        let generation = self.next_generation();
        self.reset(generation).await;
        debug!(generation, "Organization context cleared");
    }

    /// Create an organization owned by the current identity and select it.
    ///
    /// The organization row and the owner membership are written as a unit:
    /// if the membership cannot be written after the configured attempts, the
    /// organization row is deleted before the error is returned.
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is blank or the slug is malformed
    /// - `Conflict` if the slug is taken
    /// - `Unauthenticated` without an identity
    #[instrument(skip(self), fields(org.slug = %slug))]
    pub async fn create_organization(&self, name: &str, slug: &str) -> OrgResult<Organization> {
        let identity = self.require_identity().await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(OrgError::Validation(
                "organization name is required".to_string(),
            ));
        }
        validate_slug(slug)?;

        if self.store.find_organization_by_slug(slug).await?.is_some() {
            debug!(slug, "Slug already taken");
            return Err(slug_taken(slug));
        }

        let organization = Organization::new(name, slug).with_plan(self.config.default_plan);
        self.store
            .insert_organization(&organization)
            .await
            .map_err(|e| if e.is_conflict() { slug_taken(slug) } else { e.into() })?;

        let membership = OrganizationMembership::owner(organization.id, identity.id);
        if let Err(e) = self.insert_owner_membership(&membership).await {
            self.roll_back_organization(&organization).await;
            return Err(e);
        }

        info!(
            organization_id = %organization.id,
            owner_id = %identity.id,
            "Organization created"
        );

        let mut slot = self.context.write().await;
        if slot.identity_id() == Some(identity.id) {
            slot.select(organization.clone(), Role::Owner);
            self.publish(ContextState::HasOrg);
        } else {
            debug!("Identity changed during creation, context left untouched");
        }

        Ok(organization)
    }

    /// Make `organization_id` the current organization.
    ///
    /// Only one switch runs at a time; a call that overlaps one in flight
    /// fails with `Busy` and changes nothing.
    ///
    /// # Errors
    ///
    /// - `Busy` if another switch is in flight
    /// - `Forbidden` without an active membership in the organization
    /// - `NotFound` if the organization row is gone
    /// - `Superseded` if the identity changed before the switch committed
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn switch_to_organization(&self, organization_id: Uuid) -> OrgResult<Organization> {
        let _in_flight = self.switch_lock.try_lock().map_err(|_| {
            debug!("Rejecting overlapping organization switch");
            OrgError::Busy
        })?;

        let identity = self.require_identity().await?;
        let membership = self
            .require_active_membership(organization_id, identity.id)
            .await?;
        let organization = self
            .store
            .get_organization(organization_id)
            .await?
            .ok_or_else(|| OrgError::organization_not_found(organization_id))?;

        let mut slot = self.context.write().await;
        if slot.identity_id() != Some(identity.id) {
            return Err(OrgError::Superseded);
        }
        slot.select(organization.clone(), membership.role);
        self.publish(ContextState::HasOrg);

        info!(role = %membership.role, "Switched organization");
        Ok(organization)
    }

    /// Organizations where the identity holds an active membership, earliest
    /// joined first.
    #[instrument(skip(self))]
    pub async fn get_user_organizations(&self) -> OrgResult<Vec<Organization>> {
        let identity = self.require_identity().await?;
        Ok(self
            .load_visible(identity.id)
            .await?
            .into_iter()
            .map(|(_, org)| org)
            .collect())
    }

    /// Members of an organization with their profiles, earliest joined first.
    ///
    /// Suspended memberships are left out. A member whose profile is missing
    /// or unreadable is returned with `profile: None`.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn get_organization_members(
        &self,
        organization_id: Uuid,
    ) -> OrgResult<Vec<MemberEntry>> {
        let identity = self.require_identity().await?;
        self.require_active_membership(organization_id, identity.id)
            .await?;

        let mut memberships: Vec<OrganizationMembership> = self
            .store
            .list_memberships_for_organization(organization_id)
            .await?
            .into_iter()
            .filter(|m| m.status != MembershipStatus::Suspended)
            .collect();
        memberships.sort_by(|a, b| a.cmp_join_order(b));

        let mut entries = Vec::with_capacity(memberships.len());
        for membership in memberships {
            let profile = match self.store.get_profile(membership.user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(user_id = %membership.user_id, error = %e, "Member profile unreadable");
                    None
                }
            };
            entries.push(MemberEntry {
                membership,
                profile,
            });
        }

        Ok(entries)
    }

    /// Re-fetch the identity's profile, creating a minimal one if absent.
    ///
    /// Returns `None` without an identity.
    #[instrument(skip(self))]
    pub async fn refresh_user_profile(&self) -> OrgResult<Option<UserProfile>> {
        let Some(identity) = self.identity().await else {
            return Ok(None);
        };

        let profile = match self.store.get_profile(identity.id).await? {
            Some(profile) => profile,
            None => {
                let profile = UserProfile::minimal(&identity);
                match self.store.insert_profile(&profile).await {
                    Ok(()) => {
                        info!(user_id = %identity.id, "Created user profile");
                        profile
                    }
                    // created concurrently
                    Err(e) if e.is_conflict() => self
                        .store
                        .get_profile(identity.id)
                        .await?
                        .unwrap_or(profile),
                    Err(e) => return Err(e.into()),
                }
            }
        };

        if self.context.read().await.identity_id() == Some(identity.id) {
            *self.profile.write().await = Some(profile.clone());
        }

        Ok(Some(profile))
    }

    /// The identity's role in an organization, if it holds an active
    /// membership there.
    pub async fn get_current_user_role(&self, organization_id: Uuid) -> OrgResult<Option<Role>> {
        let Some(identity) = self.identity().await else {
            return Ok(None);
        };

        Ok(self
            .store
            .get_membership(organization_id, identity.id)
            .await?
            .filter(|m| m.is_active())
            .map(|m| m.role))
    }

    /// Invite a user into an organization.
    ///
    /// Requires a role that can manage members; admins may only invite
    /// members and viewers. A suspended membership is turned back into an
    /// invitation.
    #[instrument(skip(self), fields(organization_id = %organization_id, role = %role))]
    pub async fn invite_member(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        role: Role,
    ) -> OrgResult<OrganizationMembership> {
        let identity = self.require_identity().await?;
        let acting = self
            .require_active_membership(organization_id, identity.id)
            .await?;

        if !can_manage_members(acting.role) {
            return Err(OrgError::forbidden("role cannot manage members"));
        }
        if !can_invite_role(acting.role, role) {
            return Err(OrgError::forbidden(format!(
                "{} cannot invite {}",
                acting.role, role
            )));
        }

        let membership = match self.store.get_membership(organization_id, user_id).await? {
            Some(mut existing) if existing.status == MembershipStatus::Suspended => {
                existing.reinvite(role, identity.id);
                self.store.update_membership(&existing).await?;
                existing
            }
            Some(_) => {
                return Err(OrgError::Conflict(
                    "user already belongs to this organization".to_string(),
                ))
            }
            None => {
                let membership =
                    OrganizationMembership::invited(organization_id, user_id, role, identity.id);
                self.store
                    .insert_membership(&membership)
                    .await
                    .map_err(membership_conflict)?;
                membership
            }
        };

        info!(invited_user_id = %user_id, "Member invited");
        Ok(membership)
    }

    /// Accept the identity's pending invitation to an organization.
    ///
    /// The organization becomes visible and the context is re-resolved.
    #[instrument(skip(self), fields(organization_id = %organization_id))]
    pub async fn accept_invitation(
        &self,
        organization_id: Uuid,
    ) -> OrgResult<OrganizationMembership> {
        let identity = self.require_identity().await?;
        let mut membership = self
            .store
            .get_membership(organization_id, identity.id)
            .await?
            .filter(|m| m.status == MembershipStatus::Invited)
            .ok_or_else(|| OrgError::membership_not_found(organization_id))?;

        membership.activate();
        self.store.update_membership(&membership).await?;
        info!(user_id = %identity.id, "Invitation accepted");

        self.resolve(Some(identity)).await?;
        Ok(membership)
    }

    /// Remove a member by suspending their membership.
    ///
    /// The decision is made by [`can_remove_member`] with the organization's
    /// live active-owner count.
    #[instrument(skip(self), fields(organization_id = %organization_id, target_user_id = %target_user_id))]
    pub async fn remove_member(
        &self,
        organization_id: Uuid,
        target_user_id: Uuid,
    ) -> OrgResult<OrganizationMembership> {
        let identity = self.require_identity().await?;
        let acting = self
            .require_active_membership(organization_id, identity.id)
            .await?;

        let mut target = self
            .store
            .get_membership(organization_id, target_user_id)
            .await?
            .filter(|m| m.status != MembershipStatus::Suspended)
            .ok_or_else(|| OrgError::membership_not_found(target_user_id))?;

        let mut owners = self.store.count_active_owners(organization_id).await?;
        if !target.is_active() {
            // a pending invitation is never one of the active owners
            owners += 1;
        }
        if !can_remove_member(acting.role, identity.id, target.role, target.user_id, owners) {
            return Err(OrgError::forbidden(format!(
                "{} cannot remove this {}",
                acting.role, target.role
            )));
        }

        target.suspend();
        self.store
            .update_membership_keeping_owner(&target)
            .await
            .map_err(|e| match e {
                StoreError::LastOwner(_) => {
                    OrgError::forbidden("organization must keep an active owner")
                }
                other => other.into(),
            })?;

        info!(removed_role = %target.role, "Member removed");
        Ok(target)
    }

    async fn require_identity(&self) -> OrgResult<Identity> {
        self.identity().await.ok_or(OrgError::Unauthenticated)
    }

    async fn require_active_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> OrgResult<OrganizationMembership> {
        self.store
            .get_membership(organization_id, user_id)
            .await?
            .filter(|m| m.is_active())
            .ok_or_else(|| OrgError::forbidden("no active membership in organization"))
    }

    async fn load_visible(
        &self,
        user_id: Uuid,
    ) -> OrgResult<Vec<(OrganizationMembership, Organization)>> {
        let mut memberships: Vec<OrganizationMembership> = self
            .store
            .list_memberships_for_user(user_id)
            .await?
            .into_iter()
            .filter(|m| m.is_active())
            .collect();
        memberships.sort_by(|a, b| a.cmp_join_order(b));

        let mut visible = Vec::with_capacity(memberships.len());
        for membership in memberships {
            match self.store.get_organization(membership.organization_id).await? {
                Some(org) => visible.push((membership, org)),
                None => warn!(
                    organization_id = %membership.organization_id,
                    "Active membership references a missing organization"
                ),
            }
        }
        Ok(visible)
    }

    async fn insert_owner_membership(&self, membership: &OrganizationMembership) -> OrgResult<()> {
        let attempts = self.config.insert_attempts();
        let mut attempt = 1;
        loop {
            match self.store.insert_membership(membership).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_conflict() && attempt < attempts => {
                    warn!(attempt, error = %e, "Owner membership insert failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(membership_conflict(e)),
            }
        }
    }

    async fn roll_back_organization(&self, organization: &Organization) {
        for attempt in 1..=self.config.insert_attempts() {
            match self.store.delete_organization(organization.id).await {
                Ok(()) => {
                    warn!(
                        organization_id = %organization.id,
                        "Rolled back organization without owner membership"
                    );
                    return;
                }
                Err(e) => warn!(attempt, error = %e, "Organization rollback failed"),
            }
        }
        error!(
            organization_id = %organization.id,
            "Organization left without owner membership"
        );
    }

    async fn reset(&self, generation: u64) -> ResolveOutcome {
        {
            let mut slot = self.context.write().await;
            if !self.is_current(generation) {
                return ResolveOutcome::Discarded;
            }
            *slot = ContextSlot::default();
            self.publish(ContextState::Init);
        }
        *self.profile.write().await = None;
        ResolveOutcome::Committed(ContextState::Init)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn publish(&self, state: ContextState) {
        self.state_tx.send_replace(state);
    }
}

fn slug_taken(slug: &str) -> OrgError {
    OrgError::Conflict(format!("slug {slug} is already taken"))
}

fn membership_conflict(e: StoreError) -> OrgError {
    if e.is_conflict() {
        OrgError::Conflict("membership already exists".to_string())
    } else {
        e.into()
    }
}
