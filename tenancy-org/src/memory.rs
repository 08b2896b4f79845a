//! In-memory organization store.
//!
//! Keeps every entity as a raw JSON [`Row`] and decodes on the way out, the
//! same way a SQL-backed store would. Suitable for single-process
//! applications and testing; it also supports simulated latency and failure
//! injection.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::membership::OrganizationMembership;
use crate::organization::Organization;
use crate::profile::UserProfile;
use crate::rows::{decode, decode_opt, encode, Row};
use crate::store::OrganizationStore;

/// In-memory [`OrganizationStore`].
#[derive(Default)]
pub struct MemoryOrganizationStore {
    /// Organization rows keyed by ID
    organizations: RwLock<HashMap<Uuid, Row>>,
    /// Membership rows keyed by (organization_id, user_id)
    memberships: RwLock<HashMap<(Uuid, Uuid), Row>>,
    /// Profile rows keyed by user ID
    profiles: RwLock<HashMap<Uuid, Row>>,
    /// Delay applied before every call
    latency: Option<Duration>,
    /// Remaining membership inserts that should fail
    failing_membership_inserts: AtomicU32,
    /// Remaining organization deletes that should fail
    failing_organization_deletes: AtomicU32,
    /// Remaining membership listings that should fail
    failing_membership_reads: AtomicU32,
}

impl std::fmt::Debug for MemoryOrganizationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryOrganizationStore")
            .field("latency", &self.latency)
            .finish()
    }
}

impl MemoryOrganizationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next `count` membership inserts fail.
    pub fn fail_membership_inserts(&self, count: u32) {
        self.failing_membership_inserts.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` organization deletes fail.
    pub fn fail_organization_deletes(&self, count: u32) {
        self.failing_organization_deletes
            .store(count, Ordering::SeqCst);
    }

    /// Make the next `count` membership listings fail.
    pub fn fail_membership_reads(&self, count: u32) {
        self.failing_membership_reads.store(count, Ordering::SeqCst);
    }

    /// Store a raw membership row without validation.
    pub async fn insert_raw_membership(&self, organization_id: Uuid, user_id: Uuid, row: Row) {
        self.memberships
            .write()
            .await
            .insert((organization_id, user_id), row);
    }

    /// Remove a profile row.
    pub async fn remove_profile(&self, user_id: Uuid) {
        self.profiles.write().await.remove(&user_id);
    }

    /// Number of organization rows.
    pub async fn organization_count(&self) -> usize {
        self.organizations.read().await.len()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected_read_failure(&self) -> StoreResult<()> {
        if Self::take_failure(&self.failing_membership_reads) {
            return Err(StoreError::Unavailable("injected read failure".to_string()));
        }
        Ok(())
    }
}

fn missing_membership(membership: &OrganizationMembership) -> StoreError {
    StoreError::Unavailable(format!("membership {} does not exist", membership.id))
}

#[async_trait]
impl OrganizationStore for MemoryOrganizationStore {
    async fn insert_organization(&self, org: &Organization) -> StoreResult<()> {
        self.pause().await;
        let row = encode(org)?;

        let mut organizations = self.organizations.write().await;
        let slug_taken = organizations
            .values()
            .any(|existing| existing.get("slug").and_then(|v| v.as_str()) == Some(org.slug.as_str()));
        if slug_taken || organizations.contains_key(&org.id) {
            return Err(StoreError::Conflict {
                entity: "organization",
                detail: format!("slug {}", org.slug),
            });
        }

        organizations.insert(org.id, row);
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> StoreResult<Option<Organization>> {
        self.pause().await;
        let row = self.organizations.read().await.get(&id).cloned();
        decode_opt(row)
    }

    async fn find_organization_by_slug(&self, slug: &str) -> StoreResult<Option<Organization>> {
        self.pause().await;
        let row = self
            .organizations
            .read()
            .await
            .values()
            .find(|row| row.get("slug").and_then(|v| v.as_str()) == Some(slug))
            .cloned();
        decode_opt(row)
    }

    async fn delete_organization(&self, id: Uuid) -> StoreResult<()> {
        self.pause().await;
        if Self::take_failure(&self.failing_organization_deletes) {
            return Err(StoreError::Unavailable("injected delete failure".to_string()));
        }
        self.organizations.write().await.remove(&id);
        Ok(())
    }

    async fn insert_membership(&self, membership: &OrganizationMembership) -> StoreResult<()> {
        self.pause().await;
        if Self::take_failure(&self.failing_membership_inserts) {
            return Err(StoreError::Unavailable("injected insert failure".to_string()));
        }

        let row = encode(membership)?;
        let key = (membership.organization_id, membership.user_id);
        let mut memberships = self.memberships.write().await;
        if memberships.contains_key(&key) {
            return Err(StoreError::Conflict {
                entity: "membership",
                detail: format!(
                    "user {} in organization {}",
                    membership.user_id, membership.organization_id
                ),
            });
        }

        memberships.insert(key, row);
        Ok(())
    }

    async fn update_membership(&self, membership: &OrganizationMembership) -> StoreResult<()> {
        self.pause().await;
        let row = encode(membership)?;
        let key = (membership.organization_id, membership.user_id);

        match self.memberships.write().await.get_mut(&key) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(missing_membership(membership)),
        }
    }

    async fn update_membership_keeping_owner(
        &self,
        membership: &OrganizationMembership,
    ) -> StoreResult<()> {
        self.pause().await;
        let row = encode(membership)?;
        let key = (membership.organization_id, membership.user_id);

        // check and write under one lock
        let mut memberships = self.memberships.write().await;
        let current = memberships
            .get(&key)
            .cloned()
            .ok_or_else(|| missing_membership(membership))?;

        let demotes_owner = decode::<OrganizationMembership>(current)?.is_active_owner()
            && !membership.is_active_owner();
        if demotes_owner {
            let mut other_owners = 0;
            for ((org, user), other) in memberships.iter() {
                if *org != membership.organization_id || *user == membership.user_id {
                    continue;
                }
                if decode::<OrganizationMembership>(other.clone())?.is_active_owner() {
                    other_owners += 1;
                }
            }
            if other_owners == 0 {
                return Err(StoreError::LastOwner(membership.organization_id));
            }
        }

        memberships.insert(key, row);
        Ok(())
    }

    async fn get_membership(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<OrganizationMembership>> {
        self.pause().await;
        let row = self
            .memberships
            .read()
            .await
            .get(&(organization_id, user_id))
            .cloned();
        decode_opt(row)
    }

    async fn list_memberships_for_user(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Vec<OrganizationMembership>> {
        self.pause().await;
        self.injected_read_failure()?;
        let rows: Vec<Row> = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|((_, member), _)| *member == user_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.into_iter().map(decode::<OrganizationMembership>).collect()
    }

    async fn list_memberships_for_organization(
        &self,
        organization_id: Uuid,
    ) -> StoreResult<Vec<OrganizationMembership>> {
        self.pause().await;
        self.injected_read_failure()?;
        let rows: Vec<Row> = self
            .memberships
            .read()
            .await
            .iter()
            .filter(|((org, _), _)| *org == organization_id)
            .map(|(_, row)| row.clone())
            .collect();
        rows.into_iter().map(decode::<OrganizationMembership>).collect()
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>> {
        self.pause().await;
        let row = self.profiles.read().await.get(&user_id).cloned();
        decode_opt(row)
    }

    async fn insert_profile(&self, profile: &UserProfile) -> StoreResult<()> {
        self.pause().await;
        let row = encode(profile)?;

        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.id) {
            return Err(StoreError::Conflict {
                entity: "profile",
                detail: profile.id.to_string(),
            });
        }
        profiles.insert(profile.id, row);
        Ok(())
    }
}
