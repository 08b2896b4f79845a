//! # Tenancy Organization Context
//!
//! Multi-tenant organization membership for a signed-in identity.
//!
//! ## Overview
//!
//! The tenancy-org crate handles:
//! - **Organizations**: Tenant records identified by a unique slug
//! - **Memberships**: User-organization links with a role and a status
//! - **Profiles**: Per-user display data, created lazily
//! - **Context**: Which organization the identity is currently working in
//! - **Storage**: The collaborator trait and an in-memory implementation
//!
//! ## Architecture
//!
//! ```text
//! Identity
//!   ├─ UserProfile
//!   └─ OrganizationMembership (active | invited | suspended) ─→ Organization
//!
//! OrganizationContextManager
//!   ├─ resolve / clear           (driven by the session)
//!   ├─ create / switch           (driven by the user)
//!   └─ OrganizationStore         (rows decoded at the boundary)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenancy_auth::Identity;
//! use tenancy_org::{ContextConfig, ContextState, MemoryOrganizationStore, OrganizationContextManager};
//!
//! # async fn example() -> tenancy_org::OrgResult<()> {
//! let store = Arc::new(MemoryOrganizationStore::new());
//! let manager = OrganizationContextManager::new(store, ContextConfig::from_env());
//!
//! manager.resolve(Some(Identity::new("ada@example.com"))).await?;
//! if manager.state().await == ContextState::NoOrg {
//!     manager.create_organization("Acme Corp", "acme-corp").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Serialization support (enabled by default)
//! - `memory`: In-memory store (enabled by default)

pub mod config;
pub mod context;
pub mod error;
pub mod membership;
#[cfg(feature = "memory")]
pub mod memory;
pub mod organization;
pub mod profile;
pub mod rows;
pub mod store;

// Re-export main types for convenience
pub use config::ContextConfig;
pub use context::{
    ContextState, CurrentContext, MemberEntry, OrganizationContextManager, ResolveOutcome,
};
pub use error::{OrgError, OrgResult, StoreError, StoreResult};
pub use membership::{MembershipStatus, OrganizationMembership};
#[cfg(feature = "memory")]
pub use memory::MemoryOrganizationStore;
pub use organization::{validate_slug, Organization, PlanType};
pub use profile::UserProfile;
pub use store::OrganizationStore;
