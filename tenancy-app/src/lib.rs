//! # Tenancy App
//!
//! Composition root for the tenancy crates: owns the session manager and the
//! organization context manager, and publishes a single readiness signal the
//! presentation layer renders from.
//!
//! ## Readiness
//!
//! | session | organization context | readiness |
//! |---|---|---|
//! | uninitialized, loading | any | `Loading` |
//! | unauthenticated | any | `Unauthenticated` |
//! | authenticated | init, loading | `Loading` |
//! | authenticated | no_org | `AuthenticatedNoOrg` |
//! | authenticated | has_org | `AuthenticatedWithOrg` |
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenancy_app::{AppConfig, CompositionRoot, NoopNavigator, Readiness};
//! use tenancy_auth::{Credentials, MemoryIdentityProvider};
//! use tenancy_org::MemoryOrganizationStore;
//!
//! # async fn example() -> tenancy_app::AppResult<()> {
//! let root = Arc::new(CompositionRoot::new(
//!     Arc::new(MemoryIdentityProvider::new()),
//!     Arc::new(MemoryOrganizationStore::new()),
//!     Arc::new(NoopNavigator),
//!     AppConfig::from_env(),
//! )?);
//!
//! root.start().await?;
//! let _tasks = root.spawn();
//!
//! let readiness = root.sign_up(&Credentials::new("ada@example.com", "secret")).await?;
//! if readiness == Readiness::AuthenticatedNoOrg {
//!     root.create_organization("Acme", "acme").await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `memory`: In-memory collaborators (enabled by default)

pub mod config;
pub mod error;
pub mod navigation;
pub mod readiness;
pub mod root;

// Re-export main types
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, AppResult};
pub use navigation::{Navigator, NoopNavigator, RecordingNavigator, Route};
pub use readiness::Readiness;
pub use root::{CompositionRoot, RootTasks};
