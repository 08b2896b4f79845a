//! # Tenancy Authentication
//!
//! This crate tracks the authenticated identity for the tenancy crates.
//!
//! ## Overview
//!
//! The tenancy-auth crate handles:
//! - **Identities and sessions**: Records returned by the identity provider
//! - **Provider abstraction**: The `IdentityProvider` trait for hosted auth services
//! - **Session manager**: Lifecycle state machine with change notifications
//! - **In-memory provider**: Reference provider for tests and single-process apps
//!
//! ## Features
//!
//! - `memory` (default): `MemoryIdentityProvider`
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --start--> Loading --+--> Authenticated
//!                                    +--> Unauthenticated
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenancy_auth::{Credentials, MemoryIdentityProvider, SessionManager};
//!
//! async fn example() {
//!     let provider = Arc::new(MemoryIdentityProvider::new());
//!     let sessions = Arc::new(SessionManager::new(provider));
//!
//!     sessions.start().await.unwrap();
//!     let _listener = sessions.listen();
//!
//!     sessions
//!         .sign_up(&Credentials::new("ada@example.com", "secret"))
//!         .await
//!         .unwrap();
//!     assert!(sessions.current_identity().await.is_some());
//! }
//! ```

pub mod error;
pub mod identity;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
pub mod session;

// Re-export main types
pub use error::{AuthError, AuthResult};
pub use identity::{Credentials, Identity, Session};
pub use provider::{AuthChange, AuthChangeKind, IdentityProvider};
pub use session::{
    SessionEvent, SessionEventKind, SessionManager, SessionSnapshot, SessionState,
    SessionSubscription,
};

#[cfg(feature = "memory")]
pub use memory::{MemoryIdentityProvider, MemoryProviderConfig};
