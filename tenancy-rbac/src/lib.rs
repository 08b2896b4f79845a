//! # Tenancy RBAC (Role-Based Access Control)
//!
//! This crate provides the role hierarchy and the membership-management
//! policy shared by the tenancy crates.
//!
//! ## Overview
//!
//! The tenancy-rbac crate handles:
//! - **Roles**: The single role a user holds in an organization
//! - **Policy**: Pure checks deciding who may manage, invite and remove members
//!
//! ## Architecture
//!
//! ```text
//! Owner > Admin > Member > Viewer
//!
//! can_manage_members   owner, admin
//! can_invite_role      owner: any role, admin: member/viewer
//! can_remove_member    owner: anyone but the last owner, admin: member/viewer
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use tenancy_rbac::{can_manage_members, can_remove_member, Role};
//! use uuid::Uuid;
//!
//! let acting = Uuid::now_v7();
//! let target = Uuid::now_v7();
//!
//! assert!(can_manage_members(Role::Admin));
//! assert!(can_remove_member(Role::Admin, acting, Role::Viewer, target, 1));
//!
//! // Unknown role strings are treated as the lowest privilege
//! assert!(!can_manage_members("superuser"));
//! ```
//!
//! ## Integration with tenancy-org
//!
//! The organization context manager resolves the acting user's role and the
//! organization's active owner count from storage, then calls these checks
//! before touching any membership.

pub mod policy;
pub mod roles;

// Re-export main types for convenience
pub use policy::{can_invite_role, can_manage_members, can_remove_member};
pub use roles::Role;
