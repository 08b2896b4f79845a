//! Organization domain models
//!
//! This module provides the Organization entity, the top-level tenant that
//! memberships attach to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{OrgError, OrgResult};

/// Minimum slug length.
pub const MIN_SLUG_LEN: usize = 3;

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 48;

/// Subscription plan recorded on an organization.
///
/// The plan is stored and displayed only; nothing in this crate gates
/// behavior on it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    /// Free plan
    #[default]
    Free,
    /// Small-team plan
    Starter,
    /// Paid professional plan
    Pro,
    /// Enterprise contract
    Enterprise,
}

impl PlanType {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

/// An organization represents a tenant in the multi-tenant system.
///
/// Users can belong to several organizations, each through one
/// [`OrganizationMembership`](crate::OrganizationMembership).
///
/// # Examples
///
/// ```
/// use tenancy_org::{Organization, PlanType};
///
/// let org = Organization::new("Acme Corp", "acme-corp");
/// assert_eq!(org.slug, "acme-corp");
/// assert_eq!(org.plan_type, PlanType::Free);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Unique identifier for the organization
    pub id: Uuid,

    /// Human-readable name
    pub name: String,

    /// URL-friendly slug (unique across all organizations)
    pub slug: String,

    /// Email/web domain claimed by the organization
    #[serde(default)]
    pub domain: Option<String>,

    /// Recorded subscription plan
    #[serde(default)]
    pub plan_type: PlanType,

    /// Open key-value settings
    #[serde(default, deserialize_with = "crate::rows::null_as_default")]
    pub settings: HashMap<String, serde_json::Value>,

    /// When the organization was created
    pub created_at: DateTime<Utc>,

    /// When the organization was last updated
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Creates a new organization on the free plan with empty settings.
    ///
    /// The slug is stored as given; call [`validate_slug`] first.
    pub fn new(name: impl Into<String>, slug: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            slug: slug.into(),
            domain: None,
            plan_type: PlanType::Free,
            settings: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the recorded plan.
    pub fn with_plan(mut self, plan_type: PlanType) -> Self {
        self.plan_type = plan_type;
        self
    }

    /// Set the organization's domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Read a setting.
    pub fn setting(&self, key: &str) -> Option<&serde_json::Value> {
        self.settings.get(key)
    }

    /// Write a setting and bump `updated_at`.
    pub fn set_setting(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.settings.insert(key.into(), value);
        self.updated_at = Utc::now();
    }
}

/// Check a slug against the naming rules.
///
/// Slugs are 3 to 48 characters of lowercase ASCII letters, digits and single
/// hyphens, and may not start or end with a hyphen.
///
/// ```
/// use tenancy_org::organization::validate_slug;
///
/// assert!(validate_slug("acme").is_ok());
/// assert!(validate_slug("acme-corp-2").is_ok());
/// assert!(validate_slug("Acme").is_err());
/// assert!(validate_slug("-acme").is_err());
/// assert!(validate_slug("ac").is_err());
/// ```
pub fn validate_slug(slug: &str) -> OrgResult<()> {
    let len = slug.chars().count();
    if !(MIN_SLUG_LEN..=MAX_SLUG_LEN).contains(&len) {
        return Err(OrgError::Validation(format!(
            "slug must be {MIN_SLUG_LEN}-{MAX_SLUG_LEN} characters"
        )));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(OrgError::Validation(
            "slug may only contain lowercase letters, digits and hyphens".to_string(),
        ));
    }

    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(OrgError::Validation(
            "slug hyphens must separate words".to_string(),
        ));
    }

    Ok(())
}
