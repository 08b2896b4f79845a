//! Context manager configuration.

use serde::{Deserialize, Serialize};

use crate::organization::PlanType;

/// Configuration for [`OrganizationContextManager`](crate::OrganizationContextManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many times creation tries to write the owner membership before
    /// rolling the organization back. At least one attempt is always made.
    pub membership_insert_attempts: u32,

    /// Plan recorded on newly created organizations.
    pub default_plan: PlanType,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            membership_insert_attempts: 2,
            default_plan: PlanType::Free,
        }
    }
}

impl ContextConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TENANCY_MEMBERSHIP_INSERT_ATTEMPTS`: Owner membership write attempts (default: 2)
    /// - `TENANCY_DEFAULT_PLAN`: Plan for new organizations (default: free)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            membership_insert_attempts: std::env::var("TENANCY_MEMBERSHIP_INSERT_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.membership_insert_attempts),
            default_plan: std::env::var("TENANCY_DEFAULT_PLAN")
                .ok()
                .and_then(|s| PlanType::parse(&s))
                .unwrap_or(default.default_plan),
        }
    }

    /// Set the number of membership insert attempts.
    pub fn with_membership_insert_attempts(mut self, attempts: u32) -> Self {
        self.membership_insert_attempts = attempts;
        self
    }

    /// Attempts to make, never fewer than one.
    pub(crate) fn insert_attempts(&self) -> u32 {
        self.membership_insert_attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContextConfig::default();
        assert_eq!(config.membership_insert_attempts, 2);
        assert_eq!(config.default_plan, PlanType::Free);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let config = ContextConfig::default().with_membership_insert_attempts(0);
        assert_eq!(config.insert_attempts(), 1);
    }
}
