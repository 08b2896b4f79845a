//! Readiness signal.
//!
//! The presentation layer renders from a single value that folds the session
//! state and the organization context state together.

use serde::{Deserialize, Serialize};
use tenancy_auth::SessionState;
use tenancy_org::ContextState;

/// Application readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// Session or organization context still settling
    #[default]
    Loading,
    /// Nobody is signed in
    Unauthenticated,
    /// Signed in without an active organization membership
    AuthenticatedNoOrg,
    /// Signed in with an organization selected
    AuthenticatedWithOrg,
}

impl Readiness {
    /// Fold session and context state into a readiness value.
    pub fn reduce(session: SessionState, context: ContextState) -> Self {
        match (session, context) {
            (SessionState::Uninitialized | SessionState::Loading, _) => Readiness::Loading,
            (SessionState::Unauthenticated, _) => Readiness::Unauthenticated,
            (SessionState::Authenticated, ContextState::Init | ContextState::Loading) => {
                Readiness::Loading
            }
            (SessionState::Authenticated, ContextState::NoOrg) => Readiness::AuthenticatedNoOrg,
            (SessionState::Authenticated, ContextState::HasOrg) => Readiness::AuthenticatedWithOrg,
        }
    }

    /// Check if an identity is signed in and its context settled.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            Readiness::AuthenticatedNoOrg | Readiness::AuthenticatedWithOrg
        )
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Loading => "loading",
            Readiness::Unauthenticated => "unauthenticated",
            Readiness::AuthenticatedNoOrg => "authenticated_no_org",
            Readiness::AuthenticatedWithOrg => "authenticated_with_org",
        }
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT_STATES: [ContextState; 4] = [
        ContextState::Init,
        ContextState::Loading,
        ContextState::NoOrg,
        ContextState::HasOrg,
    ];

    #[test]
    fn test_unsettled_session_is_loading() {
        for context in CONTEXT_STATES {
            assert_eq!(
                Readiness::reduce(SessionState::Uninitialized, context),
                Readiness::Loading
            );
            assert_eq!(
                Readiness::reduce(SessionState::Loading, context),
                Readiness::Loading
            );
        }
    }

    #[test]
    fn test_signed_out_ignores_context() {
        for context in CONTEXT_STATES {
            assert_eq!(
                Readiness::reduce(SessionState::Unauthenticated, context),
                Readiness::Unauthenticated
            );
        }
    }

    #[test]
    fn test_authenticated_follows_context() {
        let s = SessionState::Authenticated;
        assert_eq!(Readiness::reduce(s, ContextState::Init), Readiness::Loading);
        assert_eq!(Readiness::reduce(s, ContextState::Loading), Readiness::Loading);
        assert_eq!(
            Readiness::reduce(s, ContextState::NoOrg),
            Readiness::AuthenticatedNoOrg
        );
        assert_eq!(
            Readiness::reduce(s, ContextState::HasOrg),
            Readiness::AuthenticatedWithOrg
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Readiness::AuthenticatedNoOrg.to_string(),
            "authenticated_no_org"
        );
        assert!(!Readiness::Loading.is_authenticated());
    }
}
