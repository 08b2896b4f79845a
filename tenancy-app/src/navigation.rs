//! Navigation collaborator.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Destinations the composition root can send the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Sign-in screen, after sign-out
    SignIn,
    /// Organization creation, for identities without a membership
    OrganizationSetup,
}

/// Presentation layer hook.
pub trait Navigator: Send + Sync {
    /// Navigate to `route`.
    fn navigate(&self, route: Route);
}

/// Navigator that ignores every route.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: Route) {}
}

/// Navigator that records routes, for tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes navigated to so far, oldest first.
    pub fn routes(&self) -> Vec<Route> {
        self.routes
            .lock()
            .map(|routes| routes.clone())
            .unwrap_or_default()
    }

    /// Most recent route.
    pub fn last(&self) -> Option<Route> {
        self.routes().last().copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_navigator() {
        let navigator = RecordingNavigator::new();
        assert!(navigator.last().is_none());

        navigator.navigate(Route::OrganizationSetup);
        navigator.navigate(Route::SignIn);

        assert_eq!(
            navigator.routes(),
            vec![Route::OrganizationSetup, Route::SignIn]
        );
        assert_eq!(navigator.last(), Some(Route::SignIn));
    }
}
