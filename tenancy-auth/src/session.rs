//! Identity session manager
//!
//! Tracks the current identity through the lifecycle
//! `Uninitialized -> Loading -> {Authenticated, Unauthenticated}` and
//! broadcasts a [`SessionEvent`] for every sign-in, sign-out and token refresh.
//!
//! Every event is delivered, including ones that leave the identity
//! unchanged, so subscribers always get a chance to recompute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::identity::{Credentials, Identity, Session};
use crate::provider::{AuthChange, AuthChangeKind, IdentityProvider};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// `start` has not been called
    Uninitialized,
    /// The persisted session is being read from the provider
    Loading,
    /// An identity is signed in
    Authenticated,
    /// No identity is signed in
    Unauthenticated,
}

impl SessionState {
    /// Check if the state is settled (authenticated or not).
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            SessionState::Authenticated | SessionState::Unauthenticated
        )
    }
}

/// Why a session event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// Boot finished reading the persisted session
    InitialSession,
    /// An identity signed in
    SignedIn,
    /// The identity signed out or was revoked
    SignedOut,
    /// Tokens were refreshed
    TokenRefreshed,
}

/// Notification delivered to session subscribers.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    /// What happened
    pub kind: SessionEventKind,
    /// State after the event
    pub state: SessionState,
    /// Identity after the event
    pub identity: Option<Identity>,
    /// When the event was emitted
    pub occurred_at: DateTime<Utc>,
}

/// Point-in-time view of the session manager.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Lifecycle state
    pub state: SessionState,
    /// Active session, if authenticated
    pub session: Option<Session>,
    /// Most recent provider failure, cleared by the next success
    pub last_error: Option<AuthError>,
}

impl SessionSnapshot {
    fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            session: None,
            last_error: None,
        }
    }

    /// Identity of the active session.
    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }
}

/// Subscription handle for session events.
///
/// Dropping the handle (or calling [`unsubscribe`](Self::unsubscribe)) stops
/// delivery.
pub struct SessionSubscription {
    /// Subscription ID
    pub id: Uuid,
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Receive the next event.
    ///
    /// Returns `None` once the session manager is gone. A subscriber that
    /// falls behind skips the missed events and continues with the newest.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(subscription_id = %self.id, skipped, "Session subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        debug!(subscription_id = %self.id, "Session subscription dropped");
    }
}

impl std::fmt::Debug for SessionSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSubscription")
            .field("id", &self.id)
            .finish()
    }
}

/// Identity session manager.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tenancy_auth::{Credentials, MemoryIdentityProvider, SessionManager};
///
/// async fn example() {
///     let provider = Arc::new(MemoryIdentityProvider::new());
///     let sessions = SessionManager::new(provider);
///
///     let mut events = sessions.subscribe();
///     sessions.start().await.unwrap();
///     sessions
///         .sign_in(&Credentials::new("ada@example.com", "secret"))
///         .await
///         .unwrap();
///
///     while let Some(event) = events.recv().await {
///         println!("{:?} -> {:?}", event.kind, event.state);
///     }
/// }
/// ```
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    snapshot: RwLock<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl SessionManager {
    /// Create a session manager over `provider`.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_capacity(provider, 64)
    }

    /// Create with a custom event channel capacity.
    pub fn with_capacity(provider: Arc<dyn IdentityProvider>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            provider,
            snapshot: RwLock::new(SessionSnapshot::new()),
            events,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            id: Uuid::now_v7(),
            receiver: self.events.subscribe(),
        }
    }

    /// Current identity, if signed in.
    pub async fn current_identity(&self) -> Option<Identity> {
        self.snapshot.read().await.identity().cloned()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.snapshot.read().await.state
    }

    /// Full snapshot of the session manager.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Boot the session from the provider's persisted state.
    ///
    /// A provider failure settles the manager as unauthenticated and is
    /// returned to the caller. Calling `start` again re-reads the session.
    #[instrument(skip(self))]
    pub async fn start(&self) -> AuthResult<Option<Identity>> {
        self.snapshot.write().await.state = SessionState::Loading;

        let result = self.provider.get_session().await;

        let mut snapshot = self.snapshot.write().await;
        let outcome = match result {
            Ok(session) => {
                snapshot.state = if session.is_some() {
                    SessionState::Authenticated
                } else {
                    SessionState::Unauthenticated
                };
                snapshot.session = session;
                snapshot.last_error = None;
                Ok(snapshot.identity().cloned())
            }
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session");
                // keep whatever was known before boot
                snapshot.state = if snapshot.session.is_some() {
                    SessionState::Authenticated
                } else {
                    SessionState::Unauthenticated
                };
                snapshot.last_error = Some(e.clone());
                Err(e)
            }
        };
        self.notify(SessionEventKind::InitialSession, &snapshot);
        outcome
    }

    /// Sign in with email and password.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_in(&self, credentials: &Credentials) -> AuthResult<Session> {
        let result = self.provider.sign_in(credentials).await;
        self.settle_sign_in(result).await
    }

    /// Create an identity and sign it in.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_up(&self, credentials: &Credentials) -> AuthResult<Session> {
        let result = self.provider.sign_up(credentials).await;
        self.settle_sign_in(result).await
    }

    /// Sign out the current session.
    ///
    /// Signing out while already signed out succeeds and still notifies.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> AuthResult<()> {
        let current = self.snapshot.read().await.session.clone();

        if let Some(session) = current {
            if let Err(e) = self.provider.sign_out(&session).await {
                warn!(error = %e, "Sign-out failed");
                self.snapshot.write().await.last_error = Some(e.clone());
                return Err(e);
            }
        }

        let mut snapshot = self.snapshot.write().await;
        snapshot.state = SessionState::Unauthenticated;
        snapshot.session = None;
        snapshot.last_error = None;
        info!("Signed out");
        self.notify(SessionEventKind::SignedOut, &snapshot);
        Ok(())
    }

    /// Refresh the current session's tokens.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> AuthResult<Session> {
        let current = self
            .snapshot
            .read()
            .await
            .session
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        match self.provider.refresh_session(&current).await {
            Ok(session) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.state = SessionState::Authenticated;
                snapshot.session = Some(session.clone());
                snapshot.last_error = None;
                self.notify(SessionEventKind::TokenRefreshed, &snapshot);
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.snapshot.write().await.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Apply a change the provider originated on its own.
    pub async fn apply_change(&self, change: AuthChange) {
        let mut snapshot = self.snapshot.write().await;
        let kind = match change.kind {
            AuthChangeKind::SignedIn => SessionEventKind::SignedIn,
            AuthChangeKind::SignedOut => SessionEventKind::SignedOut,
            AuthChangeKind::TokenRefreshed => SessionEventKind::TokenRefreshed,
        };

        match (change.kind, change.session) {
            (AuthChangeKind::SignedOut, _) | (_, None) => {
                snapshot.state = SessionState::Unauthenticated;
                snapshot.session = None;
            }
            (_, Some(session)) => {
                snapshot.state = SessionState::Authenticated;
                snapshot.session = Some(session);
            }
        }
        snapshot.last_error = None;

        debug!(change = change.kind.as_str(), "Applied provider change");
        self.notify(kind, &snapshot);
    }

    /// Spawn a task that applies provider-originated changes until the
    /// provider's channel closes.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut changes = self.provider.changes();

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => manager.apply_change(change).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Provider change listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("Provider change listener stopped");
        })
    }

    async fn settle_sign_in(&self, result: AuthResult<Session>) -> AuthResult<Session> {
        match result {
            Ok(session) => {
                let mut snapshot = self.snapshot.write().await;
                snapshot.state = SessionState::Authenticated;
                snapshot.session = Some(session.clone());
                snapshot.last_error = None;
                info!(user_id = %session.user_id(), "Signed in");
                self.notify(SessionEventKind::SignedIn, &snapshot);
                Ok(session)
            }
            Err(e) => {
                if e.is_server_error() {
                    warn!(error = %e, "Sign-in failed");
                } else {
                    debug!(error = %e, "Sign-in rejected");
                }
                self.snapshot.write().await.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn notify(&self, kind: SessionEventKind, snapshot: &SessionSnapshot) {
        let event = SessionEvent {
            kind,
            state: snapshot.state,
            identity: snapshot.identity().cloned(),
            occurred_at: Utc::now(),
        };
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use crate::memory::MemoryIdentityProvider;

    fn creds() -> Credentials {
        Credentials::new("ada@example.com", "correct horse")
    }

    async fn setup() -> (Arc<MemoryIdentityProvider>, Arc<SessionManager>) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        provider.register(&creds()).await.unwrap();
        let manager = Arc::new(SessionManager::new(provider.clone()));
        (provider, manager)
    }

    #[tokio::test]
    async fn test_boot_without_session() {
        let (_, manager) = setup().await;
        assert_eq!(manager.state().await, SessionState::Uninitialized);

        let identity = manager.start().await.unwrap();
        assert!(identity.is_none());
        assert_eq!(manager.state().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_boot_with_persisted_session() {
        let (provider, manager) = setup().await;
        provider.sign_in(&creds()).await.unwrap();

        let identity = manager.start().await.unwrap();
        assert_eq!(identity.map(|i| i.email), Some("ada@example.com".into()));
        assert_eq!(manager.state().await, SessionState::Authenticated);
    }

    #[tokio::test]
    async fn test_boot_failure_settles_unauthenticated() {
        let (provider, manager) = setup().await;
        provider
            .fail_next(AuthError::ProviderUnavailable("timeout".into()))
            .await;

        assert!(manager.start().await.is_err());
        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.state, SessionState::Unauthenticated);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn test_sign_in_notifies_subscribers() {
        let (_, manager) = setup().await;
        manager.start().await.unwrap();
        let mut sub = manager.subscribe();

        manager.sign_in(&creds()).await.unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, SessionEventKind::SignedIn);
        assert_eq!(event.state, SessionState::Authenticated);
        assert!(manager.current_identity().await.is_some());
    }

    #[tokio::test]
    async fn test_failed_sign_in_keeps_last_known_state() {
        let (provider, manager) = setup().await;
        manager.start().await.unwrap();
        manager.sign_in(&creds()).await.unwrap();
        let identity = manager.current_identity().await;

        provider
            .fail_next(AuthError::ProviderUnavailable("timeout".into()))
            .await;
        let result = manager.sign_in(&creds()).await;

        assert!(matches!(result, Err(AuthError::ProviderUnavailable(_))));
        let snapshot = manager.snapshot().await;
        assert_eq!(snapshot.state, SessionState::Authenticated);
        assert_eq!(snapshot.identity().cloned(), identity);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn test_failed_sign_out_keeps_session() {
        let (provider, manager) = setup().await;
        manager.start().await.unwrap();
        manager.sign_in(&creds()).await.unwrap();

        provider
            .fail_next(AuthError::ProviderUnavailable("timeout".into()))
            .await;
        assert!(manager.sign_out().await.is_err());
        assert_eq!(manager.state().await, SessionState::Authenticated);

        manager.sign_out().await.unwrap();
        assert_eq!(manager.state().await, SessionState::Unauthenticated);
        assert!(manager.current_identity().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_notifies_even_with_same_identity() {
        let (_, manager) = setup().await;
        manager.start().await.unwrap();
        manager.sign_in(&creds()).await.unwrap();
        let before = manager.current_identity().await;
        let mut sub = manager.subscribe();

        manager.refresh().await.unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, SessionEventKind::TokenRefreshed);
        assert_eq!(event.identity, before);
    }

    #[tokio::test]
    async fn test_refresh_requires_session() {
        let (_, manager) = setup().await;
        manager.start().await.unwrap();
        assert_eq!(
            manager.refresh().await.unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_listen_applies_provider_changes() {
        let (provider, manager) = setup().await;
        manager.start().await.unwrap();
        manager.sign_in(&creds()).await.unwrap();
        let mut sub = manager.subscribe();
        let _listener = manager.listen();

        provider.rotate_tokens().await.unwrap();
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, SessionEventKind::TokenRefreshed);

        provider.revoke_current().await;
        let event = sub.recv().await.unwrap();
        assert_eq!(event.kind, SessionEventKind::SignedOut);
        assert_eq!(manager.state().await, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_unsubscribe_drops_receiver() {
        let (_, manager) = setup().await;
        let sub = manager.subscribe();
        assert_eq!(manager.events.receiver_count(), 1);

        sub.unsubscribe();
        assert_eq!(manager.events.receiver_count(), 0);
    }
}
