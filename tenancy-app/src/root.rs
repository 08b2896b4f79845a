//! Composition root
//!
//! Wires the session manager to the organization context manager and derives
//! the readiness signal from both. Every upstream change recomputes
//! readiness; subscribers only see actual transitions.
//!
//! ```text
//! IdentityProvider ─→ SessionManager ──events──┐
//!                                              ├─→ CompositionRoot ─→ Readiness
//! OrganizationStore ─→ OrganizationContext ────┘          │
//!                      Manager (state watch)              └─→ Navigator
//! ```

use std::sync::{Arc, Weak};
use tenancy_auth::{Credentials, Identity, IdentityProvider, SessionEvent, SessionManager};
use tenancy_org::{ContextState, Organization, OrganizationContextManager, OrganizationStore};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::navigation::{Navigator, Route};
use crate::readiness::Readiness;

/// Owns the session and organization managers for one app instance.
pub struct CompositionRoot {
    config: AppConfig,
    sessions: Arc<SessionManager>,
    organizations: Arc<OrganizationContextManager>,
    navigator: Arc<dyn Navigator>,
    readiness: watch::Sender<Readiness>,
    recompute_lock: Mutex<()>,
}

impl std::fmt::Debug for CompositionRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionRoot")
            .field("config", &self.config)
            .field("readiness", &*self.readiness.borrow())
            .finish()
    }
}

/// Background tasks started by [`CompositionRoot::spawn`].
///
/// Dropping the handle stops both tasks.
#[derive(Debug)]
pub struct RootTasks {
    listener: JoinHandle<()>,
    readiness: JoinHandle<()>,
}

impl RootTasks {
    /// Stop the background tasks and wait until they have exited.
    pub async fn shutdown(mut self) {
        self.listener.abort();
        self.readiness.abort();
        let _ = (&mut self.listener).await;
        let _ = (&mut self.readiness).await;
        debug!("Root tasks stopped");
    }
}

impl Drop for RootTasks {
    fn drop(&mut self) {
        self.listener.abort();
        self.readiness.abort();
    }
}

impl CompositionRoot {
    /// Build the root over the given collaborators.
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn OrganizationStore>,
        navigator: Arc<dyn Navigator>,
        config: AppConfig,
    ) -> AppResult<Self> {
        config.validate()?;

        let sessions = Arc::new(SessionManager::with_capacity(
            provider,
            config.session_event_capacity,
        ));
        let organizations = Arc::new(OrganizationContextManager::new(
            store,
            config.context.clone(),
        ));
        let (readiness, _) = watch::channel(Readiness::Loading);

        Ok(Self {
            config,
            sessions,
            organizations,
            navigator,
            readiness,
            recompute_lock: Mutex::new(()),
        })
    }

    /// Session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Organization context manager.
    pub fn organizations(&self) -> &Arc<OrganizationContextManager> {
        &self.organizations
    }

    /// Current readiness.
    pub fn readiness(&self) -> Readiness {
        *self.readiness.borrow()
    }

    /// Watch readiness transitions.
    pub fn subscribe_readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.subscribe()
    }

    /// Boot the session and resolve the organization context.
    ///
    /// A provider failure during boot still settles readiness before the
    /// error is returned.
    #[instrument(skip(self))]
    pub async fn start(&self) -> AppResult<Readiness> {
        let booted = self.sessions.start().await;
        if let Err(e) = &booted {
            warn!(error = %e, "Session boot failed");
        }

        let identity = self.sessions.current_identity().await;
        let synced = self.sync_context(identity).await;
        let readiness = self.recompute().await;

        booted?;
        synced?;
        Ok(readiness)
    }

    /// Start the provider change listener and the readiness loop.
    ///
    /// The readiness loop reacts to session events and organization context
    /// changes until the root is dropped.
    pub fn spawn(self: &Arc<Self>) -> RootTasks {
        let listener = self.sessions.listen();

        let root: Weak<Self> = Arc::downgrade(self);
        let mut events = self.sessions.subscribe();
        let mut context = self.organizations.subscribe();

        let readiness = tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        let Some(root) = root.upgrade() else { break };
                        if let Err(e) = root.on_session_event(&event).await {
                            warn!(error = %e, "Failed to apply session event");
                        }
                    }
                    changed = context.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let Some(root) = root.upgrade() else { break };
                        root.recompute().await;
                    }
                }
            }
            debug!("Readiness loop stopped");
        });

        RootTasks {
            listener,
            readiness,
        }
    }

    /// React to a session event.
    ///
    /// Resolves the organization context when the identity changed, clears
    /// it when nobody is signed in, then recomputes readiness. A resolution
    /// already in flight for the same identity is awaited, not restarted.
    #[instrument(skip(self, event), fields(kind = ?event.kind))]
    pub async fn on_session_event(&self, event: &SessionEvent) -> AppResult<Readiness> {
        // events can queue up; act on the latest identity
        let identity = self.sessions.current_identity().await;
        let synced = self.sync_context(identity).await;
        let readiness = self.recompute().await;
        synced.map(|_| readiness)
    }

    /// Sign in and resolve the identity's organizations.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_in(&self, credentials: &Credentials) -> AppResult<Readiness> {
        let signed_in = self.sessions.sign_in(credentials).await;
        self.settle_sign_in(signed_in.map(|s| s.identity).map_err(AppError::from))
            .await
    }

    /// Create an identity, sign it in and resolve its (empty) organizations.
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    pub async fn sign_up(&self, credentials: &Credentials) -> AppResult<Readiness> {
        let signed_up = self.sessions.sign_up(credentials).await;
        self.settle_sign_in(signed_up.map(|s| s.identity).map_err(AppError::from))
            .await
    }

    /// Sign out and tear down the organization context.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> AppResult<Readiness> {
        self.sessions.sign_out().await?;
        self.organizations.clear().await;
        Ok(self.recompute().await)
    }

    /// Create an organization owned by the signed-in identity and select it.
    pub async fn create_organization(&self, name: &str, slug: &str) -> AppResult<Organization> {
        let created = self.organizations.create_organization(name, slug).await;
        self.recompute().await;
        Ok(created?)
    }

    /// Switch the current organization.
    pub async fn switch_organization(&self, organization_id: Uuid) -> AppResult<Organization> {
        let switched = self
            .organizations
            .switch_to_organization(organization_id)
            .await;
        self.recompute().await;
        Ok(switched?)
    }

    /// Re-resolve the organization context for the current identity.
    pub async fn refresh_context(&self) -> AppResult<Readiness> {
        let identity = self.sessions.current_identity().await;
        let resolved = self.organizations.resolve(identity).await;
        let readiness = self.recompute().await;
        resolved?;
        Ok(readiness)
    }

    async fn settle_sign_in(&self, result: AppResult<Identity>) -> AppResult<Readiness> {
        let identity = match result {
            Ok(identity) => identity,
            Err(e) => {
                self.recompute().await;
                return Err(e);
            }
        };

        let synced = self.sync_context(Some(identity)).await;
        let readiness = self.recompute().await;
        synced.map(|_| readiness)
    }

    async fn sync_context(&self, identity: Option<Identity>) -> AppResult<()> {
        let Some(identity) = identity else {
            self.organizations.clear().await;
            return Ok(());
        };

        if self.is_context_owner(&identity).await {
            // a pass for this identity may be in flight; adopt its outcome
            // instead of superseding it
            let mut state = self.organizations.subscribe();
            let settled = state
                .wait_for(|s| *s != ContextState::Loading)
                .await
                .map(|s| s.is_settled())
                .unwrap_or(false);
            if settled && self.is_context_owner(&identity).await {
                return Ok(());
            }
        }

        self.organizations.resolve(Some(identity)).await?;
        Ok(())
    }

    async fn is_context_owner(&self, identity: &Identity) -> bool {
        self.organizations.identity().await.map(|i| i.id) == Some(identity.id)
    }

    async fn recompute(&self) -> Readiness {
        let _serialized = self.recompute_lock.lock().await;

        let session = self.sessions.state().await;
        let context = self.organizations.state().await;
        let next = Readiness::reduce(session, context);

        let mut previous = next;
        let changed = self.readiness.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = *current;
            *current = next;
            true
        });

        if changed {
            info!(from = %previous, to = %next, "Readiness changed");
            match next {
                Readiness::Unauthenticated => self.navigator.navigate(Route::SignIn),
                Readiness::AuthenticatedNoOrg => {
                    self.navigator.navigate(Route::OrganizationSetup)
                }
                Readiness::Loading | Readiness::AuthenticatedWithOrg => {}
            }
        }

        next
    }
}
