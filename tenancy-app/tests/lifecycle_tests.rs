//! End-to-end tests for the tenancy lifecycle.
//!
//! These tests drive a `CompositionRoot` over the in-memory identity provider
//! and organization store and verify the readiness signal and navigation
//! across the whole session lifecycle.
//!
//! Test flows:
//! 1. boot: persisted session → resolved organization
//! 2. onboarding: sign-up → organization setup → organization created
//! 3. switching: several memberships, one switch at a time
//! 4. teardown: sign-out and external revocation
//! 5. identity change: the next identity never sees the previous context

use std::sync::Arc;
use std::time::Duration;
use tenancy_app::{AppConfig, CompositionRoot, Readiness, RecordingNavigator, Route};
use tenancy_auth::{Credentials, IdentityProvider, MemoryIdentityProvider, SessionState};
use tenancy_org::{
    ContextState, MemoryOrganizationStore, OrgError, OrganizationMembership, OrganizationStore,
};
use tenancy_rbac::Role;
use tokio::sync::watch;

/// Test fixture wiring a composition root over in-memory collaborators.
struct TestFixture {
    /// Identity provider shared with the root.
    provider: Arc<MemoryIdentityProvider>,
    /// Organization store shared with the root.
    store: Arc<MemoryOrganizationStore>,
    /// Navigation recorder.
    navigator: Arc<RecordingNavigator>,
    /// The root under test.
    root: Arc<CompositionRoot>,
}

impl TestFixture {
    /// Create a fixture with default configuration.
    fn new() -> Self {
        Self::with_store(MemoryOrganizationStore::new())
    }

    /// Create a fixture over a preconfigured store.
    fn with_store(store: MemoryOrganizationStore) -> Self {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let store = Arc::new(store);
        let navigator = Arc::new(RecordingNavigator::new());
        let root = Arc::new(
            CompositionRoot::new(
                provider.clone(),
                store.clone(),
                navigator.clone(),
                AppConfig::default(),
            )
            .expect("default config is valid"),
        );

        Self {
            provider,
            store,
            navigator,
            root,
        }
    }

    fn credentials(email: &str) -> Credentials {
        Credentials::new(email, "correct horse battery staple")
    }
}

/// Wait until readiness equals `expected`.
async fn wait_for(rx: &mut watch::Receiver<Readiness>, expected: Readiness) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|r| *r == expected))
        .await
        .expect("readiness timed out")
        .expect("readiness channel closed");
}

// ============================================================================
// Boot
// ============================================================================

#[tokio::test]
async fn test_boot_restores_persisted_session_and_organization() {
    let fixture = TestFixture::new();
    let credentials = TestFixture::credentials("ada@example.com");

    // a previous run signed in and created an organization
    let session = fixture.provider.sign_up(&credentials).await.unwrap();
    let org = tenancy_org::Organization::new("Acme", "acme");
    fixture.store.insert_organization(&org).await.unwrap();
    fixture
        .store
        .insert_membership(&OrganizationMembership::owner(org.id, session.user_id()))
        .await
        .unwrap();

    let readiness = fixture.root.start().await.unwrap();

    assert_eq!(readiness, Readiness::AuthenticatedWithOrg);
    let ctx = fixture.root.organizations().current_context().await;
    assert_eq!(ctx.organization.map(|o| o.id), Some(org.id));
    assert_eq!(ctx.role, Some(Role::Owner));
    assert!(fixture.navigator.routes().is_empty());
}

#[tokio::test]
async fn test_boot_without_memberships_is_no_org() {
    let fixture = TestFixture::new();
    fixture
        .provider
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();

    let readiness = fixture.root.start().await.unwrap();

    assert_eq!(readiness, Readiness::AuthenticatedNoOrg);
    assert_ne!(readiness, Readiness::AuthenticatedWithOrg);
    assert_eq!(fixture.navigator.last(), Some(Route::OrganizationSetup));
}

// ============================================================================
// Onboarding
// ============================================================================

#[tokio::test]
async fn test_onboarding_flow() {
    let fixture = TestFixture::new();
    let mut readiness = fixture.root.subscribe_readiness();
    let _tasks = fixture.root.spawn();

    fixture.root.start().await.unwrap();
    wait_for(&mut readiness, Readiness::Unauthenticated).await;

    fixture
        .root
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    wait_for(&mut readiness, Readiness::AuthenticatedNoOrg).await;

    let org = fixture
        .root
        .create_organization("Acme", "acme")
        .await
        .unwrap();
    wait_for(&mut readiness, Readiness::AuthenticatedWithOrg).await;

    let organizations = fixture
        .root
        .organizations()
        .get_user_organizations()
        .await
        .unwrap();
    assert!(organizations.iter().any(|o| o.slug == "acme"));
    assert_eq!(
        fixture
            .root
            .organizations()
            .get_current_user_role(org.id)
            .await
            .unwrap(),
        Some(Role::Owner)
    );
    assert_eq!(
        fixture.navigator.routes(),
        vec![Route::SignIn, Route::OrganizationSetup]
    );
}

#[tokio::test(start_paused = true)]
async fn test_sign_up_with_running_listener_returns_settled_readiness() {
    let fixture =
        TestFixture::with_store(MemoryOrganizationStore::new().with_latency(Duration::from_millis(20)));
    let _tasks = fixture.root.spawn();
    fixture.root.start().await.unwrap();
    let credentials = TestFixture::credentials("ada@example.com");

    // the listener sees the same sign-in event while this call resolves
    let readiness = fixture.root.sign_up(&credentials).await.unwrap();
    assert_eq!(readiness, Readiness::AuthenticatedNoOrg);
    assert_eq!(
        fixture.root.organizations().state().await,
        ContextState::NoOrg
    );

    fixture.root.sign_out().await.unwrap();
    let readiness = fixture.root.sign_in(&credentials).await.unwrap();
    assert_eq!(readiness, Readiness::AuthenticatedNoOrg);
    assert_eq!(fixture.root.readiness(), Readiness::AuthenticatedNoOrg);
}

#[tokio::test]
async fn test_failed_creation_leaves_no_organization() {
    let fixture = TestFixture::new();
    fixture.root.start().await.unwrap();
    fixture
        .root
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();

    fixture.store.fail_membership_inserts(10);
    let result = fixture.root.create_organization("Acme", "acme").await;

    assert!(result.is_err());
    assert!(fixture
        .store
        .find_organization_by_slug("acme")
        .await
        .unwrap()
        .is_none());
    assert_eq!(fixture.root.readiness(), Readiness::AuthenticatedNoOrg);
}

// ============================================================================
// Switching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_switch_has_single_winner() {
    let fixture =
        TestFixture::with_store(MemoryOrganizationStore::new().with_latency(Duration::from_millis(25)));
    let session = fixture
        .provider
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();

    let mut orgs = Vec::new();
    for slug in ["alpha", "beta", "gamma"] {
        let org = tenancy_org::Organization::new(slug, slug);
        fixture.store.insert_organization(&org).await.unwrap();
        fixture
            .store
            .insert_membership(&OrganizationMembership::active(
                org.id,
                session.user_id(),
                Role::Member,
            ))
            .await
            .unwrap();
        orgs.push(org);
    }
    fixture.root.start().await.unwrap();

    let (first, second) = tokio::join!(
        fixture.root.switch_organization(orgs[2].id),
        fixture.root.switch_organization(orgs[1].id)
    );

    let (winner, loser) = match (first, second) {
        (Ok(org), Err(e)) | (Err(e), Ok(org)) => (org, e),
        other => panic!("expected exactly one winner, got {other:?}"),
    };
    assert_eq!(loser.error_code(), OrgError::Busy.error_code());

    let ctx = fixture.root.organizations().current_context().await;
    assert_eq!(ctx.organization.map(|o| o.id), Some(winner.id));
    assert_eq!(fixture.root.readiness(), Readiness::AuthenticatedWithOrg);
}

#[tokio::test]
async fn test_switch_to_foreign_organization_is_forbidden() {
    let fixture = TestFixture::new();
    fixture
        .provider
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.start().await.unwrap();
    let mine = fixture.root.create_organization("Mine", "mine").await.unwrap();

    let foreign = tenancy_org::Organization::new("Foreign", "foreign");
    fixture.store.insert_organization(&foreign).await.unwrap();

    let err = fixture.root.switch_organization(foreign.id).await.unwrap_err();

    assert_eq!(err.status_code(), 403);
    let ctx = fixture.root.organizations().current_context().await;
    assert_eq!(ctx.organization.map(|o| o.id), Some(mine.id));
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_sign_out_routes_to_sign_in() {
    let fixture = TestFixture::new();
    fixture.root.start().await.unwrap();
    fixture
        .root
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.create_organization("Acme", "acme").await.unwrap();

    let readiness = fixture.root.sign_out().await.unwrap();

    assert_eq!(readiness, Readiness::Unauthenticated);
    assert_eq!(fixture.navigator.last(), Some(Route::SignIn));
    let ctx = fixture.root.organizations().current_context().await;
    assert!(ctx.identity.is_none());
    assert!(ctx.organization.is_none());
    assert!(ctx.organizations.is_empty());
}

#[tokio::test]
async fn test_external_revocation_signs_out() {
    let fixture = TestFixture::new();
    let mut readiness = fixture.root.subscribe_readiness();
    let _tasks = fixture.root.spawn();

    fixture
        .provider
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.start().await.unwrap();
    wait_for(&mut readiness, Readiness::AuthenticatedNoOrg).await;

    fixture.provider.revoke_current().await;
    wait_for(&mut readiness, Readiness::Unauthenticated).await;

    assert_eq!(
        fixture.root.organizations().state().await,
        ContextState::Init
    );
    assert_eq!(fixture.navigator.last(), Some(Route::SignIn));
}

#[tokio::test]
async fn test_shutdown_stops_background_tasks() {
    let fixture = TestFixture::new();
    let tasks = fixture.root.spawn();
    fixture
        .provider
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.start().await.unwrap();

    tasks.shutdown().await;

    // nothing applies provider changes any more
    fixture.provider.revoke_current().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        fixture.root.sessions().state().await,
        SessionState::Authenticated
    );
    assert_eq!(fixture.root.readiness(), Readiness::AuthenticatedNoOrg);
}

#[tokio::test]
async fn test_token_refresh_keeps_selection() {
    let fixture = TestFixture::new();
    let _tasks = fixture.root.spawn();
    fixture.root.start().await.unwrap();
    fixture
        .root
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.create_organization("First", "first").await.unwrap();
    let second = fixture
        .root
        .create_organization("Second", "second")
        .await
        .unwrap();

    let mut readiness = fixture.root.subscribe_readiness();
    let _ = readiness.borrow_and_update();

    // rotated in the background, applied by the listener
    let rotated = fixture.provider.rotate_tokens().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = fixture.root.sessions().snapshot().await;
    assert_eq!(
        snapshot.session.map(|s| s.access_token),
        Some(rotated.access_token)
    );

    assert!(!readiness.has_changed().unwrap());
    let ctx = fixture.root.organizations().current_context().await;
    assert_eq!(ctx.organization.map(|o| o.id), Some(second.id));
}

// ============================================================================
// Identity change
// ============================================================================

#[tokio::test]
async fn test_next_identity_gets_fresh_context() {
    let fixture = TestFixture::new();
    fixture.root.start().await.unwrap();

    fixture
        .root
        .sign_up(&TestFixture::credentials("ada@example.com"))
        .await
        .unwrap();
    fixture.root.create_organization("Acme", "acme").await.unwrap();
    fixture.root.sign_out().await.unwrap();

    let readiness = fixture
        .root
        .sign_up(&TestFixture::credentials("grace@example.com"))
        .await
        .unwrap();

    assert_eq!(readiness, Readiness::AuthenticatedNoOrg);
    let ctx = fixture.root.organizations().current_context().await;
    assert_eq!(
        ctx.identity.map(|i| i.email),
        Some("grace@example.com".to_string())
    );
    assert!(ctx.organizations.is_empty());
}
