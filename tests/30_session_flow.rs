mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use common::{TestServer, ADMIN_EMAIL, ADMIN_PASSWORD};
use realty_session::auth::{AuthError, AuthService, FileSessionStore, HostedAuthClient, ProfileUpdate};
use realty_session::config::AuthConfig;
use realty_session::profile::Role;
use realty_session::session::{RecordingNavigator, SessionContext, SessionState, SignUpRequest};

struct Harness {
    client: Arc<HostedAuthClient>,
    context: Arc<SessionContext>,
    navigator: Arc<RecordingNavigator>,
}

fn harness(client: Arc<HostedAuthClient>) -> Harness {
    let navigator = Arc::new(RecordingNavigator::new());
    let context = Arc::new(SessionContext::new(
        client.clone(),
        client.clone(),
        navigator.clone(),
        AuthConfig::default(),
    ));
    Harness {
        client,
        context,
        navigator,
    }
}

async fn wait_for(context: &SessionContext, predicate: impl FnMut(&SessionState) -> bool) -> Result<()> {
    let mut rx = context.watch();
    tokio::time::timeout(Duration::from_secs(3), rx.wait_for(predicate)).await??;
    Ok(())
}

#[tokio::test]
async fn signup_verify_and_sign_out() -> Result<()> {
    let server = TestServer::start().await?;
    let h = harness(server.client()?);
    let mounted = h.context.mount().await;
    assert_eq!(h.context.state(), SessionState::Anonymous);

    let identity = h
        .context
        .sign_up(SignUpRequest::new("buyer@realty.test", "secret123", "Bea Buyer").with_phone("555-0100"))
        .await?;
    assert_eq!(h.navigator.last().as_deref(), Some("/verify-email"));
    assert!(!h.context.is_authenticated());

    // confirming the email signs in through the service; the context follows the notification
    let code = server.confirmation_code("buyer@realty.test").expect("confirmation code");
    h.client.verify_email("buyer@realty.test", &code).await?;
    wait_for(&h.context, |s| s.is_authenticated()).await?;

    let profile = h.context.current_profile().expect("profile");
    assert_eq!(profile.id, identity.id);
    assert_eq!(profile.phone.as_deref(), Some("555-0100"));
    assert!(h.context.is_client());
    assert!(!h.context.is_admin());

    h.context.sign_out().await?;
    assert_eq!(h.context.current_profile(), None);
    assert_eq!(h.navigator.last().as_deref(), Some("/"));
    assert!(h.client.get_session().await?.is_none());

    mounted.unmount().await;
    Ok(())
}

#[tokio::test]
async fn sign_in_routes_by_role() -> Result<()> {
    let server = TestServer::start().await?;
    server.account("agent@realty.test", "secret123", Role::Agent)?;

    let admin = harness(server.client()?);
    let _mounted = admin.context.mount().await;
    let profile = admin.context.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await?;
    assert_eq!(profile.role, Role::Admin);
    assert!(admin.context.is_admin());
    assert_eq!(admin.navigator.last().as_deref(), Some("/admin"));

    let agent = harness(server.client()?);
    let _mounted = agent.context.mount().await;
    agent.context.sign_in("agent@realty.test", "secret123").await?;
    assert!(agent.context.is_agent());
    assert_eq!(agent.navigator.last().as_deref(), Some("/agent/dashboard"));
    Ok(())
}

#[tokio::test]
async fn bad_credentials_leave_context_anonymous() -> Result<()> {
    let server = TestServer::start().await?;
    let h = harness(server.client()?);
    let _mounted = h.context.mount().await;

    let err = h.context.sign_in("bad@x.com", "wrongpw").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert_eq!(err.message(), "Invalid login credentials");
    assert_eq!(h.context.current_profile(), None);
    assert_eq!(h.context.state(), SessionState::Anonymous);
    assert!(h.navigator.history().is_empty());
    Ok(())
}

#[tokio::test]
async fn mount_restores_persisted_session() -> Result<()> {
    let server = TestServer::start().await?;
    let id = server.account("agent@realty.test", "secret123", Role::Agent)?;
    let dir = common::temp_dir("flow");

    let earlier = harness(server.client_with_store(Arc::new(FileSessionStore::in_dir(&dir)))?);
    earlier.context.sign_in("agent@realty.test", "secret123").await?;

    let later = harness(server.client_with_store(Arc::new(FileSessionStore::in_dir(&dir)))?);
    assert!(later.context.is_loading());
    let _mounted = later.context.mount().await;
    assert!(!later.context.is_loading());
    assert!(later.context.is_authenticated());
    assert!(later.context.is_agent());
    assert!(!later.context.is_admin());
    assert_eq!(later.context.current_profile().map(|p| p.id), Some(id));
    assert!(later.navigator.history().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn deactivated_account_is_refused() -> Result<()> {
    let server = TestServer::start().await?;
    let id = server.account("former@realty.test", "secret123", Role::Agent)?;
    server.state.store.update_profile(
        id,
        &ProfileUpdate {
            is_active: Some(false),
            ..ProfileUpdate::default()
        },
    );

    let h = harness(server.client()?);
    let _mounted = h.context.mount().await;
    let err = h.context.sign_in("former@realty.test", "secret123").await.unwrap_err();
    assert!(matches!(err, AuthError::AccountDisabled));
    assert!(!h.context.is_authenticated());
    assert!(h.client.get_session().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn role_change_shows_up_after_refresh() -> Result<()> {
    let server = TestServer::start().await?;
    let id = server.account("client@realty.test", "secret123", Role::Client)?;

    let h = harness(server.client()?);
    let _mounted = h.context.mount().await;
    h.context.sign_in("client@realty.test", "secret123").await?;
    assert!(h.context.is_client());

    let admin = server.client()?;
    admin
        .sign_in_with_password(&realty_session::auth::Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await?;
    admin.update_profile(id, &ProfileUpdate::role(Role::Agent)).await?;

    // the context keeps the old role until asked
    assert!(h.context.is_client());
    let refreshed = h.context.refresh_profile().await?.expect("profile");
    assert_eq!(refreshed.role, Role::Agent);
    assert!(h.context.is_agent());
    Ok(())
}

#[tokio::test]
async fn sign_out_elsewhere_is_observed() -> Result<()> {
    let server = TestServer::start().await?;
    server.account("client@realty.test", "secret123", Role::Client)?;

    let h = harness(server.client()?);
    let _mounted = h.context.mount().await;
    h.context.sign_in("client@realty.test", "secret123").await?;

    // straight through the service, bypassing the context
    h.client.sign_out().await?;
    wait_for(&h.context, |s| s.is_anonymous()).await?;
    assert_eq!(h.context.current_profile(), None);
    assert!(h.navigator.history().iter().all(|route| route != "/"));
    Ok(())
}
