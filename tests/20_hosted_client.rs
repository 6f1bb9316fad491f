mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;

use common::{TestServer, ADMIN_EMAIL, ADMIN_PASSWORD};
use realty_session::auth::{
    AuthError, AuthEvent, AuthService, AuthSubscription, Credentials, FileSessionStore, HostedAuthClient, Identity,
    MemorySessionStore, ProfileMetadata, ProfileRepository, ProfileUpdate, Session,
};
use realty_session::profile::{Profile, Role};

async fn next_event(subscription: &mut AuthSubscription) -> Result<AuthEvent> {
    let change = tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("notifier closed"))?;
    Ok(change.event)
}

#[tokio::test]
async fn signup_then_verify_signs_in() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.client()?;
    let mut events = client.on_auth_state_change();

    let identity = client
        .sign_up(
            &Credentials::new("new@realty.test", "secret123"),
            &ProfileMetadata {
                full_name: "Nia New".to_string(),
                phone: None,
            },
        )
        .await?;
    assert_eq!(identity.email.as_deref(), Some("new@realty.test"));
    assert!(identity.email_confirmed_at.is_none());
    assert!(client.get_session().await?.is_none());

    let code = server.confirmation_code("new@realty.test").expect("confirmation code");
    let session = client.verify_email("new@realty.test", &code).await?;
    assert_eq!(session.user.id, identity.id);
    assert_eq!(next_event(&mut events).await?, AuthEvent::SignedIn);

    let row = client.fetch_profile(identity.id).await?.expect("profile row");
    let profile = Profile::from_row(&row)?;
    assert_eq!(profile.full_name, "Nia New");
    assert_eq!(profile.role, Role::Client);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() -> Result<()> {
    let server = TestServer::start().await?;
    server.account("agent@realty.test", "secret123", Role::Agent)?;
    let client = server.client()?;

    let err = client
        .sign_in_with_password(&Credentials::new("agent@realty.test", "wrongpw"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert_eq!(err.message(), "Invalid login credentials");
    assert!(client.get_session().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn sign_in_and_out_notify_subscribers() -> Result<()> {
    let server = TestServer::start().await?;
    let id = server.account("agent@realty.test", "secret123", Role::Agent)?;
    let client = server.client()?;
    let mut events = client.on_auth_state_change();

    let session = client
        .sign_in_with_password(&Credentials::new("agent@realty.test", "secret123"))
        .await?;
    assert_eq!(session.user.id, id);
    assert!(!session.is_expired(0));
    assert_eq!(next_event(&mut events).await?, AuthEvent::SignedIn);
    assert_eq!(client.get_session().await?, Some(session));
    assert_eq!(client.current_user().await?.id, id);

    client.sign_out().await?;
    assert_eq!(next_event(&mut events).await?, AuthEvent::SignedOut);
    assert!(client.get_session().await?.is_none());

    // already signed out: nothing to do, no error
    client.sign_out().await?;
    assert!(events.try_recv().is_none());
    Ok(())
}

#[tokio::test]
async fn expiring_session_is_refreshed_on_read() -> Result<()> {
    let server = TestServer::start_with(|config| config.jwt_expiry_secs = 30).await?;
    server.account("client@realty.test", "secret123", Role::Client)?;
    let client = server.client()?;

    // 30s tokens sit inside the default 60s refresh margin
    let first = client
        .sign_in_with_password(&Credentials::new("client@realty.test", "secret123"))
        .await?;
    let mut events = client.on_auth_state_change();

    let current = client.get_session().await?.expect("session");
    assert_ne!(current.refresh_token, first.refresh_token);
    assert_eq!(current.user.id, first.user.id);
    assert_eq!(next_event(&mut events).await?, AuthEvent::TokenRefreshed);
    Ok(())
}

#[tokio::test]
async fn rejected_refresh_ends_the_session() -> Result<()> {
    let server = TestServer::start().await?;
    let stale = Session {
        access_token: "stale".to_string(),
        refresh_token: "revoked-refresh-token".to_string(),
        token_type: "bearer".to_string(),
        expires_at: Utc::now().timestamp() - 10,
        user: Identity {
            id: uuid::Uuid::new_v4(),
            email: Some("old@realty.test".to_string()),
            email_confirmed_at: None,
            created_at: None,
        },
    };
    let store = Arc::new(MemorySessionStore::with_session(stale));
    let client = server.client_with_store(store.clone())?;
    let mut events = client.on_auth_state_change();

    assert!(client.get_session().await?.is_none());
    assert_eq!(next_event(&mut events).await?, AuthEvent::SignedOut);
    assert!(realty_session::auth::SessionStore::load(store.as_ref())?.is_none());
    Ok(())
}

#[tokio::test]
async fn file_store_survives_a_new_client() -> Result<()> {
    let server = TestServer::start().await?;
    let id = server.account("agent@realty.test", "secret123", Role::Agent)?;
    let dir = common::temp_dir("hosted");

    let first = server.client_with_store(Arc::new(FileSessionStore::in_dir(&dir)))?;
    first
        .sign_in_with_password(&Credentials::new("agent@realty.test", "secret123"))
        .await?;

    let second: Arc<HostedAuthClient> = server.client_with_store(Arc::new(FileSessionStore::in_dir(&dir)))?;
    let restored = second.get_session().await?.expect("persisted session");
    assert_eq!(restored.user.id, id);

    second.sign_out().await?;
    assert!(!dir.join(FileSessionStore::FILE_NAME).exists());
    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn admin_updates_roles_through_profile_table() -> Result<()> {
    let server = TestServer::start().await?;
    let client_id = server.account("client@realty.test", "secret123", Role::Client)?;

    let member = server.client()?;
    member
        .sign_in_with_password(&Credentials::new("client@realty.test", "secret123"))
        .await?;
    let mut member_events = member.on_auth_state_change();
    let err = member
        .update_profile(client_id, &ProfileUpdate::role(Role::Admin))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(403));

    // own row, allowed column: subscribers hear about it
    let own = ProfileUpdate {
        full_name: Some("Cleo Client".to_string()),
        ..ProfileUpdate::default()
    };
    member.update_profile(client_id, &own).await?.expect("row");
    assert_eq!(next_event(&mut member_events).await?, AuthEvent::UserUpdated);

    let admin = server.client()?;
    admin
        .sign_in_with_password(&Credentials::new(ADMIN_EMAIL, ADMIN_PASSWORD))
        .await?;
    let row = admin
        .update_profile(client_id, &ProfileUpdate::role(Role::Agent))
        .await?
        .expect("updated row");
    let updated = Profile::from_row(&row)?;
    assert_eq!(updated.role, Role::Agent);
    assert_eq!(updated.full_name, "Cleo Client");

    let seen = member.fetch_profile(client_id).await?.expect("row");
    assert_eq!(seen["role"], "agent");
    Ok(())
}

#[tokio::test]
async fn update_requires_a_session() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.client()?;

    let err = client
        .update_profile(uuid::Uuid::new_v4(), &ProfileUpdate::role(Role::Agent))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotAuthenticated));

    let err = client
        .update_profile(uuid::Uuid::new_v4(), &ProfileUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
    Ok(())
}
