// In-memory auth service used by the session context tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{
    AuthChange, AuthError, AuthEvent, AuthService, AuthStateNotifier, AuthSubscription, Credentials, Identity,
    ProfileMetadata, ProfileRepository, Session,
};
use crate::profile::{Profile, Role};

struct Account {
    id: Uuid,
    password: String,
}

#[derive(Default)]
pub struct FakeAuthService {
    notifier: AuthStateNotifier,
    session: Mutex<Option<Session>>,
    accounts: Mutex<HashMap<String, Account>>,
    profiles: Mutex<HashMap<Uuid, Value>>,
    network_calls: AtomicUsize,
    profile_failures: AtomicUsize,
    profile_delay_ms: AtomicU64,
}

impl FakeAuthService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Account plus the profile row the sign-up trigger would have created.
    pub fn add_account(&self, email: &str, password: &str, role: Role) -> Uuid {
        let id = self.add_account_without_profile(email, password);
        let mut profile = Profile::new(id, "Test User", email, None);
        profile.role = role;
        self.profiles.lock().unwrap().insert(id, profile.to_row());
        id
    }

    pub fn add_account_without_profile(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                id,
                password: password.to_string(),
            },
        );
        id
    }

    pub fn set_profile_field(&self, id: Uuid, field: &str, value: Value) {
        if let Some(row) = self.profiles.lock().unwrap().get_mut(&id) {
            row[field] = value;
        }
    }

    /// Session already persisted before the context mounts.
    pub fn restore_session(&self, id: Uuid) -> Session {
        let session = session_for(id);
        *self.session.lock().unwrap() = Some(session.clone());
        session
    }

    pub fn sign_in_elsewhere(&self, id: Uuid) -> Session {
        let session = self.restore_session(id);
        self.notifier.emit(AuthChange::signed_in(session.clone()));
        session
    }

    pub fn end_session_externally(&self) {
        *self.session.lock().unwrap() = None;
        self.notifier.emit(AuthChange::signed_out());
    }

    pub fn emit_user_updated(&self) {
        let session = self.session.lock().unwrap().clone();
        self.notifier.emit(AuthChange::new(AuthEvent::UserUpdated, session));
    }

    pub fn fail_next_profile_fetches(&self, count: usize) {
        self.profile_failures.store(count, Ordering::SeqCst);
    }

    pub fn delay_profile_fetches(&self, delay: Duration) {
        self.profile_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    fn count_call(&self) {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn session_for(id: Uuid) -> Session {
    Session {
        access_token: format!("access-{}", Uuid::new_v4().simple()),
        refresh_token: format!("refresh-{}", Uuid::new_v4().simple()),
        token_type: "bearer".to_string(),
        expires_at: Utc::now().timestamp() + 3600,
        user: Identity {
            id,
            email: None,
            email_confirmed_at: Some(Utc::now()),
            created_at: Some(Utc::now()),
        },
    }
}

#[async_trait]
impl AuthService for FakeAuthService {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        self.count_call();
        Ok(self.session.lock().unwrap().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.notifier.subscribe()
    }

    async fn sign_up(&self, credentials: &Credentials, metadata: &ProfileMetadata) -> Result<Identity, AuthError> {
        self.count_call();
        if self.accounts.lock().unwrap().contains_key(&credentials.email) {
            return Err(AuthError::rejected(422, "User already registered"));
        }

        let id = self.add_account_without_profile(&credentials.email, &credentials.password);
        let profile = Profile::new(id, metadata.full_name.clone(), credentials.email.clone(), metadata.phone.clone());
        self.profiles.lock().unwrap().insert(id, profile.to_row());

        Ok(Identity {
            id,
            email: Some(credentials.email.clone()),
            email_confirmed_at: None,
            created_at: Some(Utc::now()),
        })
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.count_call();
        let id = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(&credentials.email) {
                Some(account) if account.password == credentials.password => account.id,
                _ => return Err(AuthError::InvalidCredentials("invalid credentials".to_string())),
            }
        };
        Ok(self.sign_in_elsewhere(id))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.count_call();
        let had_session = self.session.lock().unwrap().take().is_some();
        if had_session {
            self.notifier.emit(AuthChange::signed_out());
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepository for FakeAuthService {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Value>, AuthError> {
        self.count_call();
        let delay = self.profile_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let failures = self.profile_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.profile_failures.store(failures - 1, Ordering::SeqCst);
            return Err(AuthError::Network("connection reset".to_string()));
        }

        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }
}
