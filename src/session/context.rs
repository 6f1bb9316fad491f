use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::{AuthChange, AuthError, AuthEvent, AuthService, Credentials, Identity, ProfileMetadata, ProfileRepository, Session};
use crate::config::AuthConfig;
use crate::profile::{Profile, Role};

use super::navigator::{Navigator, Routes};
use super::state::SessionState;
use super::validate::{normalize_phone, validate_email_format, validate_full_name, validate_password};

/// Form input for [`SessionContext::sign_up`]
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
}

impl SignUpRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: full_name.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// Bookkeeping for the resolution currently allowed to publish.
#[derive(Default)]
struct Resolution {
    epoch: u64,
    /// Access token being (or last successfully) resolved
    token: Option<String>,
}

enum Resolved {
    Anonymous,
    Authenticated(Profile),
    Disabled,
    Unavailable,
}

/// Owns "who is signed in and what role they have" for the application.
///
/// State lives in a `watch` channel so any number of consumers can read or
/// await it. Every resolution takes a fresh epoch; a result whose epoch is no
/// longer current is dropped, so a slow profile fetch can never overwrite a
/// newer sign-in or sign-out.
pub struct SessionContext {
    auth: Arc<dyn AuthService>,
    profiles: Arc<dyn ProfileRepository>,
    navigator: Arc<dyn Navigator>,
    config: AuthConfig,
    routes: Routes,
    state: watch::Sender<SessionState>,
    resolution: Mutex<Resolution>,
}

impl SessionContext {
    pub fn new(
        auth: Arc<dyn AuthService>,
        profiles: Arc<dyn ProfileRepository>,
        navigator: Arc<dyn Navigator>,
        config: AuthConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let routes = Routes::from_config(&config);
        Self {
            auth,
            profiles,
            navigator,
            config,
            routes,
            state,
            resolution: Mutex::new(Resolution::default()),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_profile(&self) -> Option<Profile> {
        self.state.borrow().profile().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.state.borrow().has_role(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_agent(&self) -> bool {
        self.has_role(Role::Agent)
    }

    pub fn is_client(&self) -> bool {
        self.has_role(Role::Client)
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Resolve any existing session, then follow auth state notifications
    /// until the returned handle is unmounted or dropped.
    pub async fn mount(self: &Arc<Self>) -> MountedSession {
        // Subscribe before the first read so a change in between is not lost.
        let mut subscription = self.auth.on_auth_state_change();
        self.begin(None, Some(SessionState::Loading));

        let initial = match self.auth.get_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Could not read existing session, starting anonymous");
                None
            }
        };
        self.resolve(initial.as_ref()).await;

        let context = Arc::clone(self);
        let listener = tokio::spawn(async move {
            while let Some(change) = subscription.recv().await {
                context.handle_change(change).await;
            }
            debug!("Auth state stream closed");
        });

        info!(state = %self.state(), "Session context mounted");
        MountedSession {
            listener: Some(listener),
        }
    }

    /// Create an account. Local checks run first and fail without a network call.
    /// The new account is not signed in until the email address is verified.
    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Identity, AuthError> {
        validate_email_format(&request.email).map_err(AuthError::Validation)?;
        validate_password(&request.password, self.config.min_password_length).map_err(AuthError::Validation)?;
        validate_full_name(&request.full_name).map_err(AuthError::Validation)?;

        let credentials = Credentials::new(request.email.trim(), request.password);
        let metadata = ProfileMetadata {
            full_name: request.full_name.trim().to_string(),
            phone: normalize_phone(request.phone.as_deref()),
        };

        let identity = self.auth.sign_up(&credentials, &metadata).await.map_err(|e| {
            info!(error = %e, "Sign-up rejected");
            e
        })?;

        info!(user_id = %identity.id, "Account created, awaiting email verification");
        self.navigator.navigate(&self.routes.post_signup);
        Ok(identity)
    }

    /// Authenticate and load the profile before returning, so the caller can
    /// rely on `current_profile()` once this resolves.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Email and password are required".to_string()));
        }

        let session = self
            .auth
            .sign_in_with_password(&Credentials::new(email, password))
            .await
            .map_err(|e| {
                info!(error = %e, "Sign-in rejected");
                e
            })?;

        match self.resolve(Some(&session)).await {
            Resolved::Authenticated(profile) => {
                info!(user_id = %profile.id, role = %profile.role, "Signed in");
                self.navigator.navigate(self.routes.after_sign_in(profile.role));
                Ok(profile)
            }
            Resolved::Disabled => {
                self.abandon_session().await;
                Err(AuthError::AccountDisabled)
            }
            Resolved::Anonymous | Resolved::Unavailable => {
                self.abandon_session().await;
                Err(AuthError::ProfileUnavailable)
            }
        }
    }

    /// Local state is cleared and the landing route visited even when the
    /// service call fails; the failure is still returned.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.auth.sign_out().await;

        let epoch = self.begin(None, None);
        self.commit(epoch, SessionState::Anonymous);
        self.navigator.navigate(&self.routes.landing);

        match &result {
            Ok(()) => info!("Signed out"),
            Err(e) => warn!(error = %e, "Auth service sign-out failed, local session cleared anyway"),
        }
        result
    }

    /// Re-read the profile for the current session, e.g. after a role change.
    pub async fn refresh_profile(&self) -> Result<Option<Profile>, AuthError> {
        let session = self.auth.get_session().await?;
        Ok(match self.resolve(session.as_ref()).await {
            Resolved::Authenticated(profile) => Some(profile),
            _ => None,
        })
    }

    async fn handle_change(&self, change: AuthChange) {
        let repeatable = matches!(
            change.event,
            AuthEvent::InitialSession | AuthEvent::SignedIn | AuthEvent::TokenRefreshed
        );
        if repeatable {
            if let Some(session) = &change.session {
                if self.is_tracking(&session.access_token) {
                    debug!(event = %change.event, "Session already resolved, ignoring notification");
                    return;
                }
            }
        }

        debug!(event = %change.event, "Auth state changed, resolving session");
        let session = match change.event {
            AuthEvent::SignedOut => None,
            _ => change.session,
        };
        self.resolve(session.as_ref()).await;
    }

    async fn resolve(&self, session: Option<&Session>) -> Resolved {
        let Some(session) = session else {
            let epoch = self.begin(None, None);
            self.commit(epoch, SessionState::Anonymous);
            return Resolved::Anonymous;
        };

        let epoch = self.begin(Some(&session.access_token), Some(SessionState::Loading));
        let resolved = self.load_profile(session.user.id).await;
        let next = match &resolved {
            Resolved::Authenticated(profile) => SessionState::Authenticated(profile.clone()),
            _ => SessionState::Anonymous,
        };
        self.commit(epoch, next);
        resolved
    }

    async fn load_profile(&self, user_id: Uuid) -> Resolved {
        let attempts = self.config.profile_fetch_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.profiles.fetch_profile(user_id).await {
                Ok(Some(row)) => return accept_row(user_id, &row),
                Ok(None) => {
                    warn!(user_id = %user_id, "No profile row for this identity");
                    return Resolved::Unavailable;
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(user_id = %user_id, attempt, error = %e, "Profile fetch failed, retrying");
                    let backoff = self.config.profile_retry_backoff_ms.saturating_mul(u64::from(attempt));
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Err(e) => {
                    warn!(user_id = %user_id, attempt, error = %e, "Profile fetch failed");
                    return Resolved::Unavailable;
                }
            }
        }
    }

    /// Sign-in produced a session we will not honor; end it at the service too.
    async fn abandon_session(&self) {
        if let Err(e) = self.auth.sign_out().await {
            warn!(error = %e, "Failed to end rejected session");
        }
    }

    /// Start a new resolution, invalidating any in flight.
    fn begin(&self, token: Option<&str>, interim: Option<SessionState>) -> u64 {
        let mut resolution = self.lock_resolution();
        resolution.epoch += 1;
        resolution.token = token.map(str::to_string);
        if let Some(state) = interim {
            self.publish(state);
        }
        resolution.epoch
    }

    /// Publish `next` only if no newer resolution has started since `epoch`.
    fn commit(&self, epoch: u64, next: SessionState) -> bool {
        let mut resolution = self.lock_resolution();
        if resolution.epoch != epoch {
            debug!(epoch, current = resolution.epoch, "Discarding stale session resolution");
            return false;
        }
        if !next.is_authenticated() {
            resolution.token = None;
        }
        self.publish(next);
        true
    }

    fn is_tracking(&self, access_token: &str) -> bool {
        self.lock_resolution().token.as_deref() == Some(access_token)
    }

    fn publish(&self, next: SessionState) {
        let label = next.label();
        let previous = self.state.send_replace(next);
        if previous.label() != label {
            debug!(from = previous.label(), to = label, "Session state");
        }
    }

    fn lock_resolution(&self) -> MutexGuard<'_, Resolution> {
        self.resolution.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn accept_row(user_id: Uuid, row: &serde_json::Value) -> Resolved {
    match Profile::from_row(row) {
        Ok(profile) if profile.id != user_id => {
            warn!(expected = %user_id, actual = %profile.id, "Profile row belongs to another identity");
            Resolved::Unavailable
        }
        Ok(profile) if !profile.is_active => {
            info!(user_id = %user_id, "Profile is deactivated");
            Resolved::Disabled
        }
        Ok(profile) => Resolved::Authenticated(profile),
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Profile row failed validation");
            Resolved::Unavailable
        }
    }
}

/// Handle for a mounted context's notification listener.
pub struct MountedSession {
    listener: Option<JoinHandle<()>>,
}

impl MountedSession {
    pub fn is_listening(&self) -> bool {
        self.listener.as_ref().is_some_and(|l| !l.is_finished())
    }

    /// Stop listening and release the subscription before returning.
    pub async fn unmount(mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            let _ = listener.await;
        }
        debug!("Session context unmounted");
    }
}

impl Drop for MountedSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
