//! REST client for the hosted auth/database service.
//!
//! Speaks the service's GoTrue-style auth endpoints (`/auth/v1/*`) and its
//! PostgREST-style table endpoints (`/rest/v1/*`). The current session is
//! cached in memory, persisted through a [`SessionStore`], refreshed when it
//! is about to expire, and every change is announced on the client's
//! [`AuthStateNotifier`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{Mutex, MutexGuard};
use url::Url;
use uuid::Uuid;

use super::claims::peek_expiry;
use super::error::AuthError;
use super::notifier::{AuthStateNotifier, AuthSubscription};
use super::store::SessionStore;
use super::types::{AuthChange, AuthEvent, Credentials, Identity, ProfileMetadata, Session};
use super::{AuthService, ProfileRepository};
use crate::config::BackendConfig;
use crate::profile::Role;

/// Columns an update may touch on a profile row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.is_active.is_none() && self.full_name.is_none() && self.phone.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Identity,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs))
            .or_else(|| peek_expiry(&self.access_token))
            .unwrap_or_else(|| Utc::now().timestamp());

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at,
            user: self.user,
        }
    }
}

#[derive(Default)]
struct SessionSlot {
    loaded: bool,
    session: Option<Session>,
}

pub struct HostedAuthClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    refresh_margin_secs: i64,
    store: Arc<dyn SessionStore>,
    slot: Mutex<SessionSlot>,
    notifier: AuthStateNotifier,
}

impl HostedAuthClient {
    pub fn new(
        backend: &BackendConfig,
        refresh_margin_secs: i64,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        let mut base_url = Url::parse(&backend.url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(backend.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            anon_key: backend.anon_key.clone(),
            refresh_margin_secs,
            store,
            slot: Mutex::new(SessionSlot::default()),
            notifier: AuthStateNotifier::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn notifier(&self) -> &AuthStateNotifier {
        &self.notifier
    }

    /// Exchange the refresh token for a new session, whether or not the current one expired.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let mut slot = self.loaded_slot().await;
        let current = slot.session.clone().ok_or(AuthError::NotAuthenticated)?;
        self.rotate(&mut slot, &current).await
    }

    /// Identity behind the current access token, as the service sees it now.
    pub async fn current_user(&self) -> Result<Identity, AuthError> {
        let token = self.access_token().await.ok_or(AuthError::NotAuthenticated)?;
        let url = self.endpoint("auth/v1/user")?;
        let response = self.request(Method::GET, url, Some(&token)).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(response.json::<Identity>().await?)
    }

    /// Complete sign-up confirmation with the emailed token; signs in on success.
    pub async fn verify_email(&self, email: &str, token: &str) -> Result<Session, AuthError> {
        let url = self.endpoint("auth/v1/verify")?;
        let response = self
            .request(Method::POST, url, None)
            .json(&json!({ "type": "signup", "email": email, "token": token }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let session = response.json::<TokenResponse>().await?.into_session();
        self.install(session.clone()).await;
        tracing::info!(user_id = %session.user.id, "email verified");
        Ok(session)
    }

    /// Write through to the profiles table (role change, deactivation, contact details).
    ///
    /// Row-level security decides whether the caller may touch the row. When
    /// the row is the caller's own, a `USER_UPDATED` notification is emitted so
    /// subscribed contexts reload it.
    pub async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Option<Value>, AuthError> {
        if update.is_empty() {
            return Err(AuthError::Validation("Nothing to update".to_string()));
        }

        let session = self.current_session().await.ok_or(AuthError::NotAuthenticated)?;
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));

        let response = self
            .request(Method::PATCH, url, Some(&session.access_token))
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let rows: Vec<Value> = response.json().await?;
        let row = rows.into_iter().next();
        tracing::info!(profile_id = %id, updated = row.is_some(), "profile update written");

        if row.is_some() && session.user.id == id {
            self.notifier.emit(AuthChange::new(AuthEvent::UserUpdated, Some(session)));
        }
        Ok(row)
    }

    async fn current_session(&self) -> Option<Session> {
        self.loaded_slot().await.session.clone()
    }

    async fn access_token(&self) -> Option<String> {
        self.current_session().await.map(|s| s.access_token)
    }

    async fn loaded_slot(&self) -> MutexGuard<'_, SessionSlot> {
        let mut slot = self.slot.lock().await;
        if !slot.loaded {
            slot.session = match self.store.load() {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable persisted session");
                    if let Err(e) = self.store.clear() {
                        tracing::warn!(error = %e, "failed to clear persisted session");
                    }
                    None
                }
            };
            slot.loaded = true;
        }
        slot
    }

    /// Store a freshly issued session and announce it.
    async fn install(&self, session: Session) {
        let mut slot = self.slot.lock().await;
        self.persist(&session);
        slot.session = Some(session.clone());
        slot.loaded = true;
        drop(slot);
        self.notifier.emit(AuthChange::signed_in(session));
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(session) {
            tracing::warn!(error = %e, "failed to persist session; it will not survive a restart");
        }
    }

    fn forget(&self, slot: &mut SessionSlot) {
        slot.session = None;
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
    }

    /// Refresh `current` while holding the slot. A definitive rejection ends the session.
    async fn rotate(&self, slot: &mut SessionSlot, current: &Session) -> Result<Session, AuthError> {
        let url = self.endpoint("auth/v1/token?grant_type=refresh_token")?;
        let result = match self
            .request(Method::POST, url, None)
            .json(&json!({ "refresh_token": current.refresh_token }))
            .send()
            .await
        {
            Ok(response) => token_session(response).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(fresh) => {
                self.persist(&fresh);
                slot.session = Some(fresh.clone());
                tracing::debug!(user_id = %fresh.user.id, expires_at = fresh.expires_at, "session refreshed");
                self.notifier.emit(AuthChange::token_refreshed(fresh.clone()));
                Ok(fresh)
            }
            Err(e) if e.is_transient() => Err(e),
            Err(e) => {
                tracing::info!(error = %e, "refresh token rejected; session ended");
                self.forget(slot);
                self.notifier.emit(AuthChange::signed_out());
                Err(e)
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        Ok(self.base_url.join(path)?)
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        tracing::debug!(%method, path = url.path(), "auth service request");
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer.unwrap_or(self.anon_key.as_str()))
    }
}

#[async_trait]
impl AuthService for HostedAuthClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let mut slot = self.loaded_slot().await;
        let Some(current) = slot.session.clone() else {
            return Ok(None);
        };
        if !current.is_expired(self.refresh_margin_secs) {
            return Ok(Some(current));
        }

        tracing::debug!(user_id = %current.user.id, "persisted session expired; refreshing");
        match self.rotate(&mut slot, &current).await {
            Ok(fresh) => Ok(Some(fresh)),
            Err(e) if e.is_transient() => Err(e),
            Err(_) => Ok(None),
        }
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.notifier.subscribe()
    }

    async fn sign_up(&self, credentials: &Credentials, metadata: &ProfileMetadata) -> Result<Identity, AuthError> {
        let url = self.endpoint("auth/v1/signup")?;
        let response = self
            .request(Method::POST, url, None)
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
                "data": metadata,
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: Value = response.json().await?;

        // Services that skip email confirmation answer with a full session
        if body.get("access_token").is_some() {
            let token: TokenResponse =
                serde_json::from_value(body).map_err(|e| AuthError::Decode(e.to_string()))?;
            let session = token.into_session();
            let identity = session.user.clone();
            self.install(session).await;
            return Ok(identity);
        }

        let user = body.get("user").cloned().unwrap_or(body);
        serde_json::from_value(user).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let url = self.endpoint("auth/v1/token?grant_type=password")?;
        let response = self
            .request(Method::POST, url, None)
            .json(credentials)
            .send()
            .await?;

        let session = token_session(response).await?;
        self.install(session.clone()).await;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let session = {
            let mut slot = self.loaded_slot().await;
            let session = slot.session.clone();
            self.forget(&mut slot);
            session
        };
        let Some(session) = session else {
            return Ok(());
        };
        self.notifier.emit(AuthChange::signed_out());

        let url = self.endpoint("auth/v1/logout")?;
        let response = self
            .request(Method::POST, url, Some(&session.access_token))
            .send()
            .await?;

        match response.status().as_u16() {
            s if (200..300).contains(&s) => Ok(()),
            // token already revoked or expired on the service side
            401 | 403 | 404 => Ok(()),
            _ => Err(error_from_response(response).await),
        }
    }
}

#[async_trait]
impl ProfileRepository for HostedAuthClient {
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Value>, AuthError> {
        let token = self.access_token().await;
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id))
            .append_pair("select", "*");

        let response = self.request(Method::GET, url, token.as_deref()).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let rows: Vec<Value> = response.json().await?;
        Ok(rows.into_iter().next())
    }
}

/// Token endpoint response → session; 400/401 mean the grant itself was refused.
async fn token_session(response: Response) -> Result<Session, AuthError> {
    let status = response.status().as_u16();
    if status == 400 || status == 401 {
        return Err(match error_from_response(response).await {
            AuthError::Rejected { message, .. } => AuthError::InvalidCredentials(message),
            other => other,
        });
    }
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(response.json::<TokenResponse>().await?.into_session())
}

async fn error_from_response(response: Response) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    let code = status.as_u16();
    if status.is_server_error() || code == 429 {
        AuthError::service(code, message)
    } else {
        AuthError::rejected(code, message)
    }
}

/// Pull the human-readable message out of the service's error body variants.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
