// Auth endpoints: /auth/v1/*

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::require_caller;
use super::store::{Account, NewAccount};
use super::DevServerState;
use crate::auth::claims::{generate_jwt, Claims};
use crate::error::ApiError;
use crate::session::validate::{normalize_phone, validate_email_format};

#[derive(Debug, Default, Deserialize)]
pub struct SignupMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub data: SignupMetadata,
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub grant_type: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordGrant {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshGrant {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub email: String,
    pub token: String,
}

/// POST /auth/v1/signup
///
/// With email confirmation on, answers with the bare user and logs the
/// confirmation code; otherwise the account is confirmed and signed in at once.
pub async fn signup(
    State(state): State<DevServerState>,
    Json(payload): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_email_format(&payload.email).map_err(|msg| ApiError::field_error("email", msg))?;
    if payload.password.chars().count() < state.config.min_password_length {
        return Err(ApiError::unprocessable_entity(format!(
            "Password should be at least {} characters",
            state.config.min_password_length
        )));
    }

    let confirmed = !state.config.require_email_confirmation;
    let store = Arc::clone(&state.store);
    let account = blocking(move || {
        store.create_account(NewAccount {
            email: &payload.email,
            password: &payload.password,
            full_name: payload.data.full_name.as_deref().unwrap_or_default(),
            phone: normalize_phone(payload.data.phone.as_deref()),
            confirmed,
        })
    })
    .await?;

    if confirmed {
        tracing::info!(user_id = %account.id, "account created and confirmed");
        return issue_session(&state, &account).map(Json);
    }

    if let Some(code) = state.store.confirmation_token(&account.email) {
        tracing::info!(user_id = %account.id, email = %account.email, code = %code, "confirmation code issued");
    }
    Ok(Json(account.to_user_json()))
}

/// POST /auth/v1/token?grant_type=password|refresh_token
pub async fn token(
    State(state): State<DevServerState>,
    Query(params): Query<TokenParams>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    match params.grant_type.as_str() {
        "password" => {
            let grant: PasswordGrant =
                serde_json::from_value(body).map_err(|_| ApiError::invalid_grant("Email and password are required"))?;
            let store = Arc::clone(&state.store);
            let email = grant.email.clone();
            let account = blocking(move || store.authenticate(&grant.email, &grant.password))
                .await
                .map_err(|e| {
                    tracing::info!(email = %email, "password grant refused");
                    e
                })?;
            tracing::info!(user_id = %account.id, "password grant accepted");
            issue_session(&state, &account).map(Json)
        }
        "refresh_token" => {
            let grant: RefreshGrant =
                serde_json::from_value(body).map_err(|_| ApiError::invalid_grant("refresh_token is required"))?;
            let (account, session_id, refresh_token) = state.store.rotate_refresh_token(&grant.refresh_token)?;
            tracing::debug!(user_id = %account.id, "refresh token rotated");
            session_payload(&state, &account, session_id, refresh_token).map(Json)
        }
        other => Err(ApiError::bad_request(format!("Unsupported grant_type: {}", other))),
    }
}

/// POST /auth/v1/logout
pub async fn logout(State(state): State<DevServerState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let caller = require_caller(&state, &headers)?;
    state.store.end_session(caller.session_id);
    tracing::info!(user_id = %caller.user_id, "session ended");
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /auth/v1/user
pub async fn user(State(state): State<DevServerState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    let caller = require_caller(&state, &headers)?;
    let account = state
        .store
        .account(caller.user_id)
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(account.to_user_json()))
}

/// POST /auth/v1/verify
pub async fn verify(
    State(state): State<DevServerState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.kind != "signup" {
        return Err(ApiError::bad_request(format!("Unsupported verification type: {}", payload.kind)));
    }

    let account = state.store.confirm_email(&payload.email, &payload.token)?;
    tracing::info!(user_id = %account.id, "email confirmed");
    issue_session(&state, &account).map(Json)
}

fn issue_session(state: &DevServerState, account: &Account) -> Result<Value, ApiError> {
    let (session_id, refresh_token) = state.store.open_session(account.id);
    session_payload(state, account, session_id, refresh_token)
}

fn session_payload(
    state: &DevServerState,
    account: &Account,
    session_id: uuid::Uuid,
    refresh_token: String,
) -> Result<Value, ApiError> {
    let claims = Claims::new(account.id, account.email.clone(), session_id, state.config.jwt_expiry_secs);
    let access_token = generate_jwt(&claims, &state.config.jwt_secret)?;

    Ok(json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": state.config.jwt_expiry_secs,
        "expires_at": claims.exp,
        "refresh_token": refresh_token,
        "user": account.to_user_json(),
    }))
}

/// Password hashing is CPU-bound; keep it off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Task join error: {}", e)))?
}
