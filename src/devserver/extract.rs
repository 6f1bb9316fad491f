use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use super::DevServerState;
use crate::auth::claims::validate_jwt;
use crate::error::ApiError;
use crate::profile::Role;

/// Signed-in caller, taken from a valid access token on a live session
#[derive(Clone, Debug)]
pub struct Caller {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub email: String,
}

/// Every `/auth/v1` and `/rest/v1` request must present the project's anon key.
pub async fn require_api_key(
    State(state): State<DevServerState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = request
        .headers()
        .get("apikey")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("No API key found in request"))?;

    if presented != state.config.anon_key {
        return Err(ApiError::unauthorized("Invalid API key"));
    }

    Ok(next.run(request).await)
}

/// Resolve the bearer token. The anon key itself (or no header) means an anonymous caller.
pub fn optional_caller(state: &DevServerState, headers: &HeaderMap) -> Result<Option<Caller>, ApiError> {
    let Some(token) = extract_bearer(headers)? else {
        return Ok(None);
    };
    if token == state.config.anon_key {
        return Ok(None);
    }

    let claims = validate_jwt(&token, &state.config.jwt_secret)?;
    if !state.store.is_session_active(claims.session_id) {
        return Err(ApiError::unauthorized("Session not found"));
    }

    Ok(Some(Caller {
        user_id: claims.sub,
        session_id: claims.session_id,
        email: claims.email,
    }))
}

pub fn require_caller(state: &DevServerState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    optional_caller(state, headers)?.ok_or_else(|| ApiError::unauthorized("This endpoint requires a valid Bearer token"))
}

/// Active admin profile behind the caller
pub fn is_admin(state: &DevServerState, caller: &Caller) -> bool {
    state
        .store
        .profile(caller.user_id)
        .is_some_and(|p| p.is_active && p.has_role(Role::Admin))
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty bearer token")),
        None => Err(ApiError::unauthorized("Authorization header must use Bearer token format")),
    }
}
