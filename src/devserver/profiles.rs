// Table endpoint: /rest/v1/profiles
//
// Row-level security as the hosted project configures it: a caller sees
// their own row, admins see every row, anonymous callers see nothing.
// Only admins may change `role` or `is_active`.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::extract::{is_admin, optional_caller, require_caller};
use super::DevServerState;
use crate::auth::ProfileUpdate;
use crate::error::ApiError;

/// GET /rest/v1/profiles?id=eq.{uuid}&select=*
pub async fn select(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let id = id_filter(&params)?;
    let Some(caller) = optional_caller(&state, &headers)? else {
        return Ok(Json(Vec::new()));
    };

    if caller.user_id != id && !is_admin(&state, &caller) {
        return Ok(Json(Vec::new()));
    }

    let rows = state.store.profile(id).map(|p| p.to_row()).into_iter().collect();
    Ok(Json(rows))
}

/// PATCH /rest/v1/profiles?id=eq.{uuid}
pub async fn update(
    State(state): State<DevServerState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(patch): Json<ProfileUpdate>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let id = id_filter(&params)?;
    let caller = require_caller(&state, &headers)?;
    if patch.is_empty() {
        return Err(ApiError::bad_request("Empty update"));
    }

    let admin = is_admin(&state, &caller);
    if caller.user_id != id && !admin {
        return Ok(Json(Vec::new()));
    }
    if (patch.role.is_some() || patch.is_active.is_some()) && !admin {
        return Err(ApiError::forbidden("Only admins may change role or is_active"));
    }

    let rows: Vec<Value> = state.store.update_profile(id, &patch).map(|p| p.to_row()).into_iter().collect();
    tracing::info!(
        profile_id = %id,
        by = %caller.user_id,
        role = ?patch.role,
        is_active = ?patch.is_active,
        matched = rows.len(),
        "profile updated"
    );
    Ok(Json(rows))
}

/// Only the `id=eq.<uuid>` filter is supported.
fn id_filter(params: &HashMap<String, String>) -> Result<Uuid, ApiError> {
    let raw = params
        .get("id")
        .ok_or_else(|| ApiError::bad_request("Filter id=eq.<uuid> is required"))?;
    let value = raw
        .strip_prefix("eq.")
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported filter: id={}", raw)))?;
    Uuid::parse_str(value).map_err(|_| ApiError::field_error("id", format!("Invalid UUID format: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_filter() {
        let id = Uuid::new_v4();
        let mut params = HashMap::new();
        assert!(id_filter(&params).is_err());

        params.insert("id".to_string(), format!("eq.{}", id));
        assert_eq!(id_filter(&params).unwrap(), id);

        params.insert("id".to_string(), format!("neq.{}", id));
        assert!(id_filter(&params).is_err());

        params.insert("id".to_string(), "eq.not-a-uuid".to_string());
        assert_eq!(id_filter(&params).unwrap_err().status_code(), 400);
    }
}
