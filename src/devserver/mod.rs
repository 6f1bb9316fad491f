//! In-memory stand-in for the hosted auth/profile service.
//!
//! Serves the same `/auth/v1/*` and `/rest/v1/profiles` endpoints the
//! [`HostedAuthClient`](crate::auth::HostedAuthClient) talks to, so the CLI
//! and the integration tests run without the hosted project.

pub mod auth;
pub mod extract;
pub mod profiles;
pub mod store;

use std::sync::Arc;

use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::DevServerConfig;
use store::DevStore;

#[derive(Clone)]
pub struct DevServerState {
    pub config: Arc<DevServerConfig>,
    pub store: Arc<DevStore>,
}

impl DevServerState {
    /// Fresh store, with the configured admin account seeded if both seed credentials are set.
    pub fn new(config: DevServerConfig) -> Self {
        let store = DevStore::with_password_cost(config.password_hash_cost);
        if let (Some(email), Some(password)) = (&config.seed_admin_email, &config.seed_admin_password) {
            match store.seed_admin(email, password) {
                Ok(account) => tracing::info!(user_id = %account.id, email = %account.email, "seeded admin account"),
                Err(e) => tracing::warn!(error = %e, "failed to seed admin account"),
            }
        }

        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }
}

pub fn router(state: DevServerState) -> Router {
    let api = Router::new()
        .route("/auth/v1/signup", post(auth::signup))
        .route("/auth/v1/token", post(auth::token))
        .route("/auth/v1/logout", post(auth::logout))
        .route("/auth/v1/user", get(auth::user))
        .route("/auth/v1/verify", post(auth::verify))
        .route("/rest/v1/profiles", get(profiles::select).patch(profiles::update))
        .route_layer(middleware::from_fn_with_state(state.clone(), extract::require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "name": "realty-devserver",
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now(),
        }
    }))
}
