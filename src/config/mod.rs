use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub auth: AuthConfig,
    pub devserver: DevServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Where the hosted auth/database service lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

/// Client-side session behaviour and navigation targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub min_password_length: usize,
    pub profile_fetch_attempts: u32,
    pub profile_retry_backoff_ms: u64,
    pub refresh_margin_secs: i64,
    pub post_signup_route: String,
    pub post_login_route: String,
    pub admin_home_route: String,
    pub agent_home_route: String,
    pub landing_route: String,
}

/// In-memory stand-in for the hosted service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevServerConfig {
    pub port: u16,
    pub anon_key: String,
    pub jwt_secret: String,
    pub jwt_expiry_secs: i64,
    pub min_password_length: usize,
    /// bcrypt work factor for stored passwords
    pub password_hash_cost: u32,
    pub require_email_confirmation: bool,
    pub seed_admin_email: Option<String>,
    pub seed_admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides looked up by variable name; unparsable values keep the preset.
    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Backend overrides
        if let Some(v) = var("REALTY_BACKEND_URL") {
            self.backend.url = v;
        }
        if let Some(v) = var("REALTY_ANON_KEY") {
            self.backend.anon_key = v;
        }
        if let Some(v) = var("REALTY_REQUEST_TIMEOUT_SECS") {
            self.backend.request_timeout_secs = v.parse().unwrap_or(self.backend.request_timeout_secs);
        }

        // Auth overrides
        // Shared by the client checks and the dev server unless the latter is set below
        if let Some(v) = var("AUTH_MIN_PASSWORD_LENGTH") {
            self.auth.min_password_length = v.parse().unwrap_or(self.auth.min_password_length);
            self.devserver.min_password_length = self.auth.min_password_length;
        }
        if let Some(v) = var("AUTH_PROFILE_FETCH_ATTEMPTS") {
            self.auth.profile_fetch_attempts = v.parse().unwrap_or(self.auth.profile_fetch_attempts);
        }
        if let Some(v) = var("AUTH_PROFILE_RETRY_BACKOFF_MS") {
            self.auth.profile_retry_backoff_ms = v.parse().unwrap_or(self.auth.profile_retry_backoff_ms);
        }
        if let Some(v) = var("AUTH_REFRESH_MARGIN_SECS") {
            self.auth.refresh_margin_secs = v.parse().unwrap_or(self.auth.refresh_margin_secs);
        }
        if let Some(v) = var("AUTH_POST_SIGNUP_ROUTE") {
            self.auth.post_signup_route = v;
        }
        if let Some(v) = var("AUTH_POST_LOGIN_ROUTE") {
            self.auth.post_login_route = v;
        }
        if let Some(v) = var("AUTH_ADMIN_HOME_ROUTE") {
            self.auth.admin_home_route = v;
        }
        if let Some(v) = var("AUTH_AGENT_HOME_ROUTE") {
            self.auth.agent_home_route = v;
        }
        if let Some(v) = var("AUTH_LANDING_ROUTE") {
            self.auth.landing_route = v;
        }

        // Dev server overrides
        if let Some(v) = var("REALTY_DEVSERVER_PORT").or_else(|| var("PORT")) {
            self.devserver.port = v.parse().unwrap_or(self.devserver.port);
        }
        if let Some(v) = var("REALTY_DEVSERVER_ANON_KEY") {
            self.devserver.anon_key = v;
        }
        if let Some(v) = var("REALTY_JWT_SECRET") {
            self.devserver.jwt_secret = v;
        }
        if let Some(v) = var("REALTY_JWT_EXPIRY_SECS") {
            self.devserver.jwt_expiry_secs = v.parse().unwrap_or(self.devserver.jwt_expiry_secs);
        }
        if let Some(v) = var("REALTY_DEVSERVER_MIN_PASSWORD_LENGTH") {
            self.devserver.min_password_length = v.parse().unwrap_or(self.devserver.min_password_length);
        }
        if let Some(v) = var("REALTY_PASSWORD_HASH_COST") {
            self.devserver.password_hash_cost = v.parse().unwrap_or(self.devserver.password_hash_cost);
        }
        if let Some(v) = var("REALTY_REQUIRE_EMAIL_CONFIRMATION") {
            self.devserver.require_email_confirmation =
                v.parse().unwrap_or(self.devserver.require_email_confirmation);
        }
        if let Some(v) = var("REALTY_SEED_ADMIN_EMAIL") {
            self.devserver.seed_admin_email = Some(v);
        }
        if let Some(v) = var("REALTY_SEED_ADMIN_PASSWORD") {
            self.devserver.seed_admin_password = Some(v);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: "dev-anon-key".to_string(),
                request_timeout_secs: 30,
            },
            auth: AuthConfig::default(),
            devserver: DevServerConfig {
                port: 54321,
                anon_key: "dev-anon-key".to_string(),
                jwt_secret: "dev-jwt-secret-change-me".to_string(),
                jwt_expiry_secs: 60 * 60, // 1 hour
                min_password_length: 6,
                password_hash_cost: 10,
                require_email_confirmation: false,
                seed_admin_email: None,
                seed_admin_password: None,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.backend.url = "https://staging-db.example.com".to_string();
        config.backend.anon_key = String::new();
        config.backend.request_timeout_secs = 15;
        config.auth.profile_fetch_attempts = 3;
        config.devserver.password_hash_cost = bcrypt::DEFAULT_COST;
        config.devserver.require_email_confirmation = true;
        config.devserver.jwt_secret = String::new();
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.backend.url = "https://db.example.com".to_string();
        config.backend.anon_key = String::new();
        config.backend.request_timeout_secs = 10;
        config.auth.profile_fetch_attempts = 3;
        config.auth.profile_retry_backoff_ms = 500;
        config.devserver.password_hash_cost = bcrypt::DEFAULT_COST;
        config.devserver.require_email_confirmation = true;
        config.devserver.jwt_secret = String::new();
        config
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            min_password_length: 6,
            profile_fetch_attempts: 2,
            profile_retry_backoff_ms: 200,
            refresh_margin_secs: 60,
            post_signup_route: "/verify-email".to_string(),
            post_login_route: "/".to_string(),
            admin_home_route: "/admin".to_string(),
            agent_home_route: "/agent/dashboard".to_string(),
            landing_route: "/".to_string(),
        }
    }
}

impl Default for DevServerConfig {
    fn default() -> Self {
        AppConfig::development().devserver
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
