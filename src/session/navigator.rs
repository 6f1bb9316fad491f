use std::sync::{Mutex, PoisonError};

use crate::config::AuthConfig;
use crate::profile::Role;

/// Page router seam. The context only navigates right after sign-up, sign-in and sign-out.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigation targets, taken from [`AuthConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct Routes {
    pub post_signup: String,
    pub post_login: String,
    pub admin_home: String,
    pub agent_home: String,
    pub landing: String,
}

impl Routes {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            post_signup: config.post_signup_route.clone(),
            post_login: config.post_login_route.clone(),
            admin_home: config.admin_home_route.clone(),
            agent_home: config.agent_home_route.clone(),
            landing: config.landing_route.clone(),
        }
    }

    pub fn after_sign_in(&self, role: Role) -> &str {
        match role {
            Role::Admin => &self.admin_home,
            Role::Agent => &self.agent_home,
            Role::Client => &self.post_login,
        }
    }
}

/// Logs navigation; for headless hosts with no router.
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, route: &str) {
        tracing::info!(route, "navigate");
    }
}

/// Remembers every route it was sent to
#[derive(Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).last().cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}
