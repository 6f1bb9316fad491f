pub mod claims;
pub mod error;
pub mod hosted;
pub mod notifier;
pub mod store;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

pub use error::AuthError;
pub use hosted::{HostedAuthClient, ProfileUpdate};
pub use notifier::{AuthStateNotifier, AuthSubscription};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{AuthChange, AuthEvent, Credentials, Identity, ProfileMetadata, Session};

/// The external auth service: credential checks, session issuance and refresh.
///
/// The session context observes sessions through this trait but never owns
/// their lifecycle.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Point-in-time read of the current session, if any.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    /// Register for push notifications (sign-in elsewhere, refresh, sign-out).
    fn on_auth_state_change(&self) -> AuthSubscription;

    async fn sign_up(&self, credentials: &Credentials, metadata: &ProfileMetadata) -> Result<Identity, AuthError>;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Read access to the `profiles` table.
///
/// Rows come back untyped; callers validate them with
/// [`Profile::from_row`](crate::profile::Profile::from_row).
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// `Ok(None)` when no row exists for `id` (or row-level security hides it).
    async fn fetch_profile(&self, id: Uuid) -> Result<Option<Value>, AuthError>;
}
