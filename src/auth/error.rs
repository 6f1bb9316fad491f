use thiserror::Error;

use super::store::StoreError;

/// Failures surfaced by the session context and the auth service clients
#[derive(Debug, Error)]
pub enum AuthError {
    /// Rejected locally before any request was made
    #[error("{0}")]
    Validation(String),

    /// Bad email/password, unconfirmed email, or an unusable refresh token.
    /// Carries the service's own wording, which does not say whether the account exists.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Any other 4xx (duplicate account, weak password, forbidden ...)
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// 5xx or throttling from the service
    #[error("Auth service unavailable ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response from auth service: {0}")]
    Decode(String),

    #[error("Profile unavailable for this account")]
    ProfileUnavailable,

    #[error("This account has been deactivated")]
    AccountDisabled,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Session storage error: {0}")]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        AuthError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn service(status: u16, message: impl Into<String>) -> Self {
        AuthError::Service {
            status,
            message: message.into(),
        }
    }

    /// Caller-facing message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Worth retrying: the request may succeed if repeated later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Service { .. })
    }

    /// HTTP status reported by the service, if the failure came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthError::Rejected { status, .. } | AuthError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short machine-readable code for JSON output
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Validation(_) => "VALIDATION_ERROR",
            AuthError::InvalidCredentials(_) => "INVALID_CREDENTIALS",
            AuthError::Rejected { .. } => "REJECTED",
            AuthError::Service { .. } => "SERVICE_UNAVAILABLE",
            AuthError::Network(_) => "NETWORK_ERROR",
            AuthError::Decode(_) => "BAD_RESPONSE",
            AuthError::ProfileUnavailable => "PROFILE_UNAVAILABLE",
            AuthError::AccountDisabled => "ACCOUNT_DISABLED",
            AuthError::NotAuthenticated => "NOT_AUTHENTICATED",
            AuthError::Store(_) => "SESSION_STORE_ERROR",
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::Decode(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        AuthError::Validation(format!("Invalid backend URL: {}", err))
    }
}
