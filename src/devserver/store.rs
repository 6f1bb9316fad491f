use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::claims::AUDIENCE;
use crate::auth::ProfileUpdate;
use crate::error::ApiError;
use crate::profile::{Profile, Role};

const INVALID_LOGIN: &str = "Invalid login credentials";

/// Registered identity. Passwords are kept as bcrypt hashes.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    password_hash: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    confirmation_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// User object as the auth endpoints return it
    pub fn to_user_json(&self) -> Value {
        json!({
            "id": self.id,
            "aud": AUDIENCE,
            "role": AUDIENCE,
            "email": self.email,
            "email_confirmed_at": self.email_confirmed_at.map(|t| t.to_rfc3339()),
            "created_at": self.created_at.to_rfc3339(),
            "user_metadata": {
                "full_name": self.full_name,
                "phone": self.phone,
            },
        })
    }

    fn password_matches(&self, password: &str) -> bool {
        match bcrypt::verify(password, &self.password_hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(user_id = %self.id, error = %e, "stored password hash is unreadable");
                false
            }
        }
    }
}

/// New account fields, already validated by the handler
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub phone: Option<String>,
    pub confirmed: bool,
}

struct RefreshGrant {
    user_id: Uuid,
    session_id: Uuid,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    emails: HashMap<String, Uuid>,
    profiles: HashMap<Uuid, Profile>,
    refresh_tokens: HashMap<String, RefreshGrant>,
    sessions: HashSet<Uuid>,
}

/// Users, profiles and sessions for the dev server. Nothing survives a restart.
///
/// Account creation and password checks run bcrypt; call them off the async
/// workers.
pub struct DevStore {
    tables: Mutex<Tables>,
    password_cost: u32,
}

impl DevStore {
    /// `cost` is the bcrypt work factor (4..=31).
    pub fn with_password_cost(cost: u32) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            password_cost: cost,
        }
    }

    /// Insert the identity and the profile row the sign-up trigger would create.
    pub fn create_account(&self, new: NewAccount<'_>) -> Result<Account, ApiError> {
        let email = normalize_email(new.email);
        if self.lock().emails.contains_key(&email) {
            return Err(ApiError::unprocessable_entity("User already registered"));
        }

        // Hash outside the lock; the insert below re-checks the email.
        let password_hash = bcrypt::hash(new.password, self.password_cost).map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::internal_server_error("Failed to store password")
        })?;

        let mut tables = self.lock();
        if tables.emails.contains_key(&email) {
            return Err(ApiError::unprocessable_entity("User already registered"));
        }

        let now = Utc::now();
        let account = Account {
            id: Uuid::new_v4(),
            email: email.clone(),
            full_name: new.full_name.trim().to_string(),
            phone: new.phone,
            password_hash,
            email_confirmed_at: new.confirmed.then_some(now),
            confirmation_token: (!new.confirmed).then(confirmation_code),
            created_at: now,
        };

        let profile = Profile::new(account.id, account.full_name.clone(), email.clone(), account.phone.clone());
        tables.emails.insert(email, account.id);
        tables.profiles.insert(account.id, profile);
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    /// Check a password grant. Unknown email and wrong password read the same.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        let account = {
            let tables = self.lock();
            tables
                .emails
                .get(&normalize_email(email))
                .and_then(|id| tables.accounts.get(id))
                .cloned()
        };
        let account = account
            .filter(|account| account.password_matches(password))
            .ok_or_else(|| ApiError::invalid_grant(INVALID_LOGIN))?;

        if account.email_confirmed_at.is_none() {
            return Err(ApiError::invalid_grant("Email not confirmed"));
        }
        Ok(account)
    }

    pub fn confirm_email(&self, email: &str, token: &str) -> Result<Account, ApiError> {
        let mut guard = self.lock();
        let tables = &mut *guard;
        let account = tables
            .emails
            .get(&normalize_email(email))
            .and_then(|id| tables.accounts.get_mut(id))
            .filter(|account| account.confirmation_token.as_deref() == Some(token.trim()))
            .ok_or_else(|| ApiError::forbidden("Token has expired or is invalid"))?;

        account.confirmation_token = None;
        account.email_confirmed_at = Some(Utc::now());
        Ok(account.clone())
    }

    /// Pending confirmation code for an unconfirmed account
    pub fn confirmation_token(&self, email: &str) -> Option<String> {
        let tables = self.lock();
        let id = tables.emails.get(&normalize_email(email))?;
        tables.accounts.get(id)?.confirmation_token.clone()
    }

    pub fn account(&self, id: Uuid) -> Option<Account> {
        self.lock().accounts.get(&id).cloned()
    }

    /// Start a session; returns its id and first refresh token.
    pub fn open_session(&self, user_id: Uuid) -> (Uuid, String) {
        let session_id = Uuid::new_v4();
        let refresh_token = new_refresh_token();
        let mut tables = self.lock();
        tables.sessions.insert(session_id);
        tables
            .refresh_tokens
            .insert(refresh_token.clone(), RefreshGrant { user_id, session_id });
        (session_id, refresh_token)
    }

    /// Single-use: the presented token is consumed and a new one issued for the same session.
    pub fn rotate_refresh_token(&self, refresh_token: &str) -> Result<(Account, Uuid, String), ApiError> {
        let mut tables = self.lock();
        let grant = tables
            .refresh_tokens
            .remove(refresh_token)
            .filter(|grant| tables.sessions.contains(&grant.session_id))
            .ok_or_else(|| ApiError::invalid_grant("Invalid Refresh Token: Refresh Token Not Found"))?;

        let account = tables
            .accounts
            .get(&grant.user_id)
            .cloned()
            .ok_or_else(|| ApiError::invalid_grant("User not found"))?;

        let next = new_refresh_token();
        let session_id = grant.session_id;
        tables.refresh_tokens.insert(next.clone(), grant);
        Ok((account, session_id, next))
    }

    pub fn end_session(&self, session_id: Uuid) {
        let mut tables = self.lock();
        tables.sessions.remove(&session_id);
        tables.refresh_tokens.retain(|_, grant| grant.session_id != session_id);
    }

    pub fn is_session_active(&self, session_id: Uuid) -> bool {
        self.lock().sessions.contains(&session_id)
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.lock().profiles.get(&id).cloned()
    }

    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Option<Profile> {
        let mut tables = self.lock();
        let profile = tables.profiles.get_mut(&id)?;
        if let Some(role) = update.role {
            profile.role = role;
        }
        if let Some(is_active) = update.is_active {
            profile.is_active = is_active;
        }
        if let Some(full_name) = &update.full_name {
            profile.full_name = full_name.trim().to_string();
        }
        if let Some(phone) = &update.phone {
            let phone = phone.trim();
            profile.phone = (!phone.is_empty()).then(|| phone.to_string());
        }
        profile.updated_at = Utc::now();
        Some(profile.clone())
    }

    /// Confirmed admin account for bootstrapping role management.
    pub fn seed_admin(&self, email: &str, password: &str) -> Result<Account, ApiError> {
        let account = self.create_account(NewAccount {
            email,
            password,
            full_name: "Administrator",
            phone: None,
            confirmed: true,
        })?;
        self.update_profile(account.id, &ProfileUpdate::role(Role::Admin));
        Ok(account)
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn new_refresh_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Six-digit code as sent in the confirmation email
fn confirmation_code() -> String {
    format!("{:06}", Uuid::new_v4().as_u128() % 1_000_000)
}
