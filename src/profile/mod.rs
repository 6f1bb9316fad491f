use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Authorization level of a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Agent,
    #[default]
    Client,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Agent, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "agent" => Ok(Role::Agent),
            "client" => Ok(Role::Client),
            _ => Err(ProfileError::UnknownRole(s.to_string())),
        }
    }
}

/// Errors raised while turning a raw `profiles` row into a [`Profile`]
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ProfileError {
    #[error("Invalid profile row: {0}")]
    InvalidRow(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid type for field '{field}': expected {expected}")]
    InvalidType { field: &'static str, expected: &'static str },
    #[error("Invalid UUID format for field '{field}': {value}")]
    InvalidUuid { field: &'static str, value: String },
    #[error("Invalid timestamp format for field '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("Unknown role: {0}")]
    UnknownRole(String),
}

/// Application-level user record, keyed by the identity's subject id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Profile as the sign-up trigger creates it: default role, active.
    pub fn new(id: Uuid, full_name: impl Into<String>, email: impl Into<String>, phone: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            full_name: full_name.into(),
            email: email.into(),
            phone,
            role: Role::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate a row returned by the profiles table.
    ///
    /// Every field is checked explicitly; nothing about the wire shape is
    /// trusted. Unknown extra columns are ignored.
    pub fn from_row(row: &Value) -> Result<Self, ProfileError> {
        let map = row
            .as_object()
            .ok_or_else(|| ProfileError::InvalidRow("expected JSON object".to_string()))?;

        let id_raw = required_str(map, "id")?;
        let id = Uuid::parse_str(id_raw).map_err(|_| ProfileError::InvalidUuid {
            field: "id",
            value: id_raw.to_string(),
        })?;

        let role = required_str(map, "role")?.parse::<Role>()?;

        let is_active = match map.get("is_active") {
            None | Some(Value::Null) => return Err(ProfileError::MissingField("is_active")),
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                return Err(ProfileError::InvalidType {
                    field: "is_active",
                    expected: "boolean",
                })
            }
        };

        let phone = match map.get("phone") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(_) => {
                return Err(ProfileError::InvalidType {
                    field: "phone",
                    expected: "string or null",
                })
            }
        };

        Ok(Self {
            id,
            full_name: required_str(map, "full_name")?.to_string(),
            email: required_str(map, "email")?.to_string(),
            phone,
            role,
            is_active,
            created_at: required_timestamp(map, "created_at")?,
            updated_at: required_timestamp(map, "updated_at")?,
        })
    }

    /// Row shape as served by the profiles table
    pub fn to_row(&self) -> Value {
        json!({
            "id": self.id,
            "full_name": self.full_name,
            "email": self.email,
            "phone": self.phone,
            "role": self.role,
            "is_active": self.is_active,
            "created_at": self.created_at.to_rfc3339(),
            "updated_at": self.updated_at.to_rfc3339(),
        })
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

fn required_str<'a>(map: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ProfileError> {
    match map.get(field) {
        None | Some(Value::Null) => Err(ProfileError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(ProfileError::InvalidType {
            field,
            expected: "string",
        }),
    }
}

fn required_timestamp(map: &Map<String, Value>, field: &'static str) -> Result<DateTime<Utc>, ProfileError> {
    let raw = required_str(map, field)?;
    parse_timestamp(raw).ok_or_else(|| ProfileError::InvalidTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Accepts RFC 3339 and the zone-less form postgres emits for `timestamp` columns (read as UTC).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
