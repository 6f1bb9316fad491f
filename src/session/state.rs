use std::fmt;

use crate::profile::{Profile, Role};

/// What the context currently knows about the user
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Not mounted yet
    #[default]
    Uninitialized,
    /// Resolving a session or fetching its profile
    Loading,
    Anonymous,
    Authenticated(Profile),
}

impl SessionState {
    /// Consumers must not redirect while this is true; nothing is known yet.
    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Uninitialized | SessionState::Loading)
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, SessionState::Anonymous)
    }

    pub fn is_authenticated(&self) -> bool {
        self.profile().is_some()
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            SessionState::Authenticated(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.profile().is_some_and(|p| p.has_role(role))
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Loading => "loading",
            SessionState::Anonymous => "anonymous",
            SessionState::Authenticated(_) => "authenticated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Authenticated(profile) => write!(f, "authenticated as {} ({})", profile.email, profile.role),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_role_flags_need_a_profile() {
        for state in [SessionState::Uninitialized, SessionState::Loading, SessionState::Anonymous] {
            assert!(!state.is_authenticated());
            for role in Role::ALL {
                assert!(!state.has_role(role));
            }
        }

        let mut profile = Profile::new(Uuid::new_v4(), "Ada", "ada@example.com", None);
        profile.role = Role::Admin;
        let state = SessionState::Authenticated(profile);
        assert!(state.is_authenticated());
        assert!(state.has_role(Role::Admin));
        assert!(!state.has_role(Role::Agent));
        assert!(!state.is_loading());
    }

    #[test]
    fn test_uninitialized_counts_as_loading() {
        assert!(SessionState::default().is_loading());
        assert!(SessionState::Loading.is_loading());
        assert!(!SessionState::Anonymous.is_loading());
    }
}
