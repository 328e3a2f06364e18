//! Authenticated session and its provider
//!
//! A [`Session`] is only ever constructed through [`Session::new`] or
//! [`Session::from_login`], so a live session always has a token and a role
//! that agrees with the backend's admin flag. Code that holds one does not
//! re-check either.

use crate::error::SessionError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Which portal a user may enter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Finance,
}

impl Role {
    /// Role implied by the backend's admin flag
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            Role::Finance
        } else {
            Role::Student
        }
    }
}

/// Backend response to a successful login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub role: Role,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    user: SessionUser,
}

impl Session {
    pub fn new(token: impl Into<String>, user: SessionUser) -> Result<Self, SessionError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SessionError::EmptyToken);
        }
        if user.role != Role::from_admin_flag(user.is_admin) {
            return Err(SessionError::RoleMismatch {
                role: user.role,
                is_admin: user.is_admin,
            });
        }
        Ok(Self { token, user })
    }

    /// Session for the user the backend just authenticated
    pub fn from_login(response: LoginResponse) -> Result<Self, SessionError> {
        let user = SessionUser {
            id: response.user_id,
            username: response.username,
            email: response.email,
            is_admin: response.is_admin,
            role: Role::from_admin_flag(response.is_admin),
        };
        Self::new(response.access_token, user)
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("user", &self.user)
            .finish()
    }
}

/// Shared holder for the current session
///
/// Cloning the provider shares the same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionProvider {
    current: Arc<RwLock<Option<Arc<Session>>>>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever session was loaded
    pub fn load(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        *self.current.write() = Some(session.clone());
        session
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }

    pub fn current(&self) -> Option<Arc<Session>> {
        self.current.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|session| session.token().to_string())
    }

    /// The current session, provided it carries `role`
    pub fn require(&self, role: Role) -> Result<Arc<Session>, SessionError> {
        let session = self.current().ok_or(SessionError::NotAuthenticated)?;
        if session.role() != role {
            return Err(SessionError::AccessDenied {
                required: role,
                actual: session.role(),
            });
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn login(is_admin: bool) -> LoginResponse {
        LoginResponse {
            access_token: "tok-123".to_string(),
            user_id: 7,
            username: "jsmith".to_string(),
            is_admin,
            email: Some("jsmith@example.edu".to_string()),
        }
    }

    #[test]
    fn test_role_follows_admin_flag() {
        assert_eq!(Session::from_login(login(true)).unwrap().role(), Role::Finance);
        assert_eq!(Session::from_login(login(false)).unwrap().role(), Role::Student);
    }

    #[test]
    fn test_inconsistent_role_rejected() {
        let user = SessionUser {
            id: 1,
            username: "x".to_string(),
            email: None,
            is_admin: false,
            role: Role::Finance,
        };
        assert_eq!(
            Session::new("tok", user),
            Err(SessionError::RoleMismatch {
                role: Role::Finance,
                is_admin: false
            })
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let mut response = login(false);
        response.access_token = "  ".to_string();
        assert_eq!(Session::from_login(response), Err(SessionError::EmptyToken));
    }

    #[test]
    fn test_provider_lifecycle() {
        let provider = SessionProvider::new();
        assert_eq!(provider.require(Role::Student).unwrap_err(), SessionError::NotAuthenticated);

        let shared = provider.clone();
        provider.load(Session::from_login(login(false)).unwrap());
        assert!(shared.is_authenticated());
        assert_eq!(shared.token().as_deref(), Some("tok-123"));
        assert_eq!(shared.require(Role::Student).unwrap().user().id, 7);
        assert_eq!(
            shared.require(Role::Finance).unwrap_err(),
            SessionError::AccessDenied {
                required: Role::Finance,
                actual: Role::Student
            }
        );

        provider.clear();
        assert!(shared.current().is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let session = Session::from_login(login(true)).unwrap();
        assert!(!format!("{:?}", session).contains("tok-123"));
    }
}
