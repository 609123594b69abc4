use crate::db::models::{Role, User};
use crate::error::{AppError, AppResult};

/// A signed-in user as seen by a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub nickname: String,
    pub role: Role,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            nickname: user.nickname.clone(),
            role: user.role,
        }
    }
}

/// Who is making the request. Passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    User(Principal),
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }

    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::User(principal) => Some(principal),
            Identity::Anonymous => None,
        }
    }

    /// The principal, or `Unauthorized` for anonymous callers.
    pub fn require(&self) -> AppResult<&Principal> {
        self.principal().ok_or(AppError::Unauthorized)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.principal().map(|p| p.nickname.as_str())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.principal().map(|p| p.user_id)
    }

    pub fn is_admin(&self) -> bool {
        self.principal().is_some_and(|p| p.role == Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_not_authenticated() {
        let identity = Identity::Anonymous;
        assert!(!identity.is_authenticated());
        assert!(!identity.is_admin());
        assert!(identity.nickname().is_none());
        assert!(matches!(identity.require(), Err(AppError::Unauthorized)));
    }

    #[test]
    fn user_identity_exposes_principal() {
        let identity = Identity::User(Principal {
            user_id: 7,
            nickname: "root".into(),
            role: Role::Admin,
        });
        assert!(identity.is_authenticated());
        assert!(identity.is_admin());
        assert_eq!(identity.nickname(), Some("root"));
        assert_eq!(identity.require().unwrap().user_id, 7);
    }
}
