//! Caller identity and ownership rules.

use common::UserId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Role granted to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The authenticated identity on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::User,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Requires the caller to be `user` itself. Admins get no exemption.
    pub fn ensure_is(&self, user: UserId) -> Result<(), DomainError> {
        if self.user_id == user {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "you can only act on your own account".to_string(),
            ))
        }
    }

    /// Requires the caller to own the record or hold the admin role.
    pub fn ensure_owner_or_admin(&self, owner: UserId) -> Result<(), DomainError> {
        if self.user_id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden(
                "you can only view your own orders".to_string(),
            ))
        }
    }

    pub fn ensure_admin(&self) -> Result<(), DomainError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(DomainError::Forbidden("admin role required".to_string()))
        }
    }
}
