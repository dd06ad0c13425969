//! Caller identity handed in by the authorization layer.
//!
//! Token format and issuance live outside the core; the engine only needs
//! the authenticated user id and role.

use super::enrollment::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated principal for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: ParticipantId,
    pub role: Role,
}

impl Caller {
    pub fn student(user_id: ParticipantId) -> Self {
        Self {
            user_id,
            role: Role::Student,
        }
    }

    pub fn admin(user_id: ParticipantId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }
}
