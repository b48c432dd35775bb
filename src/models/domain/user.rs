use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Admin,
    Creator,
    Guest,
    /// Account exists but holds no privileges.
    None,
}

impl UserRole {
    pub const ALL: [UserRole; 5] = [
        UserRole::Student,
        UserRole::Admin,
        UserRole::Creator,
        UserRole::Guest,
        UserRole::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Admin => "admin",
            UserRole::Creator => "creator",
            UserRole::Guest => "guest",
            UserRole::None => "none",
        }
    }

    /// Roles a user may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, UserRole::Student | UserRole::Creator)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for UserRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UserRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// A user account as the auth core sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// A user that has not been persisted yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(full_name: &str, email: &str, role: UserRole, password_hash: String) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            email: normalize_email(email),
            role,
            password_hash,
        }
    }

    pub fn into_user(self, id: String) -> User {
        User {
            id,
            full_name: self.full_name,
            email: self.email,
            role: self.role,
            password_hash: self.password_hash,
            created_at: Some(Utc::now()),
        }
    }
}

/// Fields a user may change on their own account. `None` leaves the stored
/// value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
    }
}

/// Emails are stored lowercased, so lookups must be too.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
