use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{auth::TokenError, models::domain::UserRole};

/// Claims carried by an access token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub role: UserRole,
    pub iat: i64, // Issued at (UTC timestamp)
    pub exp: i64, // Expiration time (UTC timestamp)
}

impl AccessClaims {
    pub fn new(user_id: &str, role: UserRole, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub jti: String, // RefreshTokenRecord.token_id
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn new(user_id: &str, token_id: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id: user_id.to_string(),
            jti: token_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

// Signature-checked but not yet trusted payloads. Fields are loose so that a
// well-signed token with a bad payload can be told apart from a forged one.

#[derive(Debug, Deserialize)]
pub(crate) struct UncheckedAccessClaims {
    #[serde(rename = "userId", default)]
    user_id: Option<Value>,
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
}

impl UncheckedAccessClaims {
    pub(crate) fn check(self) -> Result<AccessClaims, TokenError> {
        let user_id = non_empty_str(self.user_id).ok_or(TokenError::InvalidTokenPayload)?;
        let role = non_empty_str(self.role)
            .and_then(|role| role.parse::<UserRole>().ok())
            .ok_or(TokenError::InvalidTokenPayload)?;

        Ok(AccessClaims {
            user_id,
            role,
            iat: self.iat.unwrap_or_default(),
            exp: self.exp,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UncheckedRefreshClaims {
    #[serde(rename = "userId", default)]
    user_id: Option<Value>,
    #[serde(default)]
    jti: Option<Value>,
    #[serde(default)]
    iat: Option<i64>,
    exp: i64,
}

impl UncheckedRefreshClaims {
    pub(crate) fn check(self) -> Result<RefreshClaims, TokenError> {
        let user_id = non_empty_str(self.user_id).ok_or(TokenError::InvalidRefreshTokenPayload)?;
        let jti = non_empty_str(self.jti).ok_or(TokenError::InvalidRefreshTokenPayload)?;

        Ok(RefreshClaims {
            user_id,
            jti,
            iat: self.iat.unwrap_or_default(),
            exp: self.exp,
        })
    }
}

fn non_empty_str(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}
