use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Persisted registry entry for one issued refresh token. Records are never
/// deleted so that reuse of a rotated token can be recognised.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RefreshTokenRecord {
    pub token_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub replaced_by_token_id: Option<String>,
}

impl RefreshTokenRecord {
    pub fn new(token_id: String, user_id: String, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            token_id,
            user_id,
            created_at: now,
            expires_at: now + ttl,
            revoked: false,
            replaced_by_token_id: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Valid for exactly one rotation.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }

    /// A revoked record with a successor was rotated already; presenting it again is a replay.
    pub fn was_rotated(&self) -> bool {
        self.revoked && self.replaced_by_token_id.is_some()
    }
}

/// 16 random bytes, hex encoded.
pub fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
