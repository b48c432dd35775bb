use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    auth::{AccessClaims, TokenCodec, TokenError},
    errors::AppResult,
    models::domain::{generate_token_id, RefreshTokenRecord, User},
    repositories::{RefreshTokenRepository, UserRepository},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRefreshToken {
    pub refresh_token: String,
    pub token_id: String,
}

#[derive(Debug, Clone)]
pub struct RotatedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_id: String,
    pub user: User,
}

/// Issues refresh tokens and exchanges each one for a new pair at most once.
pub struct RefreshRotationService {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RefreshTokenRepository>,
    users: Arc<dyn UserRepository>,
}

impl RefreshRotationService {
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn RefreshTokenRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            codec,
            store,
            users,
        }
    }

    pub async fn issue(&self, user_id: &str) -> AppResult<IssuedRefreshToken> {
        self.issue_at(user_id, Utc::now()).await
    }

    async fn issue_at(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<IssuedRefreshToken> {
        let token_id = generate_token_id();
        let refresh_token = self.codec.sign_refresh(user_id, &token_id, now)?;

        self.store
            .create(RefreshTokenRecord::new(
                token_id.clone(),
                user_id.to_string(),
                now,
                self.codec.refresh_ttl(),
            ))
            .await?;

        Ok(IssuedRefreshToken {
            refresh_token,
            token_id,
        })
    }

    pub async fn rotate(&self, presented: &str) -> AppResult<RotatedTokens> {
        self.rotate_at(presented, Utc::now()).await
    }

    /// Exchanges `presented` for a new access/refresh pair.
    ///
    /// The successor record is written before the predecessor is revoked, so
    /// a failure in between leaves the old token usable instead of locking the
    /// user out. The revoke is conditional on the record still being active;
    /// when two calls race on the same token only one of them wins and the
    /// loser's successor is revoked again before anyone sees it.
    pub async fn rotate_at(&self, presented: &str, now: DateTime<Utc>) -> AppResult<RotatedTokens> {
        let claims = self.codec.verify_refresh(presented)?;

        let record = match self.store.find_by_token_id(&claims.jti).await? {
            Some(record) if record.is_active(now) && record.user_id == claims.user_id => record,
            Some(record) => {
                if record.was_rotated() {
                    log::warn!(
                        "Refresh token replay: token {} of user {} was already rotated to {}",
                        record.token_id,
                        record.user_id,
                        record.replaced_by_token_id.as_deref().unwrap_or("-")
                    );
                } else {
                    log::info!(
                        "Refresh token {} presented after revocation or expiry",
                        record.token_id
                    );
                }
                return Err(TokenError::RefreshTokenRevokedOrExpired.into());
            }
            None => {
                log::warn!("Refresh token {} has no record", claims.jti);
                return Err(TokenError::RefreshTokenRevokedOrExpired.into());
            }
        };

        // Role comes from the user record, not the old token.
        let user = match self.users.find_by_id(&record.user_id).await? {
            Some(user) => user,
            None => {
                log::warn!(
                    "Refresh token {} belongs to unknown user {}",
                    record.token_id,
                    record.user_id
                );
                return Err(TokenError::RefreshTokenRevokedOrExpired.into());
            }
        };

        let next = self.issue_at(&user.id, now).await?;

        if !self
            .store
            .revoke_if_active(&record.token_id, &next.token_id, now)
            .await?
        {
            log::warn!(
                "Lost rotation race for refresh token {}; discarding successor {}",
                record.token_id,
                next.token_id
            );
            self.store.revoke(&next.token_id).await?;
            return Err(TokenError::RefreshTokenRevokedOrExpired.into());
        }

        let access_token = self.codec.sign(&AccessClaims::new(
            &user.id,
            user.role,
            now,
            self.codec.access_ttl(),
        ))?;

        log::debug!(
            "Rotated refresh token {} -> {} for user {}",
            record.token_id,
            next.token_id,
            user.id
        );

        Ok(RotatedTokens {
            access_token,
            refresh_token: next.refresh_token,
            token_id: next.token_id,
            user,
        })
    }

    /// Revokes the record behind a presented refresh token. Invalid tokens are
    /// ignored; returns whether a record was revoked.
    pub async fn revoke_presented(&self, presented: &str) -> AppResult<bool> {
        match self.codec.verify_refresh(presented) {
            Ok(claims) => self.store.revoke(&claims.jti).await,
            Err(_) => Ok(false),
        }
    }

    pub async fn revoke(&self, token_id: &str) -> AppResult<bool> {
        self.store.revoke(token_id).await
    }

    pub async fn revoke_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let revoked = self.store.revoke_all_for_user(user_id).await?;
        log::info!("Revoked {} refresh tokens of user {}", revoked, user_id);
        Ok(revoked)
    }
}
