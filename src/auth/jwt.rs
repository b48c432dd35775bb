use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::{
        claims::{AccessClaims, RefreshClaims, UncheckedAccessClaims, UncheckedRefreshClaims},
        TokenError,
    },
    config::Config,
    models::domain::UserRole,
};

pub const MIN_SECRET_LEN: usize = 32;

/// Signs and verifies access and refresh tokens (HS256) with the process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(
        secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, TokenError> {
        let secret = secret.expose_secret();
        let len = secret.chars().count();
        if len < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret(len));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TokenError> {
        Self::new(&config.jwt_secret, config.access_token_ttl, config.refresh_token_ttl)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn sign(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Signs a fresh access token for `user_id` valid for the access TTL.
    pub fn issue_access_token(&self, user_id: &str, role: UserRole) -> Result<String, TokenError> {
        self.sign(&AccessClaims::new(user_id, role, Utc::now(), self.access_ttl))
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = decode::<UncheckedAccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                log::debug!("Access token rejected: {}", e);
                TokenError::InvalidToken
            })?;

        data.claims.check()
    }

    pub fn sign_refresh(
        &self,
        user_id: &str,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = RefreshClaims::new(user_id, token_id, now, self.refresh_ttl);

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data = decode::<UncheckedRefreshClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                log::debug!("Refresh token rejected: {}", e);
                TokenError::InvalidRefreshToken
            })?;

        data.claims.check()
    }
}
