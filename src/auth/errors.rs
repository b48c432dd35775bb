use thiserror::Error;

/// Failures of the token layer. Kept free of HTTP so the codec and the
/// rotation protocol can be exercised on their own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,

    #[error("invalid token payload")]
    InvalidTokenPayload,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("invalid refresh token payload")]
    InvalidRefreshTokenPayload,

    #[error("refresh token revoked or expired")]
    RefreshTokenRevokedOrExpired,

    #[error("signing secret must be at least 32 characters, got {0}")]
    WeakSecret(usize),

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::InvalidToken | TokenError::InvalidTokenPayload => "INVALID_TOKEN",
            TokenError::InvalidRefreshToken
            | TokenError::InvalidRefreshTokenPayload
            | TokenError::RefreshTokenRevokedOrExpired => "INVALID_REFRESH_TOKEN",
            TokenError::WeakSecret(_) | TokenError::Signing(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// One message per token family: clients never learn which check failed.
    pub fn public_message(&self) -> &'static str {
        match self {
            TokenError::InvalidToken | TokenError::InvalidTokenPayload => {
                "Invalid or expired token"
            }
            TokenError::InvalidRefreshToken
            | TokenError::InvalidRefreshTokenPayload
            | TokenError::RefreshTokenRevokedOrExpired => "Invalid or expired refresh token",
            TokenError::WeakSecret(_) | TokenError::Signing(_) => "Internal server error",
        }
    }

    pub fn is_server_fault(&self) -> bool {
        matches!(self, TokenError::WeakSecret(_) | TokenError::Signing(_))
    }
}
