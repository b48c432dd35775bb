use actix_web::{http::header::Header, HttpMessage, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};

use crate::{
    auth::{cookies::ACCESS_TOKEN_COOKIE, AccessClaims},
    errors::{AppError, AppResult},
};

/// The single place an access token is read from a request: a Bearer
/// `Authorization` header first, then the access cookie.
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    bearer_token(req).or_else(|| {
        req.cookie(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    Authorization::<Bearer>::parse(req)
        .ok()
        .map(|auth| auth.into_scheme().token().to_string())
        .filter(|t| !t.is_empty())
}

/// Claims attached by the authentication layer.
pub fn current_claims(req: &HttpRequest) -> AppResult<AccessClaims> {
    req.extensions()
        .get::<AccessClaims>()
        .cloned()
        .ok_or_else(|| AppError::Auth("Authentication required".to_string()))
}
