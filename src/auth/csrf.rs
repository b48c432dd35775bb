//! Double-submit CSRF defense: an httpOnly cookie holds the token and
//! state-changing requests must echo it in a header.

use actix_web::{http::Method, HttpRequest};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

const TOKEN_BYTES: usize = 32;

/// Methods that may change state and therefore need a matching token.
pub const PROTECTED_METHODS: [Method; 4] =
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE];

#[derive(Clone, Copy, Debug, Default)]
pub struct CsrfGuard;

/// Token handed out by [`CsrfGuard::issue_if_absent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedCsrfToken {
    pub token: String,
    /// True when the token was just generated and the cookie still has to be set.
    pub is_new: bool,
}

impl CsrfGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    pub fn issue_if_absent(&self, req: &HttpRequest) -> IssuedCsrfToken {
        match cookie_token(req) {
            Some(token) => IssuedCsrfToken {
                token,
                is_new: false,
            },
            None => IssuedCsrfToken {
                token: self.generate(),
                is_new: true,
            },
        }
    }

    /// Both values must be present and equal. The comparison runs in constant
    /// time so the matched prefix length is not observable.
    pub fn validate(&self, header_token: Option<&str>, cookie_token: Option<&str>) -> bool {
        match (header_token, cookie_token) {
            (Some(header), Some(cookie)) if !header.is_empty() && !cookie.is_empty() => {
                bool::from(header.as_bytes().ct_eq(cookie.as_bytes()))
            }
            _ => false,
        }
    }

    pub fn requires_check(&self, method: &Method) -> bool {
        PROTECTED_METHODS.contains(method)
    }

    pub fn validate_request(&self, req: &HttpRequest) -> bool {
        let cookie = cookie_token(req);
        self.validate(header_token(req), cookie.as_deref())
    }
}

pub fn cookie_token(req: &HttpRequest) -> Option<String> {
    req.cookie(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn header_token(req: &HttpRequest) -> Option<&str> {
    req.headers().get(CSRF_HEADER).and_then(|v| v.to_str().ok())
}
