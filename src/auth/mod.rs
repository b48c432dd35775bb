pub mod claims;
pub mod cookies;
pub mod csrf;
pub mod errors;
pub mod extract;
pub mod jwt;
pub mod password;
pub mod utils;

pub use claims::{AccessClaims, RefreshClaims};
pub use cookies::{SessionCookieWriter, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use csrf::{CsrfGuard, CSRF_COOKIE, CSRF_HEADER};
pub use errors::TokenError;
pub use extract::{current_claims, extract_token};
pub use jwt::TokenCodec;
pub use password::{hash_password, verify_dummy_password, verify_password};
pub use utils::require_role;
