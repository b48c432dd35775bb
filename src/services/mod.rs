pub mod auth_service;
pub mod refresh_rotation_service;

pub use auth_service::{AuthService, LoginOutcome};
pub use refresh_rotation_service::{IssuedRefreshToken, RefreshRotationService, RotatedTokens};
