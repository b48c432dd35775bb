pub mod refresh_token;
pub mod user;

pub use refresh_token::{generate_token_id, RefreshTokenRecord};
pub use user::{normalize_email, NewUser, ProfileUpdate, User, UserRole};
