pub mod auth_handler;
pub mod health_handler;

pub use auth_handler::{
    csrf, delete_account, login, logout, profile, refresh, register, update_profile,
};
pub use health_handler::{health_check, health_check_ready};
