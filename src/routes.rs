use actix_web::web;

use crate::{
    app_state::AppState,
    handlers::{self, health_check, health_check_ready},
    middleware::{handler, Pipeline},
    models::domain::UserRole,
};

/// Roles allowed to read and manage their own profile.
pub const PROFILE_ROLES: [UserRole; 4] = [
    UserRole::Student,
    UserRole::Admin,
    UserRole::Creator,
    UserRole::Guest,
];

/// Registers every endpoint. Auth endpoints are built per worker because
/// their pipelines hold `Rc` handlers.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.service(health_check).service(health_check_ready);

    cfg.service(
        web::scope("/auth")
            .route(
                "/login",
                Pipeline::new()
                    .rate_limit(state.auth_limiter.clone())
                    .csrf(state.csrf)
                    .route(web::post(), handler(handlers::login)),
            )
            .route(
                "/register",
                Pipeline::new()
                    .rate_limit(state.auth_limiter.clone())
                    .csrf(state.csrf)
                    .route(web::post(), handler(handlers::register)),
            )
            .route(
                "/refresh",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .route(web::post(), handler(handlers::refresh)),
            )
            .route(
                "/csrf",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .route(web::get(), handler(handlers::csrf)),
            )
            .route(
                "/logout",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .csrf(state.csrf)
                    .route(web::post(), handler(handlers::logout)),
            )
            .route(
                "/profile",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .role(state.codec.clone(), &PROFILE_ROLES)
                    .route(web::get(), handler(handlers::profile)),
            )
            .route(
                "/updateUserProfile",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .csrf(state.csrf)
                    .role(state.codec.clone(), &PROFILE_ROLES)
                    .route(web::put(), handler(handlers::update_profile)),
            )
            .route(
                "/deleteAccount",
                Pipeline::new()
                    .rate_limit(state.api_limiter.clone())
                    .csrf(state.csrf)
                    .role(state.codec.clone(), &PROFILE_ROLES)
                    .route(web::post(), handler(handlers::delete_account)),
            ),
    );
}
