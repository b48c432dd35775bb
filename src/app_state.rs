use std::sync::Arc;

use crate::{
    auth::{CsrfGuard, SessionCookieWriter, TokenCodec},
    config::{Config, RateLimitBackend},
    db::Database,
    errors::AppResult,
    rate_limit::{
        InMemoryRateLimitStore, MongoRateLimitStore, RateLimitConfig, RateLimitStore, RateLimiter,
    },
    repositories::{
        MongoRefreshTokenRepository, MongoUserRepository, RefreshTokenRepository, UserRepository,
    },
    services::{AuthService, RefreshRotationService},
};

pub const AUTH_LIMITER: &str = "auth";
pub const API_LIMITER: &str = "api";

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub rotation: Arc<RefreshRotationService>,
    pub codec: Arc<TokenCodec>,
    pub csrf: CsrfGuard,
    pub cookies: SessionCookieWriter,
    pub auth_limiter: Arc<RateLimiter>,
    pub api_limiter: Arc<RateLimiter>,
    pub rate_limit_store: Arc<dyn RateLimitStore>,
    pub db: Option<Database>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let user_repository = Arc::new(MongoUserRepository::new(&db, &config.users_collection));
        user_repository.ensure_indexes().await?;

        let token_repository = Arc::new(MongoRefreshTokenRepository::new(
            &db,
            &config.refresh_tokens_collection,
        ));
        token_repository.ensure_indexes().await?;

        let rate_limit_store: Arc<dyn RateLimitStore> = match config.rate_limit_backend {
            RateLimitBackend::Memory => Arc::new(InMemoryRateLimitStore::new()),
            RateLimitBackend::Mongo => {
                let store = MongoRateLimitStore::new(&db, &config.rate_limits_collection);
                store.ensure_indexes().await?;
                Arc::new(store)
            }
        };
        log::info!("Rate limit counters kept in {:?} store", config.rate_limit_backend);

        Self::from_parts(
            config,
            user_repository,
            token_repository,
            rate_limit_store,
            Some(db),
        )
    }

    /// Wires the services around already-built storage.
    pub fn from_parts(
        config: Config,
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        rate_limit_store: Arc<dyn RateLimitStore>,
        db: Option<Database>,
    ) -> AppResult<Self> {
        config.validate()?;

        let codec = Arc::new(TokenCodec::from_config(&config)?);
        let rotation = Arc::new(RefreshRotationService::new(
            Arc::clone(&codec),
            refresh_tokens,
            Arc::clone(&users),
        ));
        let auth_service = Arc::new(AuthService::new(
            users,
            Arc::clone(&codec),
            Arc::clone(&rotation),
        ));

        let auth_limiter = Arc::new(RateLimiter::new(
            AUTH_LIMITER,
            RateLimitConfig::from(config.auth_rate_limit),
            Arc::clone(&rate_limit_store),
        )?);
        let api_limiter = Arc::new(RateLimiter::new(
            API_LIMITER,
            RateLimitConfig::from(config.api_rate_limit),
            Arc::clone(&rate_limit_store),
        )?);

        Ok(Self {
            auth_service,
            rotation,
            codec,
            csrf: CsrfGuard::new(),
            cookies: SessionCookieWriter::from_config(&config),
            auth_limiter,
            api_limiter,
            rate_limit_store,
            db,
            config: Arc::new(config),
        })
    }
}
