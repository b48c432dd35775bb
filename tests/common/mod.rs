#![allow(dead_code, unused_macros)]

use std::{collections::HashMap, sync::Arc};

use actix_web::{cookie::Cookie, dev::ServiceResponse, http::header, test};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use secrecy::SecretString;
use tokio::sync::RwLock;

use quiz_auth_server::{
    app_state::AppState,
    auth::{hash_password, CSRF_COOKIE, CSRF_HEADER},
    config::{Config, Environment},
    errors::{AppError, AppResult},
    models::domain::{
        normalize_email, NewUser, ProfileUpdate, RefreshTokenRecord, User, UserRole,
    },
    rate_limit::InMemoryRateLimitStore,
    repositories::{RefreshTokenRepository, UserRepository},
};

pub const TEST_SECRET: &str = "integration_test_secret_with_32_chars!";

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, email: &str, password: &str, role: UserRole) -> User {
        let hash = hash_password(password).expect("hashing a test password");
        self.create(NewUser::new("Test User", email, role, hash))
            .await
            .expect("seeding a user")
    }

    pub async fn set_role(&self, user_id: &str, role: UserRole) {
        if let Some(user) = self.users.write().await.get_mut(user_id) {
            user.role = role;
        }
    }

    pub async fn remove(&self, user_id: &str) {
        self.users.write().await.remove(user_id);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let user = user.into_user(ObjectId::new().to_hex());
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn exists_with_role(&self, role: UserRole) -> AppResult<bool> {
        Ok(self.users.read().await.values().any(|u| u.role == role))
    }

    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> AppResult<Option<User>> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(AppError::Conflict("Email is already in use".to_string()));
            }
        }

        Ok(users.get_mut(id).map(|user| {
            update.apply_to(user);
            user.clone()
        }))
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        Ok(self.users.write().await.remove(id).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryRefreshTokenRepository {
    records: Arc<RwLock<HashMap<String, RefreshTokenRecord>>>,
}

impl InMemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, token_id: &str) -> Option<RefreshTokenRecord> {
        self.records.read().await.get(token_id).cloned()
    }

    pub async fn active_for_user(&self, user_id: &str, now: DateTime<Utc>) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.is_active(now))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, record: RefreshTokenRecord) -> AppResult<RefreshTokenRecord> {
        let mut records = self.records.write().await;

        if records.contains_key(&record.token_id) {
            return Err(AppError::Conflict(format!(
                "Refresh token '{}' already exists",
                record.token_id
            )));
        }

        records.insert(record.token_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_token_id(&self, token_id: &str) -> AppResult<Option<RefreshTokenRecord>> {
        Ok(self.records.read().await.get(token_id).cloned())
    }

    async fn revoke_if_active(
        &self,
        token_id: &str,
        replaced_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;

        match records.get_mut(token_id) {
            Some(record) if record.is_active(now) => {
                record.revoked = true;
                record.replaced_by_token_id = Some(replaced_by.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke(&self, token_id: &str) -> AppResult<bool> {
        let mut records = self.records.write().await;

        match records.get_mut(token_id) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let mut records = self.records.write().await;

        let mut revoked = 0;
        for record in records
            .values_mut()
            .filter(|r| r.user_id == user_id && !r.revoked)
        {
            record.revoked = true;
            revoked += 1;
        }
        Ok(revoked)
    }
}

pub struct TestContext {
    pub state: AppState,
    pub users: Arc<InMemoryUserRepository>,
    pub tokens: Arc<InMemoryRefreshTokenRepository>,
}

pub fn test_config() -> Config {
    let mut config = Config::local(SecretString::from(TEST_SECRET.to_string()));
    config.environment = Environment::Test;
    config
}

pub fn build_context() -> TestContext {
    build_context_with(test_config())
}

pub fn build_context_with(config: Config) -> TestContext {
    let users = Arc::new(InMemoryUserRepository::new());
    let tokens = Arc::new(InMemoryRefreshTokenRepository::new());

    let state = AppState::from_parts(
        config,
        users.clone(),
        tokens.clone(),
        Arc::new(InMemoryRateLimitStore::new()),
        None,
    )
    .expect("test state should build");

    TestContext {
        state,
        users,
        tokens,
    }
}

/// Builds the full application around an [`AppState`].
macro_rules! test_app {
    ($state:expr) => {{
        let state: quiz_auth_server::app_state::AppState = $state.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new(state.clone()))
                .wrap(quiz_auth_server::middleware::RequestIdMiddleware)
                .wrap(quiz_auth_server::middleware::SecurityHeaders::for_environment(
                    state.config.environment,
                ))
                .configure(|cfg| quiz_auth_server::routes::configure(cfg, &state)),
        )
        .await
    }};
}

pub fn response_cookie<B>(resp: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.into_owned())
}

/// Fetches a CSRF token the way a browser client would.
macro_rules! fetch_csrf {
    ($app:expr) => {{
        let req = actix_web::test::TestRequest::get()
            .uri("/auth/csrf")
            .to_request();
        let resp = actix_web::test::call_service($app, req).await;
        assert!(resp.status().is_success());
        crate::common::csrf_token_of(&resp)
    }};
}

pub fn csrf_token_of<B>(resp: &ServiceResponse<B>) -> String {
    let header_token = resp
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("csrf endpoint sets the header");
    let cookie = response_cookie(resp, CSRF_COOKIE).expect("csrf endpoint sets the cookie");
    assert_eq!(cookie.value(), header_token);

    header_token
}

/// A POST carrying the double-submit pair.
pub fn csrf_post(uri: &str, csrf: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri(uri)
        .insert_header((CSRF_HEADER, csrf))
        .cookie(Cookie::new(CSRF_COOKIE, csrf.to_string()))
        .insert_header((header::CONTENT_TYPE, "application/json"))
}
