use std::{env, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::jwt::MIN_SECRET_LEN,
    errors::{AppError, AppResult},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!(
                "APP_ENV must be one of: development, production, test (got '{}')",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitBackend {
    /// Process-local counters; correct only for a single instance.
    Memory,
    /// Counters shared through MongoDB.
    Mongo,
}

impl FromStr for RateLimitBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(RateLimitBackend::Memory),
            "mongo" => Ok(RateLimitBackend::Mongo),
            other => Err(format!(
                "RATE_LIMIT_BACKEND must be 'memory' or 'mongo' (got '{}')",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub window: StdDuration,
    pub max_requests: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub environment: Environment,
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub users_collection: String,
    pub refresh_tokens_collection: String,
    pub rate_limits_collection: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub auth_rate_limit: RateLimitSettings,
    pub api_rate_limit: RateLimitSettings,
    pub rate_limit_backend: RateLimitBackend,
    pub rate_limit_sweep_interval: StdDuration,
    pub admin_email: Option<String>,
    pub admin_password: Option<SecretString>,
}

impl Config {
    /// Local defaults around the given secret.
    pub fn local(jwt_secret: SecretString) -> Self {
        Self {
            environment: Environment::Development,
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "quiz-local".to_string(),
            users_collection: "users".to_string(),
            refresh_tokens_collection: "refreshtokens".to_string(),
            rate_limits_collection: "rate_limits".to_string(),
            web_server_host: "localhost".to_string(),
            web_server_port: 8080,
            jwt_secret,
            access_token_ttl: Duration::hours(8),
            refresh_token_ttl: Duration::days(30),
            auth_rate_limit: RateLimitSettings {
                window: StdDuration::from_secs(15 * 60),
                max_requests: 5,
            },
            api_rate_limit: RateLimitSettings {
                window: StdDuration::from_secs(60),
                max_requests: 60,
            },
            rate_limit_backend: RateLimitBackend::Memory,
            rate_limit_sweep_interval: StdDuration::from_secs(60),
            admin_email: None,
            admin_password: None,
        }
    }

    /// Reads the environment and validates the result. Every problem is
    /// reported at once rather than one per restart.
    pub fn from_env() -> AppResult<Self> {
        let mut errors = Vec::new();

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => SecretString::from(secret),
            _ => {
                errors.push("Missing required environment variable: JWT_SECRET".to_string());
                SecretString::from(String::new())
            }
        };

        let mut config = Self::local(jwt_secret);

        if let Some(environment) = parse_var::<Environment>("APP_ENV", &mut errors) {
            config.environment = environment;
        }
        if let Ok(uri) = env::var("MONGO_CONN_STRING") {
            config.mongo_conn_string = uri;
        }
        if let Ok(name) = env::var("MONGO_DB_NAME") {
            config.mongo_db_name = name;
        }
        if let Ok(name) = env::var("USERS_COLLECTION") {
            config.users_collection = name;
        }
        if let Ok(host) = env::var("WEB_SERVER_HOST") {
            config.web_server_host = host;
        }
        if let Some(port) = parse_var("WEB_SERVER_PORT", &mut errors) {
            config.web_server_port = port;
        }
        if let Some(hours) = parse_var::<i64>("ACCESS_TOKEN_TTL_HOURS", &mut errors) {
            config.access_token_ttl = Duration::hours(hours);
        }
        if let Some(days) = parse_var::<i64>("REFRESH_TOKEN_TTL_DAYS", &mut errors) {
            config.refresh_token_ttl = Duration::days(days);
        }
        if let Some(secs) = parse_var::<u64>("AUTH_RATE_LIMIT_WINDOW_SECS", &mut errors) {
            config.auth_rate_limit.window = StdDuration::from_secs(secs);
        }
        if let Some(max) = parse_var("AUTH_RATE_LIMIT_MAX", &mut errors) {
            config.auth_rate_limit.max_requests = max;
        }
        if let Some(secs) = parse_var::<u64>("API_RATE_LIMIT_WINDOW_SECS", &mut errors) {
            config.api_rate_limit.window = StdDuration::from_secs(secs);
        }
        if let Some(max) = parse_var("API_RATE_LIMIT_MAX", &mut errors) {
            config.api_rate_limit.max_requests = max;
        }
        if let Some(backend) = parse_var("RATE_LIMIT_BACKEND", &mut errors) {
            config.rate_limit_backend = backend;
        }
        if let Some(secs) = parse_var::<u64>("RATE_LIMIT_SWEEP_SECS", &mut errors) {
            config.rate_limit_sweep_interval = StdDuration::from_secs(secs);
        }
        config.admin_email = env::var("ADMIN_EMAIL").ok().filter(|v| !v.is_empty());
        config.admin_password = env::var("ADMIN_PASSWORD")
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from);

        errors.extend(config.problems());
        if !errors.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Environment validation failed:\n{}",
                errors.join("\n")
            )));
        }

        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        let problems = self.problems();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::ConfigError(problems.join("\n")))
        }
    }

    fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let secret_len = self.jwt_secret.expose_secret().chars().count();
        if secret_len > 0 && secret_len < MIN_SECRET_LEN {
            problems.push(format!(
                "JWT_SECRET must be at least {} characters long (got {})",
                MIN_SECRET_LEN, secret_len
            ));
        }
        if self.access_token_ttl <= Duration::zero() {
            problems.push("ACCESS_TOKEN_TTL_HOURS must be positive".to_string());
        }
        if self.refresh_token_ttl <= Duration::zero() {
            problems.push("REFRESH_TOKEN_TTL_DAYS must be positive".to_string());
        }
        for (name, limit) in [("AUTH", self.auth_rate_limit), ("API", self.api_rate_limit)] {
            if limit.window.is_zero() {
                problems.push(format!("{}_RATE_LIMIT_WINDOW_SECS must be positive", name));
            }
            if limit.max_requests == 0 {
                problems.push(format!("{}_RATE_LIMIT_MAX must be positive", name));
            }
        }
        if self.rate_limit_sweep_interval.is_zero() {
            problems.push("RATE_LIMIT_SWEEP_SECS must be positive".to_string());
        }
        if self.admin_email.is_some() != self.admin_password.is_some() {
            problems.push("ADMIN_EMAIL and ADMIN_PASSWORD must be set together".to_string());
        }

        problems
    }
}

fn parse_var<T: FromStr>(name: &str, errors: &mut Vec<String>) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(e) => {
            errors.push(format!("Invalid value for {}: {}", name, e));
            None
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn test_config() -> Self {
        let mut config =
            Self::local(SecretString::from("test_jwt_secret_key_with_32_chars!!".to_string()));
        config.environment = Environment::Test;
        config.mongo_db_name = "quiz-test".to_string();
        config
    }
}
