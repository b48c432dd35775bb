use std::{fmt, sync::Arc, time::Duration as StdDuration};

use actix_web::{
    http::header::{HeaderName, HeaderValue},
    HttpRequest, HttpResponse,
};
use chrono::{DateTime, Duration, Utc};

use crate::{
    config::RateLimitSettings,
    errors::AppResult,
    rate_limit::store::{to_chrono, RateLimitStore},
};

pub const ANONYMOUS_KEY: &str = "anonymous";

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub type KeyGenerator = Arc<dyn Fn(&HttpRequest) -> String + Send + Sync>;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub window: StdDuration,
    pub max_requests: u32,
    pub key_generator: Option<KeyGenerator>,
}

impl RateLimitConfig {
    pub fn new(window: StdDuration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            key_generator: None,
        }
    }

    pub fn with_key_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&HttpRequest) -> String + Send + Sync + 'static,
    {
        self.key_generator = Some(Arc::new(generator));
        self
    }
}

impl From<RateLimitSettings> for RateLimitConfig {
    fn from(settings: RateLimitSettings) -> Self {
        Self::new(settings.window, settings.max_requests)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitStatus {
    pub fn apply_headers(&self, response: &mut HttpResponse) {
        let reset_secs = (self.reset_time.timestamp_millis() + 999).div_euclid(1000);
        let headers = response.headers_mut();
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_secs));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed(RateLimitStatus),
    Rejected { retry_after: u64 },
}

/// Fixed-window request counter. Separate instances (auth vs. general
/// endpoints) are namespaced by name, so they can share one store.
pub struct RateLimiter {
    name: String,
    window: Duration,
    max_requests: u32,
    key_generator: Option<KeyGenerator>,
    store: Arc<dyn RateLimitStore>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(
        name: &str,
        config: RateLimitConfig,
        store: Arc<dyn RateLimitStore>,
    ) -> AppResult<Self> {
        Ok(Self {
            name: name.to_string(),
            window: to_chrono(config.window)?,
            max_requests: config.max_requests,
            key_generator: config.key_generator,
            store,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn key_for(&self, req: &HttpRequest) -> String {
        match &self.key_generator {
            Some(generate) => generate(req),
            None => client_key(req),
        }
    }

    pub async fn check(&self, key: &str) -> AppResult<RateLimitDecision> {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> AppResult<RateLimitDecision> {
        let namespaced = format!("{}:{}", self.name, key);
        let bucket = self.store.hit(&namespaced, self.window, now).await?;

        if bucket.count > self.max_requests {
            let millis_left = (bucket.reset_time - now).num_milliseconds().max(0);
            let retry_after = ((millis_left + 999) / 1000).max(1) as u64;
            return Ok(RateLimitDecision::Rejected { retry_after });
        }

        Ok(RateLimitDecision::Allowed(RateLimitStatus {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(bucket.count),
            reset_time: bucket.reset_time,
        }))
    }
}

/// First `x-forwarded-for` entry, then `x-real-ip`, then one shared
/// `anonymous` bucket for every client that cannot be attributed.
pub fn client_key(req: &HttpRequest) -> String {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or(ANONYMOUS_KEY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::InMemoryRateLimitStore;
    use actix_web::test::TestRequest;

    fn limiter(max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(
            "test",
            RateLimitConfig::new(StdDuration::from_millis(window_ms), max),
            Arc::new(InMemoryRateLimitStore::new()),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_fixed_window() {
        let limiter = limiter(5, 1000);
        let start = Utc::now();

        for i in 0..5 {
            let at = start + Duration::milliseconds(i * 100);
            assert!(matches!(
                limiter.check_at("ip", at).await.unwrap(),
                RateLimitDecision::Allowed(_)
            ));
        }

        let sixth = limiter
            .check_at("ip", start + Duration::milliseconds(600))
            .await
            .unwrap();
        assert_eq!(sixth, RateLimitDecision::Rejected { retry_after: 1 });

        let after = limiter
            .check_at("ip", start + Duration::milliseconds(1000))
            .await
            .unwrap();
        match after {
            RateLimitDecision::Allowed(status) => assert_eq!(status.remaining, 4),
            other => panic!("expected a fresh window, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_remaining_counts_down() {
        let limiter = limiter(3, 60_000);
        let now = Utc::now();

        let mut remaining = Vec::new();
        for _ in 0..3 {
            if let RateLimitDecision::Allowed(status) = limiter.check_at("k", now).await.unwrap() {
                remaining.push(status.remaining);
            }
        }
        assert_eq!(remaining, vec![2, 1, 0]);
    }

    #[actix_web::test]
    async fn test_retry_after_rounds_up() {
        let limiter = limiter(1, 15 * 60 * 1000);
        let now = Utc::now();

        limiter.check_at("k", now).await.unwrap();
        let decision = limiter
            .check_at("k", now + Duration::milliseconds(500))
            .await
            .unwrap();
        assert_eq!(decision, RateLimitDecision::Rejected { retry_after: 900 });
    }

    #[actix_web::test]
    async fn test_limiters_sharing_a_store_are_independent() {
        let store: Arc<dyn RateLimitStore> = Arc::new(InMemoryRateLimitStore::new());
        let auth = RateLimiter::new(
            "auth",
            RateLimitConfig::new(StdDuration::from_secs(900), 1),
            Arc::clone(&store),
        )
        .unwrap();
        let api = RateLimiter::new(
            "api",
            RateLimitConfig::new(StdDuration::from_secs(60), 60),
            store,
        )
        .unwrap();
        let now = Utc::now();

        auth.check_at("ip", now).await.unwrap();
        assert!(matches!(
            auth.check_at("ip", now).await.unwrap(),
            RateLimitDecision::Rejected { .. }
        ));
        assert!(matches!(
            api.check_at("ip", now).await.unwrap(),
            RateLimitDecision::Allowed(_)
        ));
    }

    #[test]
    fn test_client_key_precedence() {
        let req = TestRequest::get()
            .insert_header(("x-forwarded-for", "203.0.113.7, 10.0.0.1"))
            .insert_header(("x-real-ip", "198.51.100.2"))
            .to_http_request();
        assert_eq!(client_key(&req), "203.0.113.7");

        let req = TestRequest::get()
            .insert_header(("x-real-ip", "198.51.100.2"))
            .to_http_request();
        assert_eq!(client_key(&req), "198.51.100.2");

        let req = TestRequest::get().to_http_request();
        assert_eq!(client_key(&req), ANONYMOUS_KEY);
    }

    #[test]
    fn test_custom_key_generator() {
        let limiter = RateLimiter::new(
            "custom",
            RateLimitConfig::new(StdDuration::from_secs(1), 1)
                .with_key_generator(|req| req.path().to_string()),
            Arc::new(InMemoryRateLimitStore::new()),
        )
        .unwrap();

        let req = TestRequest::get().uri("/auth/login").to_http_request();
        assert_eq!(limiter.key_for(&req), "/auth/login");
    }

    #[test]
    fn test_headers_applied() {
        let status = RateLimitStatus {
            limit: 60,
            remaining: 59,
            reset_time: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_001).unwrap(),
        };
        let mut response = HttpResponse::Ok().finish();
        status.apply_headers(&mut response);

        assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "60");
        assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "59");
        assert_eq!(response.headers().get("x-ratelimit-reset").unwrap(), "1700000001");
    }
}
