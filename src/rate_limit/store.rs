use std::{collections::HashMap, sync::Arc, time::Duration as StdDuration};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::errors::{AppError, AppResult};

/// Counter state of one key within its current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitBucket {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

/// Where fixed-window counters live. The limiter algorithm is the same for
/// every backend; only the storage differs.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Counts one request for `key` at `now` and returns the updated bucket.
    /// A new window of length `window` starts when the previous one has elapsed.
    async fn hit(&self, key: &str, window: Duration, now: DateTime<Utc>)
        -> AppResult<RateLimitBucket>;

    /// Drops buckets whose window ended before `now`. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

/// Process-local counters. Each instance of a horizontally scaled deployment
/// would hand out its own budget, so use it for single-node setups only.
#[derive(Default)]
pub struct InMemoryRateLimitStore {
    buckets: RwLock<HashMap<String, RateLimitBucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.buckets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.buckets.read().await.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<RateLimitBucket> {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert(RateLimitBucket {
                count: 0,
                reset_time: now + window,
            });
        if bucket.reset_time <= now {
            *bucket = RateLimitBucket {
                count: 0,
                reset_time: now + window,
            };
        }
        bucket.count = bucket.count.saturating_add(1);

        Ok(*bucket)
    }

    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.reset_time > now);
        Ok((before - buckets.len()) as u64)
    }
}

/// Periodically removes expired buckets. Fire-and-forget: failures are
/// logged and the next tick tries again.
pub fn spawn_sweeper(store: Arc<dyn RateLimitStore>, every: StdDuration) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match store.sweep(Utc::now()).await {
                Ok(0) => {}
                Ok(removed) => log::debug!("Swept {} expired rate limit buckets", removed),
                Err(e) => log::warn!("Rate limit sweep failed: {}", e),
            }
        }
    });
}

pub(crate) fn to_chrono(window: StdDuration) -> AppResult<Duration> {
    Duration::from_std(window)
        .map_err(|e| AppError::ConfigError(format!("Rate limit window out of range: {}", e)))
}
