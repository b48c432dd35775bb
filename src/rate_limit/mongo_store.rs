use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    rate_limit::store::{RateLimitBucket, RateLimitStore},
};

/// Counters shared by every instance through MongoDB. Windows are aligned to
/// the epoch so all instances agree on where a window starts, and each
/// `(key, window)` pair is one document incremented with an atomic upsert.
pub struct MongoRateLimitStore {
    collection: Collection<RateLimitDocument>,
}

#[derive(Debug, Deserialize, Serialize)]
struct RateLimitDocument {
    #[serde(rename = "_id")]
    id: String,
    count: i64,
    #[serde(rename = "resetAt")]
    reset_at: BsonDateTime,
}

impl MongoRateLimitStore {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        Self {
            collection: db.get_collection(collection_name),
        }
    }

    /// TTL index so expired windows disappear even without the sweeper.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let options = IndexOptions::builder()
            .expire_after(StdDuration::from_secs(0))
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "resetAt": 1 })
            .options(options)
            .build();
        self.collection.create_index(model).await?;
        log::info!("Created TTL index on rate_limits.resetAt");
        Ok(())
    }

    async fn increment(&self, id: &str, reset_at: BsonDateTime) -> AppResult<RateLimitDocument> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$inc": { "count": 1_i64 }, "$setOnInsert": { "resetAt": reset_at } },
            )
            .with_options(options)
            .await?
            .ok_or_else(|| AppError::InternalError("Upsert returned no document".to_string()))
    }
}

/// Start and end of the epoch-aligned window containing `now`.
pub fn window_bounds(window: Duration, now: DateTime<Utc>) -> (i64, i64) {
    let length = window.num_milliseconds().max(1);
    let now_ms = now.timestamp_millis();
    let start = now_ms - now_ms.rem_euclid(length);
    (start, start + length)
}

#[async_trait]
impl RateLimitStore for MongoRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<RateLimitBucket> {
        let (start, end) = window_bounds(window, now);
        let id = format!("{}:{}", key, start);
        let reset_at = BsonDateTime::from_millis(end);

        // Two first hits can race on the upsert; the loser sees a duplicate
        // key error and succeeds on retry because the document now exists.
        let document = match self.increment(&id, reset_at).await {
            Ok(document) => document,
            Err(first) => {
                log::debug!("Retrying rate limit upsert for {}: {}", id, first);
                self.increment(&id, reset_at).await?
            }
        };

        let reset_time =
            DateTime::<Utc>::from_timestamp_millis(document.reset_at.timestamp_millis())
                .ok_or_else(|| AppError::InternalError("Timestamp out of range".to_string()))?;

        Ok(RateLimitBucket {
            count: u32::try_from(document.count).unwrap_or(u32::MAX),
            reset_time,
        })
    }

    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let cutoff = BsonDateTime::from_millis(now.timestamp_millis());
        let result = self
            .collection
            .delete_many(doc! { "resetAt": { "$lte": cutoff } })
            .await?;
        Ok(result.deleted_count)
    }
}
