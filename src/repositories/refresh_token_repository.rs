use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    options::IndexOptions,
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::RefreshTokenRecord,
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, record: RefreshTokenRecord) -> AppResult<RefreshTokenRecord>;
    async fn find_by_token_id(&self, token_id: &str) -> AppResult<Option<RefreshTokenRecord>>;

    /// Atomically revokes `token_id` and links it to `replaced_by`, but only if
    /// the record is still unrevoked and unexpired at `now`. Returns whether
    /// this call performed the revocation.
    async fn revoke_if_active(
        &self,
        token_id: &str,
        replaced_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Revokes without naming a successor (logout, orphan cleanup).
    async fn revoke(&self, token_id: &str) -> AppResult<bool>;

    async fn revoke_all_for_user(&self, user_id: &str) -> AppResult<u64>;
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenDocument {
    token_id: String,
    user_id: String,
    created_at: BsonDateTime,
    expires_at: BsonDateTime,
    revoked: bool,
    #[serde(default)]
    replaced_by_token_id: Option<String>,
}

impl From<&RefreshTokenRecord> for RefreshTokenDocument {
    fn from(record: &RefreshTokenRecord) -> Self {
        Self {
            token_id: record.token_id.clone(),
            user_id: record.user_id.clone(),
            created_at: to_bson(record.created_at),
            expires_at: to_bson(record.expires_at),
            revoked: record.revoked,
            replaced_by_token_id: record.replaced_by_token_id.clone(),
        }
    }
}

impl TryFrom<RefreshTokenDocument> for RefreshTokenRecord {
    type Error = AppError;

    fn try_from(document: RefreshTokenDocument) -> AppResult<Self> {
        Ok(Self {
            token_id: document.token_id,
            user_id: document.user_id,
            created_at: from_bson(document.created_at)?,
            expires_at: from_bson(document.expires_at)?,
            revoked: document.revoked,
            replaced_by_token_id: document.replaced_by_token_id,
        })
    }
}

fn to_bson(time: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(time.timestamp_millis())
}

fn from_bson(time: BsonDateTime) -> AppResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(time.timestamp_millis())
        .ok_or_else(|| AppError::InternalError("Timestamp out of range".to_string()))
}

pub struct MongoRefreshTokenRepository {
    collection: Collection<RefreshTokenDocument>,
}

impl MongoRefreshTokenRepository {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        let collection = db.get_collection(collection_name);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let token_id_options = IndexOptions::builder().unique(true).build();
        let token_id_model = IndexModel::builder()
            .keys(doc! { "tokenId": 1 })
            .options(token_id_options)
            .build();
        self.collection.create_index(token_id_model).await?;
        log::info!("Created unique index on refresh tokens tokenId");

        let user_id_model = IndexModel::builder().keys(doc! { "userId": 1 }).build();
        self.collection.create_index(user_id_model).await?;
        log::info!("Created index on refresh tokens userId");

        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MongoRefreshTokenRepository {
    async fn create(&self, record: RefreshTokenRecord) -> AppResult<RefreshTokenRecord> {
        self.collection
            .insert_one(RefreshTokenDocument::from(&record))
            .await?;
        Ok(record)
    }

    async fn find_by_token_id(&self, token_id: &str) -> AppResult<Option<RefreshTokenRecord>> {
        self.collection
            .find_one(doc! { "tokenId": token_id })
            .await?
            .map(RefreshTokenRecord::try_from)
            .transpose()
    }

    async fn revoke_if_active(
        &self,
        token_id: &str,
        replaced_by: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! {
                    "tokenId": token_id,
                    "revoked": false,
                    "expiresAt": { "$gt": to_bson(now) },
                },
                doc! { "$set": { "revoked": true, "replacedByTokenId": replaced_by } },
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    async fn revoke(&self, token_id: &str) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "tokenId": token_id, "revoked": false },
                doc! { "$set": { "revoked": true } },
            )
            .await?;

        Ok(result.modified_count == 1)
    }

    async fn revoke_all_for_user(&self, user_id: &str) -> AppResult<u64> {
        let result = self
            .collection
            .update_many(
                doc! { "userId": user_id, "revoked": false },
                doc! { "$set": { "revoked": true } },
            )
            .await?;

        Ok(result.modified_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_document_round_trip_keeps_millis() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        let mut record =
            RefreshTokenRecord::new("tid".into(), "uid".into(), now, Duration::days(30));
        record.revoked = true;
        record.replaced_by_token_id = Some("next".into());

        let document = RefreshTokenDocument::from(&record);
        assert_eq!(
            document.expires_at.timestamp_millis(),
            (now + Duration::days(30)).timestamp_millis()
        );

        let back = RefreshTokenRecord::try_from(document).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_document_field_names() {
        let record =
            RefreshTokenRecord::new("tid".into(), "uid".into(), Utc::now(), Duration::days(1));
        let bson = mongodb::bson::to_document(&RefreshTokenDocument::from(&record)).unwrap();

        assert!(bson.contains_key("tokenId"));
        assert!(bson.contains_key("userId"));
        assert!(bson.contains_key("expiresAt"));
        assert!(bson.contains_key("replacedByTokenId"));
    }
}
