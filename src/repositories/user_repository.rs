use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{normalize_email, NewUser, ProfileUpdate, User, UserRole},
};

/// Persistence of user records. Besides lookups the auth core creates users at
/// registration and lets them edit or delete their own account.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn create(&self, user: NewUser) -> AppResult<User>;
    async fn exists_with_role(&self, role: UserRole) -> AppResult<bool>;
    /// Returns the updated user, or `None` when no user has this id.
    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> AppResult<Option<User>>;
    /// Returns whether a user was removed.
    async fn delete(&self, id: &str) -> AppResult<bool>;
}

/// Shape of a user document in the shared `users` collection.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    full_name: String,
    email: String,
    role: UserRole,
    password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<BsonDateTime>,
}

impl UserDocument {
    fn into_user(self) -> AppResult<User> {
        let id = self
            .id
            .ok_or_else(|| AppError::InternalError("User document without _id".to_string()))?;

        Ok(User {
            id: id.to_hex(),
            full_name: self.full_name,
            email: self.email,
            role: self.role,
            password_hash: self.password_hash,
            created_at: self
                .created_at
                .and_then(|t| DateTime::<Utc>::from_timestamp_millis(t.timestamp_millis())),
        })
    }
}

pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
}

impl MongoUserRepository {
    pub fn new(db: &Database, collection_name: &str) -> Self {
        let collection = db.get_collection(collection_name);
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let options = IndexOptions::builder().unique(true).build();
        let model = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(options)
            .build();

        self.collection.create_index(model).await?;
        log::info!("Created unique index on users.email");

        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .map(UserDocument::into_user)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.collection
            .find_one(doc! { "email": normalize_email(email) })
            .await?
            .map(UserDocument::into_user)
            .transpose()
    }

    async fn create(&self, user: NewUser) -> AppResult<User> {
        let now = BsonDateTime::now();
        let document = UserDocument {
            id: None,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
            password_hash: user.password_hash.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };

        let result = self.collection.insert_one(&document).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("User already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| AppError::InternalError("Inserted user has no ObjectId".to_string()))?;

        Ok(user.into_user(id.to_hex()))
    }

    async fn exists_with_role(&self, role: UserRole) -> AppResult<bool> {
        let found = self
            .collection
            .find_one(doc! { "role": role.as_str() })
            .await?;
        Ok(found.is_some())
    }

    async fn update_profile(&self, id: &str, update: ProfileUpdate) -> AppResult<Option<User>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };

        let mut changes = doc! { "updatedAt": BsonDateTime::now() };
        if let Some(full_name) = update.full_name {
            changes.insert("fullName", full_name);
        }
        if let Some(email) = update.email {
            changes.insert("email", email);
        }

        self.collection
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": changes })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::Conflict("Email is already in use".to_string())
                } else {
                    AppError::from(e)
                }
            })?
            .map(UserDocument::into_user)
            .transpose()
    }

    async fn delete(&self, id: &str) -> AppResult<bool> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(false);
        };

        let result = self.collection.delete_one(doc! { "_id": oid }).await?;
        Ok(result.deleted_count == 1)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == 11000
    )
}
