use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::{
    auth::{hash_password, verify_dummy_password, verify_password, TokenCodec},
    errors::{AppError, AppResult},
    models::{
        domain::{NewUser, User, UserRole},
        dto::{Credentials, RegisterRequest, UpdateProfileRequest},
    },
    repositories::UserRepository,
    services::refresh_rotation_service::RefreshRotationService,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
    rotation: Arc<RefreshRotationService>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        codec: Arc<TokenCodec>,
        rotation: Arc<RefreshRotationService>,
    ) -> Self {
        Self {
            users,
            codec,
            rotation,
        }
    }

    /// Unknown email and wrong password fail with the same error.
    pub async fn login(&self, credentials: Credentials) -> AppResult<LoginOutcome> {
        let verified = match self.users.find_by_email(&credentials.email).await? {
            Some(user) => {
                verify_password(&credentials.password, &user.password_hash).then_some(user)
            }
            None => {
                verify_dummy_password(&credentials.password);
                None
            }
        };
        let user = match verified {
            Some(user) => user,
            None => {
                log::warn!("Failed login attempt for {}", credentials.email.trim());
                return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
            }
        };

        let access_token = self.codec.issue_access_token(&user.id, user.role)?;
        let refresh = self.rotation.issue(&user.id).await?;

        log::info!("User {} logged in", user.id);

        Ok(LoginOutcome {
            user,
            access_token,
            refresh_token: refresh.refresh_token,
        })
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<User> {
        let registration = request.into_registration()?;

        if self
            .users
            .find_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .users
            .create(NewUser::new(
                &registration.full_name,
                &registration.email,
                registration.role,
                password_hash,
            ))
            .await?;

        log::info!("Registered user {} with role {}", user.id, user.role);
        Ok(user)
    }

    pub async fn profile(&self, user_id: &str) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        request: UpdateProfileRequest,
    ) -> AppResult<User> {
        let update = request.into_update()?;

        if let Some(email) = &update.email {
            if let Some(other) = self.users.find_by_email(email).await? {
                if other.id != user_id {
                    return Err(AppError::Conflict("Email is already in use".to_string()));
                }
            }
        }

        let user = self
            .users
            .update_profile(user_id, update)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        log::info!("User {} updated their profile", user.id);
        Ok(user)
    }

    /// Removes the account and ends every session it still has.
    pub async fn delete_account(&self, user_id: &str) -> AppResult<()> {
        if !self.users.delete(user_id).await? {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        self.rotation.revoke_all_for_user(user_id).await?;

        log::info!("Deleted account {}", user_id);
        Ok(())
    }

    /// Creates the configured administrator unless an admin already exists.
    /// Returns whether an account was created.
    pub async fn ensure_default_admin(
        &self,
        email: &str,
        password: &SecretString,
    ) -> AppResult<bool> {
        if self.users.exists_with_role(UserRole::Admin).await? {
            log::debug!("Admin account present, skipping seeding");
            return Ok(false);
        }

        if self.users.find_by_email(email).await?.is_some() {
            log::warn!(
                "Cannot seed admin: {} is already registered without the admin role",
                email
            );
            return Ok(false);
        }

        let password_hash = hash_password(password.expose_secret())?;
        let admin = self
            .users
            .create(NewUser::new("Administrator", email, UserRole::Admin, password_hash))
            .await?;

        log::info!("Seeded default admin account {}", admin.email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        repositories::{MockRefreshTokenRepository, MockUserRepository},
    };
    use actix_web::ResponseError;

    fn stored_user(email: &str, password: &str) -> User {
        User {
            id: "507f1f77bcf86cd799439011".to_string(),
            full_name: "Test User".to_string(),
            email: email.to_string(),
            role: UserRole::Student,
            password_hash: hash_password(password).unwrap(),
            created_at: None,
        }
    }

    fn service(users: MockUserRepository, store: MockRefreshTokenRepository) -> AuthService {
        let codec = Arc::new(TokenCodec::from_config(&Config::test_config()).unwrap());
        let users: Arc<dyn UserRepository> = Arc::new(users);
        let rotation = Arc::new(RefreshRotationService::new(
            Arc::clone(&codec),
            Arc::new(store),
            Arc::clone(&users),
        ));
        AuthService::new(users, codec, rotation)
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[actix_web::test]
    async fn test_login_success_issues_tokens() {
        let user = stored_user("a@b.com", "Secret123!");
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(user.clone())));
        let mut store = MockRefreshTokenRepository::new();
        store.expect_create().times(1).returning(|record| Ok(record));

        let outcome = service(users, store)
            .login(credentials("a@b.com", "Secret123!"))
            .await
            .unwrap();

        assert_eq!(outcome.user.email, "a@b.com");
        assert!(!outcome.access_token.is_empty());
        assert!(!outcome.refresh_token.is_empty());
    }

    #[actix_web::test]
    async fn test_login_failures_are_indistinguishable() {
        let user = stored_user("a@b.com", "Secret123!");
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |email| {
            Ok((email == "a@b.com").then(|| user.clone()))
        });
        let mut store = MockRefreshTokenRepository::new();
        store.expect_create().never();
        let service = service(users, store);

        let unknown = service
            .login(credentials("nobody@b.com", "Secret123!"))
            .await
            .unwrap_err();
        let wrong = service
            .login(credentials("a@b.com", "Wrong123!"))
            .await
            .unwrap_err();

        assert_eq!(unknown.status_code(), wrong.status_code());
        assert_eq!(unknown.public_message(), INVALID_CREDENTIALS);
        assert_eq!(wrong.public_message(), INVALID_CREDENTIALS);
    }

    #[actix_web::test]
    async fn test_unknown_email_still_pays_for_verification() {
        let user = stored_user("a@b.com", "Secret123!");
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(move |email| {
            Ok((email == "a@b.com").then(|| user.clone()))
        });
        let service = service(users, MockRefreshTokenRepository::new());

        // Warm the lazily generated hash so it is not counted below.
        let _ = service.login(credentials("warmup@b.com", "x")).await;

        let started = std::time::Instant::now();
        let _ = service.login(credentials("a@b.com", "Wrong123!")).await;
        let wrong = started.elapsed();

        let started = std::time::Instant::now();
        let _ = service.login(credentials("nobody@b.com", "Wrong123!")).await;
        let unknown = started.elapsed();

        assert!(
            wrong < unknown * 10,
            "unknown email took {unknown:?}, wrong password took {wrong:?}"
        );
    }

    #[actix_web::test]
    async fn test_update_profile_rejects_email_of_another_user() {
        let mut other = stored_user("taken@example.com", "Secret123!");
        other.id = "another-id".to_string();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(other.clone())));
        users.expect_update_profile().never();

        let request = UpdateProfileRequest {
            full_name: None,
            email: Some("Taken@Example.com".into()),
        };
        let err = service(users, MockRefreshTokenRepository::new())
            .update_profile("507f1f77bcf86cd799439011", request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn test_update_profile_of_missing_user_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_update_profile().returning(|_, _| Ok(None));

        let request = UpdateProfileRequest {
            full_name: Some("Grace Hopper".into()),
            email: None,
        };
        let err = service(users, MockRefreshTokenRepository::new())
            .update_profile("gone", request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_delete_account_revokes_sessions() {
        let mut users = MockUserRepository::new();
        users.expect_delete().times(1).returning(|_| Ok(true));
        let mut store = MockRefreshTokenRepository::new();
        store
            .expect_revoke_all_for_user()
            .times(1)
            .returning(|_| Ok(2));

        service(users, store).delete_account("u1").await.unwrap();
    }

    #[actix_web::test]
    async fn test_delete_missing_account_is_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_delete().returning(|_| Ok(false));
        let mut store = MockRefreshTokenRepository::new();
        store.expect_revoke_all_for_user().never();

        let err = service(users, store).delete_account("u1").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_register_conflict() {
        let existing = stored_user("ada@example.com", "Secret123!");
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_email()
            .returning(move |_| Ok(Some(existing.clone())));
        users.expect_create().never();

        let request = RegisterRequest {
            full_name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            password: Some("Secret123!".into()),
            confirm_password: Some("Secret123!".into()),
            role: None,
        };

        let err = service(users, MockRefreshTokenRepository::new())
            .register(request)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn test_register_hashes_password() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .times(1)
            .returning(|new_user| Ok(new_user.into_user("new-id".into())));

        let request = RegisterRequest {
            full_name: Some("Ada".into()),
            email: Some("Ada@Example.com".into()),
            password: Some("Secret123!".into()),
            confirm_password: Some("Secret123!".into()),
            role: Some("creator".into()),
        };

        let user = service(users, MockRefreshTokenRepository::new())
            .register(request)
            .await
            .unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, UserRole::Creator);
        assert_ne!(user.password_hash, "Secret123!");
        assert!(verify_password("Secret123!", &user.password_hash));
    }

    #[actix_web::test]
    async fn test_profile_not_found() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_id().returning(|_| Ok(None));

        let err = service(users, MockRefreshTokenRepository::new())
            .profile("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn test_admin_seeded_once() {
        let mut users = MockUserRepository::new();
        users.expect_exists_with_role().returning(|_| Ok(false));
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .times(1)
            .returning(|new_user| {
                assert_eq!(new_user.role, UserRole::Admin);
                Ok(new_user.into_user("admin-id".into()))
            });

        let seeded = service(users, MockRefreshTokenRepository::new())
            .ensure_default_admin("admin@example.com", &SecretString::from("Admin123!".to_string()))
            .await
            .unwrap();
        assert!(seeded);

        let mut users = MockUserRepository::new();
        users.expect_exists_with_role().returning(|_| Ok(true));
        users.expect_create().never();

        let seeded = service(users, MockRefreshTokenRepository::new())
            .ensure_default_admin("admin@example.com", &SecretString::from("Admin123!".to_string()))
            .await
            .unwrap();
        assert!(!seeded);
    }
}
