use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{normalize_email, ProfileUpdate, UserRole},
};

static UPPERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]").expect("UPPERCASE is a valid regex pattern"));
static LOWERCASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z]").expect("LOWERCASE is a valid regex pattern"));
static DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]").expect("DIGIT is a valid regex pattern"));
static SPECIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").expect("SPECIAL is a valid regex pattern"));

/// Body of `POST /auth/login`. Both fields are optional at the wire level so a
/// missing one yields a 400 instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn into_credentials(self) -> AppResult<Credentials> {
        match (self.email, self.password) {
            (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Ok(Credentials { email, password })
            }
            _ => Err(AppError::BadRequest(
                "Email and password are required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub role: Option<String>,
}

/// A registration whose required fields are present. Field rules are
/// checked with [`Validate`].
#[derive(Debug, Clone, Validate)]
pub struct Registration {
    #[validate(length(min = 2, max = 100, message = "Full name must be at least 2 characters"))]
    pub full_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,

    pub role: UserRole,
}

impl RegisterRequest {
    /// Presence, confirmation and role checks, then field validation.
    pub fn into_registration(self) -> AppResult<Registration> {
        let (full_name, email, password, confirm_password) = match (
            self.full_name.filter(|v| !v.trim().is_empty()),
            self.email.filter(|v| !v.trim().is_empty()),
            self.password.filter(|v| !v.is_empty()),
            self.confirm_password.filter(|v| !v.is_empty()),
        ) {
            (Some(n), Some(e), Some(p), Some(c)) => (n, e, p, c),
            _ => return Err(AppError::BadRequest("All fields are required".to_string())),
        };

        if password != confirm_password {
            return Err(AppError::BadRequest("Passwords do not match".to_string()));
        }

        let role = match self.role {
            None => UserRole::default(),
            Some(raw) => raw
                .trim()
                .to_lowercase()
                .parse::<UserRole>()
                .ok()
                .filter(UserRole::is_self_assignable)
                .ok_or_else(|| AppError::BadRequest("Invalid role".to_string()))?,
        };

        let registration = Registration {
            full_name: full_name.trim().to_string(),
            email: email.trim().to_string(),
            password,
            role,
        };
        registration.validate()?;
        Ok(registration)
    }
}

/// Body of `PUT /auth/updateUserProfile`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Validate)]
struct ProfileFields {
    #[validate(length(min = 2, max = 100, message = "Full name must be at least 2 characters"))]
    full_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    email: Option<String>,
}

impl UpdateProfileRequest {
    /// At least one field must be present; present fields follow the
    /// registration rules.
    pub fn into_update(self) -> AppResult<ProfileUpdate> {
        let fields = ProfileFields {
            full_name: self.full_name.map(|v| v.trim().to_string()),
            email: self.email.map(|v| v.trim().to_string()),
        };

        if fields.full_name.is_none() && fields.email.is_none() {
            return Err(AppError::validation(
                "profile",
                "Provide a full name or an email to update",
            ));
        }
        fields.validate()?;

        Ok(ProfileUpdate {
            full_name: fields.full_name,
            email: fields.email.as_deref().map(normalize_email),
        })
    }
}

fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let rules: [(bool, &'static str); 5] = [
        (
            password.chars().count() >= 8,
            "Password must be at least 8 characters",
        ),
        (
            UPPERCASE.is_match(password),
            "Password must contain at least one uppercase letter",
        ),
        (
            LOWERCASE.is_match(password),
            "Password must contain at least one lowercase letter",
        ),
        (
            DIGIT.is_match(password),
            "Password must contain at least one number",
        ),
        (
            SPECIAL.is_match(password),
            "Password must contain at least one special character",
        ),
    ];

    match rules.into_iter().find(|(ok, _)| !ok) {
        Some((_, message)) => {
            Err(ValidationError::new("password_strength").with_message(Cow::Borrowed(message)))
        }
        None => Ok(()),
    }
}
