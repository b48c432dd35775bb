use std::collections::BTreeMap;

use actix_web::{
    http::{header::RETRY_AFTER, StatusCode},
    HttpResponse, ResponseError,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::TokenError;

pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        details: FieldErrors,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests, retry after {retry_after}s")]
    TooManyRequests { retry_after: u64 },

    /// Escape hatch for errors that need a status outside the taxonomy.
    #[error("{message}")]
    Custom {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut details = FieldErrors::new();
        details.insert(field.to_string(), vec![message.to_string()]);
        AppError::ValidationError {
            message: "Validation failed".to_string(),
            details,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Token(err) => err.code(),
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::TooManyRequests { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::Custom { code, .. } => code,
            AppError::ConfigError(_) | AppError::DatabaseError(_) | AppError::InternalError(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }

    /// Message safe to show to a client. Internal details never leave the process.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Token(err) => err.public_message().to_string(),
            AppError::ValidationError { message, .. } => message.clone(),
            AppError::TooManyRequests { .. } => "Too many requests".to_string(),
            AppError::Custom { message, .. } => message.clone(),
            AppError::ConfigError(_) | AppError::DatabaseError(_) | AppError::InternalError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Token(err) if err.is_server_fault() => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Custom { status, .. } => *status,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let details = match self {
            AppError::ValidationError { details, .. } => Some(details.clone()),
            _ => None,
        };

        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::TooManyRequests { retry_after } = self {
            builder.insert_header((RETRY_AFTER, *retry_after));
        }

        builder.json(ErrorResponse {
            error: ErrorBody {
                message: self.public_message(),
                code: self.error_code().to_string(),
                details,
            },
        })
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for AppError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        AppError::InternalError(format!("BSON serialization error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let details = err
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let messages = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        AppError::ValidationError {
            message: "Validation failed".to_string(),
            details,
        }
    }
}

impl From<actix_web::error::HttpError> for AppError {
    fn from(err: actix_web::error::HttpError) -> Self {
        AppError::InternalError(format!("HTTP error: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
