use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

use crate::service::error::TicketError;
use crate::service::storage::FileStorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // 400 BAD REQUEST
    ValidationError,
    DuplicateAccountEmail,
    InvalidEmailPwd,
    NotRefreshToken,
    InvalidRefreshToken,
    AttachmentRejected,

    // 401 UNAUTHORIZED
    AuthenticationFailed,
    ExpiredAuthToken,
    InvalidAuthToken,

    // 403 FORBIDDEN
    NotEnoughPermission,

    // 404 NOT FOUND
    UserNotFound,
    TicketNotFound,
    NotificationNotFound,

    // 500 SERVER ERRORS
    DatabaseError,
    FileStorageError,
    InternalError,
    TokenGenerationFailed,
}

impl ErrorCode {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "Validation failed",
            ErrorCode::DuplicateAccountEmail => "This email is already registered, please log in",
            ErrorCode::InvalidEmailPwd => "Invalid credentials",
            ErrorCode::NotRefreshToken => "Not a refresh token",
            ErrorCode::InvalidRefreshToken => "Refresh token is invalid",
            ErrorCode::AttachmentRejected => "Attachment was rejected",

            ErrorCode::AuthenticationFailed => "Authentication failed",
            ErrorCode::ExpiredAuthToken => "Access token has expired",
            ErrorCode::InvalidAuthToken => "Access token is invalid",

            ErrorCode::NotEnoughPermission => "Not enough permission",

            ErrorCode::UserNotFound => "User not found",
            ErrorCode::TicketNotFound => "Ticket not found",
            ErrorCode::NotificationNotFound => "Notification not found",

            ErrorCode::DatabaseError => "A database error occurred",
            ErrorCode::FileStorageError => "File could not be stored",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::TokenGenerationFailed => "Token generation failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRefreshToken |
            ErrorCode::NotRefreshToken |
            ErrorCode::InvalidEmailPwd |
            ErrorCode::ValidationError |
            ErrorCode::DuplicateAccountEmail |
            ErrorCode::AttachmentRejected => StatusCode::BAD_REQUEST,

            ErrorCode::AuthenticationFailed |
            ErrorCode::ExpiredAuthToken |
            ErrorCode::InvalidAuthToken => StatusCode::UNAUTHORIZED,

            ErrorCode::NotEnoughPermission => StatusCode::FORBIDDEN,

            ErrorCode::UserNotFound |
            ErrorCode::TicketNotFound |
            ErrorCode::NotificationNotFound => StatusCode::NOT_FOUND,

            ErrorCode::DatabaseError |
            ErrorCode::FileStorageError |
            ErrorCode::InternalError |
            ErrorCode::TokenGenerationFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationFieldError {
    pub field: String,
    pub message: String,
}

impl ValidationFieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    ApiError(ErrorCode, Option<String>),

    #[error("{}", ErrorCode::ValidationError)]
    ValidationError(Vec<ValidationFieldError>),
}

impl AppError {
    pub fn new(code: ErrorCode) -> Self {
        AppError::ApiError(code, None)
    }

    pub fn with_detail(code: ErrorCode, detail: impl Into<String>) -> Self {
        AppError::ApiError(code, Some(detail.into()))
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::ApiError(code, _) => *code,
            AppError::ValidationError(_) => ErrorCode::ValidationError,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    code: String,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a [ValidationFieldError]>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.code().status_code()
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.code();
        let response = match self {
            AppError::ApiError(_, detail) => ErrorResponse {
                code: format!("{:?}", code),
                message: code.message(),
                detail: detail.as_deref(),
                errors: None,
            },
            AppError::ValidationError(errors) => ErrorResponse {
                code: format!("{:?}", code),
                message: code.message(),
                detail: None,
                errors: Some(errors),
            },
        };

        HttpResponse::build(code.status_code()).json(response)
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        tracing::error!(error = %err, "database error");
        AppError::new(ErrorCode::DatabaseError)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::error!(error = %err, "token generation failed");
        AppError::new(ErrorCode::TokenGenerationFailed)
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        tracing::error!(error = %err, "password hashing failed");
        AppError::new(ErrorCode::InternalError)
    }
}

impl From<FileStorageError> for AppError {
    fn from(err: FileStorageError) -> Self {
        match err {
            FileStorageError::Io(io) => {
                tracing::error!(error = %io, "file storage failure");
                AppError::new(ErrorCode::FileStorageError)
            }
            rejected => AppError::with_detail(ErrorCode::AttachmentRejected, rejected.to_string()),
        }
    }
}

impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::Validation(errors) => AppError::ValidationError(errors),
            TicketError::NotFound { entity: "notification", id } => {
                AppError::with_detail(ErrorCode::NotificationNotFound, id)
            }
            TicketError::NotFound { id, .. } => AppError::with_detail(ErrorCode::TicketNotFound, id),
            TicketError::Forbidden(reason) => {
                AppError::with_detail(ErrorCode::NotEnoughPermission, reason)
            }
            TicketError::Storage(db) => db.into(),
            TicketError::FileStorage(file) => file.into(),
        }
    }
}
