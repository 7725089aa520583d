//! # API Error Type
//!
//! Every handler returns `Result<_, ApiError>`. The error renders as a JSON
//! body with a stable machine-readable code:
//!
//! ```json
//! { "code": "OUT_OF_STOCK", "error": "Book 7 has no copies available" }
//! ```
//!
//! ## Status Mapping
//! ```text
//! ┌──────────────────────────────────────┬────────┬──────────────────────┐
//! │ Source                               │ Status │ Code                 │
//! ├──────────────────────────────────────┼────────┼──────────────────────┤
//! │ ValidationError, bad JSON/path/query │  400   │ VALIDATION_ERROR     │
//! │ No or invalid session                │  401   │ UNAUTHORIZED         │
//! │ Book/Member/Loan/Barcode not found   │  404   │ NOT_FOUND            │
//! │ Duplicate ISBN / username            │  409   │ DUPLICATE            │
//! │ Active loans, barcode in use         │  409   │ CONFLICT             │
//! │ No copies left                       │  422   │ OUT_OF_STOCK         │
//! │ Borrowing limit reached              │  422   │ LIMIT_EXCEEDED       │
//! │ Lending transaction failed           │  500   │ LENDING_FAILED       │
//! │ Anything else from the database      │  500   │ DATABASE_ERROR       │
//! └──────────────────────────────────────┴────────┴──────────────────────┘
//! ```
//!
//! 500 responses never carry database details; those go to the log.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use library_core::{CoreError, ValidationError};
use library_db::DbError;
use serde::Serialize;

/// An error as returned to API clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    error: &'a str,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code,
            error: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BookNotFound(_) | CoreError::MemberNotFound(_) | CoreError::LoanNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            CoreError::OutOfStock { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "OUT_OF_STOCK", err.to_string())
            }
            CoreError::LimitExceeded { .. } => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "LIMIT_EXCEEDED", err.to_string())
            }
            CoreError::LendingFailed(detail) => {
                tracing::error!(error = %detail, "Lending transaction failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LENDING_FAILED",
                    "The lending operation could not be completed",
                )
            }
            CoreError::Validation(v) => v.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Rule(core) => core.into(),
            DbError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DbError::UniqueViolation { .. } => {
                ApiError::new(StatusCode::CONFLICT, "DUPLICATE", err.to_string())
            }
            DbError::Conflict(_) | DbError::ForeignKeyViolation { .. } => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", err.to_string())
            }
            other => {
                tracing::error!(error = %other, "Database error");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
