use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{range}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Availability configuration errors
/// - E3xxx: Matching errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    BadRequest,

    // Availability (E1xxx)
    ConfigNotFound,
    ConfigAlreadyExists,
    NoAvailabilitySet,

    // Matching (E3xxx)
    MatchNotFound,
    OrganisationNotFound,
    UnauthorizedMatch,
    InvalidRating,
    InvalidAvailability,
    MatchNotAccepted,
    FeedbackAlreadyExists,
    NoUsersToMatch,
    AlreadyInMatch,
    PairAlreadyMatched,
    MatchClosed,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::BadRequest => "E0008",

            // Availability
            Self::ConfigNotFound => "E1001",
            Self::ConfigAlreadyExists => "E1002",
            Self::NoAvailabilitySet => "E1003",

            // Matching
            Self::MatchNotFound => "E3001",
            Self::OrganisationNotFound => "E3002",
            Self::UnauthorizedMatch => "E3003",
            Self::InvalidRating => "E3004",
            Self::InvalidAvailability => "E3005",
            Self::MatchNotAccepted => "E3006",
            Self::FeedbackAlreadyExists => "E3007",
            Self::NoUsersToMatch => "E3008",
            Self::AlreadyInMatch => "E3009",
            Self::PairAlreadyMatched => "E3010",
            Self::MatchClosed => "E3011",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::NoAvailabilitySet
            | Self::InvalidRating | Self::InvalidAvailability => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::ConfigNotFound | Self::MatchNotFound
            | Self::OrganisationNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::UnauthorizedMatch => StatusCode::FORBIDDEN,
            Self::ConfigAlreadyExists | Self::FeedbackAlreadyExists | Self::NoUsersToMatch
            | Self::AlreadyInMatch | Self::PairAlreadyMatched | Self::MatchClosed => StatusCode::CONFLICT,
            Self::MatchNotAccepted => StatusCode::PRECONDITION_FAILED,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The error kind, for callers that branch on what went wrong.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
            AppError::Database(diesel::result::Error::NotFound) => ErrorCode::NotFound,
            AppError::Database(_) => ErrorCode::InternalError,
            AppError::Validation(_) => ErrorCode::ValidationError,
        }
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code() == code
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message } => (code.status_code(), ApiErrorResponse::new(code.code(), message)),
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
