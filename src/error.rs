use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::captions::CaptionError;
use crate::media::normalizer::NormalizeError;
use crate::plans::PlanError;
use crate::repository::RepositoryError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event unavailable")]
    EventUnavailable,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => AppError::NotFound,
            RepositoryError::Database(e) => AppError::Pool(e),
            RepositoryError::Sql(e) => AppError::Database(e),
            RepositoryError::Serialization(e) => AppError::Json(e),
            RepositoryError::Corrupt(msg) => AppError::Internal(msg),
        }
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Empty => AppError::BadRequest(err.to_string()),
            NormalizeError::TooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            NormalizeError::Unsupported(_) => AppError::UnsupportedMedia(err.to_string()),
            NormalizeError::Conversion(_) => AppError::BadRequest(err.to_string()),
            NormalizeError::HeicNotConverted => AppError::UnsupportedMedia(err.to_string()),
            NormalizeError::Encode(e) => AppError::Internal(format!("image encode: {}", e)),
            NormalizeError::Worker(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidPath(_) => AppError::NotFound,
            StorageError::Io(e) => AppError::Io(e),
        }
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::Invalid(msg) => AppError::BadRequest(msg),
            PlanError::Io(e) => AppError::Io(e),
            PlanError::Json(e) => AppError::Json(e),
        }
    }
}

impl From<CaptionError> for AppError {
    fn from(err: CaptionError) -> Self {
        match err {
            CaptionError::InvalidDataUri(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Unavailable(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge("The upload is too large.".into());
        }
        AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::UnsupportedMedia(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::EventUnavailable => (
                StatusCode::FORBIDDEN,
                "Access to this event is unavailable".to_string(),
            ),
            AppError::Unavailable(msg) => {
                tracing::warn!("Dependency unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal()
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {}", e);
                internal()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                internal()
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

pub type AppResult<T> = Result<T, AppError>;
