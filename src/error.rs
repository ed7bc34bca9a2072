use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the issuance pipeline and the HTTP layer.
///
/// Validation and NotFound are raised before any serial is allocated, so
/// they never leave side effects behind. The remaining variants are only
/// returned after rollback has been attempted.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("could not allocate a unique identifier after {0} attempts")]
    DuplicateExhausted(u32),

    #[error("certificate rendering failed: {0}")]
    Render(String),

    #[error("asset upload failed: {0}")]
    Upload(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        match err {
            // A duplicate that escapes the retry loops is a plain conflict.
            crate::db::DbError::Duplicate => AppError::Conflict("record"),
            crate::db::DbError::Other(e) => AppError::Database(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            AppError::DuplicateExhausted(_) | AppError::Render(_) | AppError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        let body = axum::Json(serde_json::json!({
            "status": "error",
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
