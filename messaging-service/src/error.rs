use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server start failure: {0}")]
    StartServer(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("internal server error")]
    Internal,
}

impl AppError {
    /// Returns whether this error is retryable (e.g., database connection timeout)
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Database(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            AppError::ServiceUnavailable(_) | AppError::Internal => true,
            _ => false,
        }
    }

    /// Returns HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest(_) => 400,
            AppError::Unauthorized => 401,
            AppError::Forbidden => 403,
            AppError::NotFound => 404,
            AppError::ServiceUnavailable(_) => 503,
            AppError::Config(_)
            | AppError::StartServer(_)
            | AppError::Database(_)
            | AppError::Internal => 500,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        // Internal detail stays in the logs, not in the response body
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bad_request_to_400() {
        assert_eq!(AppError::BadRequest("missing".into()).status_code(), 400);
    }

    #[test]
    fn maps_not_found_to_404() {
        assert_eq!(AppError::NotFound.status_code(), 404);
    }

    #[test]
    fn maps_unavailable_to_503() {
        assert_eq!(
            AppError::ServiceUnavailable("redis down".into()).status_code(),
            503
        );
    }

    #[test]
    fn maps_config_error_to_500() {
        assert_eq!(AppError::Config("missing".into()).status_code(), 500);
    }

    #[test]
    fn pool_timeout_is_retryable() {
        assert!(AppError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!AppError::NotFound.is_retryable());
    }
}
