use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Covers the full error taxonomy of the messaging core, providing
/// structured information for logging and user-facing responses.
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Validation Errors =====
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid pagination cursor")]
    InvalidCursor,

    // ===== Missing Collaborator Entities =====
    #[error("receiver not found")]
    ReceiverNotFound,

    #[error("item not found")]
    ItemNotFound,

    // ===== Authentication Errors =====
    #[error("authentication failed: {0}")]
    Unauthenticated(String),

    #[error("token expired")]
    TokenExpired,

    // ===== Storage Errors =====
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    // ===== Internal Errors =====
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidMessage(_) | AppError::InvalidCursor => StatusCode::BAD_REQUEST,
            AppError::ReceiverNotFound | AppError::ItemNotFound => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidMessage(_) => "INVALID_MESSAGE",
            AppError::InvalidCursor => "INVALID_CURSOR",
            AppError::ReceiverNotFound => "RECEIVER_NOT_FOUND",
            AppError::ItemNotFound => "ITEM_NOT_FOUND",
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::Storage(_) => "STORAGE_FAILURE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get a user-friendly error message without internal storage detail
    pub fn user_message(&self) -> String {
        match self {
            AppError::InvalidMessage(msg) => format!("Invalid message: {}", msg),
            AppError::InvalidCursor => "Invalid pagination cursor".to_string(),
            AppError::ReceiverNotFound => "Receiver not found".to_string(),
            AppError::ItemNotFound => "Item not found".to_string(),
            AppError::Unauthenticated(msg) => format!("Authentication failed: {}", msg),
            AppError::TokenExpired => "Token expired".to_string(),
            AppError::Storage(_) => "Storage error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(error = %self, error_code = %code, "Server error occurred");
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(error = %self, error_code = %code, "Authentication failed");
        } else {
            tracing::debug!(error = %self, error_code = %code, "Client error occurred");
        }
    }

    /// Create an authentication error
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        AppError::Unauthenticated(msg.into())
    }

    /// Create a message validation error
    pub fn invalid_message(msg: impl Into<String>) -> Self {
        AppError::InvalidMessage(msg.into())
    }

    /// Create an internal server error
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        let body = json!({
            "error": self.user_message(),
            "errorCode": self.error_code(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::invalid_message("empty").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidCursor.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::ReceiverNotFound.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::ItemNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::unauthenticated("no token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::internal("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_errors_are_redacted() {
        let err = AppError::Storage(sqlx::Error::PoolClosed);
        assert_eq!(err.user_message(), "Storage error");
        assert_eq!(err.error_code(), "STORAGE_FAILURE");
    }
}
