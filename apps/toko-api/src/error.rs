//! HTTP error mapping.
//!
//! ```text
//! validation          400
//! unauthenticated     401   (missing or bad identity headers)
//! forbidden           403
//! not_found           404
//! insufficient_stock  409
//! conflict            409
//! inactive_variant    422
//! storage             500   (message hidden from the client)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use toko_stock::{ErrorKind, StockError};

/// Error body returned by every endpoint: `{"code": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", message)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InsufficientStock | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InactiveVariant => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Storage => {
                error!(error = %err, "Storage failure");
                "Internal storage error".to_string()
            }
            _ => err.to_string(),
        };

        ApiError::new(status_for(kind), kind.as_str(), message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
