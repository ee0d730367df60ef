use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::exchange::store::StoreError;

/// Request-level error taxonomy. Every variant maps to a stable
/// machine-readable reason string and an HTTP status; internal detail
/// is logged, never echoed to the client.
#[derive(Debug)]
pub enum ApiError {
    /// Required request field absent or empty
    MissingField,
    /// Request payload is not valid base64
    InvalidEncoding,
    /// X-Access-Key-Hash header absent
    MissingAccessKey,
    /// No record matches id + capability (wrong key is indistinguishable)
    NotFound,
    /// Record existed but passed its expiry; evicted as a side effect
    Expired,
    /// Download accounting limit exhausted
    DownloadLimitReached,
    /// Decoded upload exceeds the configured size cap
    PayloadTooLarge,
    /// file_id collision on insert
    DuplicateId,
    /// Infrastructure failure talking to the store
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingField | ApiError::InvalidEncoding => StatusCode::BAD_REQUEST,
            ApiError::MissingAccessKey => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Expired | ApiError::DownloadLimitReached => StatusCode::GONE,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DuplicateId | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::MissingField => "Missing required fields",
            ApiError::InvalidEncoding => "Invalid base64 payload",
            ApiError::MissingAccessKey => "Missing access key",
            ApiError::NotFound => "File not found",
            ApiError::Expired => "File expired",
            ApiError::DownloadLimitReached => "Download limit reached",
            ApiError::PayloadTooLarge => "Payload too large",
            ApiError::DuplicateId => "Duplicate file id",
            ApiError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("Internal error: {}", detail);
        }
        (self.status(), Json(json!({ "error": self.reason() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateId => ApiError::DuplicateId,
            StoreError::Backend(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("Task join error: {}", err))
    }
}
