use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::application::LedgerError;

/// An error already classified for the wire: a status and a message that is
/// safe to show callers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.message)
    }
}

/// 507 is reused as the "insufficient funds" signal.
pub const INSUFFICIENT_FUNDS: StatusCode = StatusCode::INSUFFICIENT_STORAGE;

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::bad_request(msg),
            LedgerError::AccountNotFound(_) | LedgerError::HistoryNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, err.to_string())
            }
            LedgerError::AccountExists(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            LedgerError::InsufficientFunds { .. } => {
                Self::new(INSUFFICIENT_FUNDS, "insufficient funds")
            }
            LedgerError::ConcurrencyTimeout(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string())
            }
            LedgerError::Database(cause) => {
                tracing::error!(error = ?cause, "request failed on storage");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "code": status.as_u16(),
            "message": message.into(),
            "data": null,
        })),
    )
        .into_response()
}

pub fn json_success(data: impl serde::Serialize) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "code": StatusCode::OK.as_u16(),
            "data": data,
            "message": "successful",
        })),
    )
        .into_response()
}
