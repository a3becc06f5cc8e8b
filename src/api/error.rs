use std::sync::OnceLock;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

// Resolved once at startup from the config; never mutated afterwards.
static EXPOSE_STACKS: OnceLock<bool> = OnceLock::new();

pub fn set_expose_stacks(expose: bool) {
    let _ = EXPOSE_STACKS.set(expose);
}

fn expose_stacks() -> bool {
    EXPOSE_STACKS.get().copied().unwrap_or(false)
}

/// Error surfaced to the client as `{success: false, message, stack?}`.
///
/// `stack` carries the underlying error chain and is only attached when stack
/// exposure is enabled (outside production).
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    source: Option<anyhow::Error>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> ApiError {
        ApiError::bare(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> ApiError {
        ApiError::bare(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> ApiError {
        ApiError::bare(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> ApiError {
        ApiError::bare(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> ApiError {
        ApiError::bare(StatusCode::CONFLICT, message)
    }

    pub fn internal(source: anyhow::Error) -> ApiError {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: source.to_string(),
            source: Some(source),
        }
    }

    fn bare(status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError {
            status,
            message: message.into(),
            source: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self.source, message = %self.message, "request failed");
        }
        let expose = expose_stacks();
        let message = if self.status == StatusCode::INTERNAL_SERVER_ERROR && !expose {
            "Server error".to_string()
        } else {
            self.message
        };
        let mut body = json!({ "success": false, "message": message });
        if expose {
            if let Some(source) = &self.source {
                body["stack"] = json!(format!("{source:?}"));
            }
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> ApiError {
        ApiError::internal(err.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> ApiError {
        ApiError::internal(err)
    }
}
