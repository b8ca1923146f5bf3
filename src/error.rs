//! Application error type and its HTTP mapping.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

use crate::auth::password::{PasswordError, PolicyViolation};
use crate::users::repo::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing a field in request body")]
    MissingCredentials,

    #[error("Missing '{0}' in request body")]
    MissingField(&'static str),

    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    /// Unknown user and wrong password share this variant.
    #[error("Incorrect username or password")]
    AuthFailure,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Request body must contain either 'age', 'height' or 'userweight'")]
    EmptyStatsUpdate,

    #[error("Invalid JSON in request body")]
    InvalidBody,

    #[error("Unauthorized request")]
    Unauthenticated,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<PasswordError> for AppError {
    fn from(e: PasswordError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Client-facing body. Login and token errors use a flat `error` string,
    /// everything else nests the text under `error.message`.
    pub fn body(&self) -> Value {
        match self {
            AppError::MissingCredentials | AppError::AuthFailure | AppError::Unauthenticated => {
                json!({ "error": self.to_string() })
            }
            AppError::StoreUnavailable(_) | AppError::Internal(_) => {
                json!({ "error": { "message": "Internal server error" } })
            }
            _ => json!({ "error": { "message": self.to_string() } }),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
