//! Auth failures mapped to HTTP responses.
//!
//! Client-facing messages are deliberately generic; the precise reason is
//! logged server-side only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Access denied. No token provided.")]
    NoCredentials,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Account is temporarily locked due to failed login attempts.")]
    AccountLocked,

    #[error("Account no longer exists or is inactive.")]
    AccountInactiveOrMissing,

    #[error("Invalid or expired token.")]
    TokenInvalid,

    #[error("Password recently changed. Please log in again.")]
    TokenStale,

    #[error("Access denied. Insufficient privileges.")]
    Forbidden,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoCredentials
            | Self::InvalidCredentials
            | Self::AccountInactiveOrMissing
            | Self::TokenInvalid
            | Self::TokenStale => StatusCode::UNAUTHORIZED,
            Self::AccountLocked => StatusCode::LOCKED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Internal(err) => {
                error!("internal error: {err:?}");
                "Internal server error.".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (self.status(), body).into_response()
    }
}
