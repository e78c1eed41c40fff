//! Password change for an authenticated account.
//!
//! Changing the password stales every token issued before the change and
//! drops every other session; only the session performing the change
//! survives.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::api::response::ApiResponse;

use super::{
    account::{valid_password, MIN_PASSWORD_CHARS},
    error::AuthError,
    gate::authenticate,
    password::{hash_password, verify_password},
    state::AuthState,
    types::PasswordChangeRequest,
};

#[utoipa::path(
    put,
    path = "/v1/auth/password",
    request_body = PasswordChangeRequest,
    responses(
        (status = 200, description = "Password updated, other sessions dropped"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Missing token or wrong current password")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn change_password(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let now = Utc::now();
    let principal = authenticate(&state, &headers, now).await?;

    let account = state
        .store()
        .find_by_id(principal.account_id)
        .await
        .map_err(AuthError::Internal)?
        .ok_or(AuthError::AccountInactiveOrMissing)?;

    if !verify_password(&payload.current_password, &account.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    if !valid_password(&payload.new_password) {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters."
        )));
    }

    let hash = hash_password(&payload.new_password)?;
    state
        .store()
        .set_password(account.id, &hash, now)
        .await
        .map_err(AuthError::Internal)?;

    state
        .store()
        .remove_other_sessions(account.id, &principal.session_id)
        .await
        .map_err(AuthError::Internal)?;

    info!(account = %account.public_id, "password changed");

    Ok(Json(ApiResponse::<()>::message(
        "Password updated. Please log in again.",
    )))
}
