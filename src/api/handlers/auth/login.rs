//! Login, logout, and token refresh.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::response::ApiResponse;

use super::{
    error::AuthError,
    gate::{authenticate, resolve_claims},
    lockout::{is_locked, record_failure, record_success},
    password::verify_password,
    session::create_session,
    state::AuthState,
    storage::SecurityPatch,
    token::{TokenPair, TokenUse},
    types::{LoginData, LoginRequest, PublicProfile, RefreshRequest},
    utils::{extract_client_ip, extract_device_info, normalize_email},
};

pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub profile: PublicProfile,
}

/// Credential verification and lockout bookkeeping.
///
/// Unknown email, wrong password, and inactive account all collapse into
/// the same `InvalidCredentials` so the response does not leak which
/// accounts exist. The lock check runs before password verification, so a
/// locked account reveals nothing about the attempted password.
pub async fn login_flow(
    state: &AuthState,
    email: &str,
    password: &str,
    device_info: String,
    ip_address: String,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, AuthError> {
    let email = normalize_email(email);

    let Some(account) = state
        .store()
        .find_by_email(&email)
        .await
        .map_err(AuthError::Internal)?
    else {
        debug!("login for unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    if !account.is_active {
        return Err(AuthError::InvalidCredentials);
    }

    if is_locked(&account.lock_state(), now) {
        return Err(AuthError::AccountLocked);
    }

    if !verify_password(password, &account.password_hash) {
        let next = record_failure(&account.lock_state(), now);
        state
            .store()
            .update_security(account.id, SecurityPatch::from_lock_state(next))
            .await
            .map_err(AuthError::Internal)?;

        if is_locked(&next, now) {
            info!(account = %account.public_id, "account locked after repeated failures");
            return Err(AuthError::AccountLocked);
        }
        return Err(AuthError::InvalidCredentials);
    }

    let mut patch = SecurityPatch::from_lock_state(record_success());
    patch.last_login = Some(now);
    state
        .store()
        .update_security(account.id, patch)
        .await
        .map_err(AuthError::Internal)?;

    let session_id = create_session(
        state.store(),
        account.id,
        device_info,
        ip_address,
        now,
        state.config().session_ttl_seconds(),
    )
    .await
    .map_err(AuthError::Internal)?;

    let tokens = state
        .issuer()
        .issue_pair(account.id, account.role, &session_id, now)
        .map_err(AuthError::Internal)?;

    info!(account = %account.public_id, "login succeeded");

    Ok(LoginOutcome {
        tokens,
        profile: PublicProfile::from(&account),
    })
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated, token pair issued"),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid email or password"),
        (status = 423, description = "Account temporarily locked")
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required.".to_string(),
        ));
    }

    let outcome = login_flow(
        &state,
        &payload.email,
        &payload.password,
        extract_device_info(&headers),
        extract_client_ip(&headers),
        Utc::now(),
    )
    .await?;

    Ok(Json(ApiResponse::ok(
        "Login successful.",
        LoginData::new(outcome.tokens, outcome.profile),
    )))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Session removed"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;

    state
        .store()
        .remove_session(principal.account_id, &principal.session_id)
        .await
        .map_err(AuthError::Internal)?;

    Ok(Json(ApiResponse::<()>::message("Logged out.")))
}

#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair for the same session"),
        (status = 401, description = "Invalid, expired, or stale refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(state): Extension<Arc<AuthState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let now = Utc::now();

    let claims = state
        .issuer()
        .verify(&payload.refresh_token, TokenUse::Refresh)
        .map_err(|err| {
            debug!(reason = err.reason(), "refresh token rejected");
            AuthError::TokenInvalid
        })?;

    // The refresh token goes through the same account/session/lock checks
    // as an access token.
    let principal = resolve_claims(&state, &claims, now).await?;

    state
        .store()
        .touch_session(principal.account_id, &principal.session_id, now)
        .await
        .map_err(AuthError::Internal)?;

    let tokens = state
        .issuer()
        .issue_pair(principal.account_id, principal.role, &principal.session_id, now)
        .map_err(AuthError::Internal)?;

    Ok(Json(ApiResponse::ok("Token refreshed.", tokens)))
}
