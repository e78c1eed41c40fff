//! Account registration. A successful registration logs the account in.

use axum::{extract::Extension, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use ulid::Ulid;

use crate::api::response::ApiResponse;

use super::{
    account::{valid_department, valid_password, valid_phone, Role, MIN_PASSWORD_CHARS},
    error::AuthError,
    login::LoginOutcome,
    password::hash_password,
    session::create_session,
    state::AuthState,
    storage::{CreateOutcome, NewAccount},
    types::{LoginData, PublicProfile, RegisterRequest},
    utils::{extract_client_ip, extract_device_info, normalize_email, valid_email},
};

fn validate(payload: &RegisterRequest) -> Result<Role, AuthError> {
    if payload.name.trim().is_empty() {
        return Err(AuthError::Validation("Name is required.".to_string()));
    }

    if !valid_email(&normalize_email(&payload.email)) {
        return Err(AuthError::Validation(
            "A valid email address is required.".to_string(),
        ));
    }

    if !valid_password(&payload.password) {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters."
        )));
    }

    let role = Role::parse(&payload.role)
        .ok_or_else(|| AuthError::Validation("Unknown role.".to_string()))?;

    if role.is_staff() {
        match payload.department.as_deref() {
            Some(department) if valid_department(department) => {}
            _ => {
                return Err(AuthError::Validation(
                    "Staff accounts require a valid department.".to_string(),
                ));
            }
        }
    }

    if let Some(phone) = payload.phone.as_deref() {
        if !valid_phone(phone) {
            return Err(AuthError::Validation(
                "Phone number is not valid.".to_string(),
            ));
        }
    }

    Ok(role)
}

pub async fn register_flow(
    state: &AuthState,
    payload: RegisterRequest,
    device_info: String,
    ip_address: String,
    now: DateTime<Utc>,
) -> Result<LoginOutcome, AuthError> {
    let role = validate(&payload)?;
    let email = normalize_email(&payload.email);
    let password_hash = hash_password(&payload.password)?;

    let department = role.is_staff().then(|| payload.department).flatten();
    let outcome = state
        .store()
        .create(NewAccount {
            public_id: format!("{}{}", role.public_id_prefix(), Ulid::new()),
            name: payload.name.trim().to_string(),
            email,
            phone: payload.phone,
            password_hash,
            role,
            department,
            permissions: role.default_permissions(),
        })
        .await
        .map_err(AuthError::Internal)?;

    let account = match outcome {
        CreateOutcome::Created(account) => account,
        CreateOutcome::EmailTaken => {
            return Err(AuthError::Validation(
                "Email is already registered.".to_string(),
            ));
        }
    };

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

    info!(account = %account.public_id, role = account.role.as_str(), "account registered");

    Ok(LoginOutcome {
        tokens,
        profile: PublicProfile::from(&account),
    })
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and logged in"),
        (status = 400, description = "Validation failure or email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let outcome = register_flow(
        &state,
        payload,
        extract_device_info(&headers),
        extract_client_ip(&headers),
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            "Account created.",
            LoginData::new(outcome.tokens, outcome.profile),
        )),
    ))
}
