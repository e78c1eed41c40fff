//! Profile of the authenticated caller.

use axum::{extract::Extension, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;

use crate::api::response::ApiResponse;

use super::{error::AuthError, gate::authenticate, state::AuthState, types::PublicProfile};

#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Profile of the authenticated account", body = PublicProfile),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;

    let profile = PublicProfile {
        id: principal.public_id,
        name: principal.name,
        email: principal.email,
        role: principal.role,
        department: principal.department,
        permissions: principal.permissions,
    };

    Ok(Json(ApiResponse::ok("OK", profile)))
}
