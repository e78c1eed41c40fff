//! Appointment check-in, QR-code style.
//!
//! The QR endpoint hands out the payload a client would encode; the
//! check-in endpoint consumes it and flips the appointment to checked-in.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::response::ApiResponse;

use super::appointments::{STATUS_CHECKED_IN, STATUS_PENDING};
use super::auth::{account::Role, authenticate, require_role, AuthError, AuthState};

#[derive(Debug, Deserialize, ToSchema)]
pub struct QrRequest {
    pub patient_id: Uuid,
}

/// What gets encoded into the QR code.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QrPayload {
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
}

async fn latest_pending_appointment(
    pool: &PgPool,
    patient_id: Uuid,
) -> Result<Option<Uuid>, sqlx::Error> {
    let query = format!(
        "SELECT id FROM appointments WHERE patient_id = $1 AND status = '{STATUS_PENDING}' \
         ORDER BY created_at DESC LIMIT 1"
    );

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query,
    );

    let row = sqlx::query(&query)
        .bind(patient_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    row.map(|row| row.try_get("id")).transpose()
}

async fn mark_checked_in(
    pool: &PgPool,
    patient_id: Uuid,
    appointment_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let query = format!(
        "UPDATE appointments SET status = '{STATUS_CHECKED_IN}' \
         WHERE id = $1 AND patient_id = $2 RETURNING id"
    );

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query,
    );

    let row = sqlx::query(&query)
        .bind(appointment_id)
        .bind(patient_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;

    Ok(row.is_some())
}

#[utoipa::path(
    post,
    path = "/v1/checkin/qr",
    request_body = QrRequest,
    responses(
        (status = 200, description = "QR payload for the latest pending appointment", body = QrPayload),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed to generate QR codes"),
        (status = 404, description = "No pending appointment for this patient")
    ),
    security(("bearer" = [])),
    tag = "checkin"
)]
pub async fn qr(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<QrRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_role(&principal, &[Role::Patient, Role::Nurse, Role::Admin])?;

    let appointment_id = latest_pending_appointment(&pool, payload.patient_id)
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    match appointment_id {
        Some(appointment_id) => Ok(Json(ApiResponse::ok(
            "OK",
            QrPayload {
                patient_id: payload.patient_id,
                appointment_id,
            },
        ))
        .into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::failure(
                "No pending appointment for this patient.",
            )),
        )
            .into_response()),
    }
}

#[utoipa::path(
    post,
    path = "/v1/checkin",
    request_body = QrPayload,
    responses(
        (status = 200, description = "Appointment marked checked-in"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Role not allowed to check patients in"),
        (status = 404, description = "No matching appointment")
    ),
    security(("bearer" = [])),
    tag = "checkin"
)]
pub async fn checkin(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<QrPayload>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_role(&principal, &[Role::Nurse, Role::Doctor, Role::Admin])?;

    let updated = mark_checked_in(&pool, payload.patient_id, payload.appointment_id)
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    if updated {
        info!(appointment = %payload.appointment_id, "patient checked in");
        Ok(Json(ApiResponse::<()>::message("Checked in.")).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::failure("No matching appointment.")),
        )
            .into_response())
    }
}
