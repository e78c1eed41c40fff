//! Appointment scheduling.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::response::ApiResponse;

use super::auth::{authenticate, require_permission, AuthError, AuthState};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_CHECKED_IN: &str = "checked_in";

#[derive(Debug, Serialize, ToSchema)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub date: NaiveDate,
    /// Wall-clock slot, e.g. "10:30".
    pub time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AppointmentFilter {
    pub patient_id: Option<Uuid>,
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment, sqlx::Error> {
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        notes: row.try_get("notes")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

const APPOINTMENT_COLUMNS: &str = "id, patient_id, date, time, notes, status, created_at";

async fn fetch_appointments(
    pool: &PgPool,
    patient_id: Option<Uuid>,
) -> Result<Vec<Appointment>, sqlx::Error> {
    let query = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
         WHERE $1::uuid IS NULL OR patient_id = $1 ORDER BY created_at DESC"
    );

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query,
    );

    let rows = sqlx::query(&query)
        .bind(patient_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter().map(appointment_from_row).collect()
}

async fn insert_appointment(
    pool: &PgPool,
    appointment: &NewAppointment,
) -> Result<Appointment, sqlx::Error> {
    let query = format!(
        "INSERT INTO appointments (patient_id, date, time, notes, status) \
         VALUES ($1, $2, $3, $4, '{STATUS_PENDING}') \
         RETURNING {APPOINTMENT_COLUMNS}"
    );

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = %query,
    );

    let row = sqlx::query(&query)
        .bind(appointment.patient_id)
        .bind(appointment.date)
        .bind(&appointment.time)
        .bind(&appointment.notes)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    appointment_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/v1/appointments",
    params(AppointmentFilter),
    responses(
        (status = 200, description = "Appointment listing, optionally per patient"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller lacks read_appointments")
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
pub async fn list(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Query(filter): Query<AppointmentFilter>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_permission(&principal, "read_appointments")?;

    let appointments = fetch_appointments(&pool, filter.patient_id)
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    Ok(Json(ApiResponse::ok("OK", appointments)))
}

#[utoipa::path(
    post,
    path = "/v1/appointments",
    request_body = NewAppointment,
    responses(
        (status = 201, description = "Appointment scheduled as pending"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller lacks write_appointments")
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
pub async fn create(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<NewAppointment>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_permission(&principal, "write_appointments")?;

    if payload.time.trim().is_empty() {
        return Err(AuthError::Validation("Time is required.".to_string()));
    }

    let appointment = insert_appointment(&pool, &payload)
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Appointment scheduled.", appointment)),
    ))
}
