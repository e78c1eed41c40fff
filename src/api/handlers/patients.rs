//! Patient records.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::sync::Arc;
use tracing::{info_span, Instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::response::ApiResponse;

use super::auth::{authenticate, require_permission, AuthError, AuthState};

/// How the patient entered the hospital; drives billing downstream.
pub const CATEGORIES: &[&str] = &["Walk-in", "Referred", "HMO", "Hospital", "Corporate"];

#[derive(Debug, Serialize, ToSchema)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewPatient {
    pub name: String,
    pub phone: Option<String>,
    pub category: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PatientFilter {
    /// Restrict the listing to one category.
    pub category: Option<String>,
}

fn patient_from_row(row: &PgRow) -> Result<Patient, sqlx::Error> {
    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_patients(pool: &PgPool, category: Option<&str>) -> Result<Vec<Patient>, sqlx::Error> {
    let query = "SELECT id, name, phone, category, created_at FROM patients \
         WHERE $1::text IS NULL OR category = $1 ORDER BY created_at DESC";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query,
    );

    let rows = sqlx::query(query)
        .bind(category)
        .fetch_all(pool)
        .instrument(span)
        .await?;

    rows.iter().map(patient_from_row).collect()
}

async fn insert_patient(pool: &PgPool, patient: &NewPatient) -> Result<Patient, sqlx::Error> {
    let query = "INSERT INTO patients (name, phone, category) VALUES ($1, $2, $3) \
         RETURNING id, name, phone, category, created_at";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = %query,
    );

    let row = sqlx::query(query)
        .bind(&patient.name)
        .bind(&patient.phone)
        .bind(&patient.category)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    patient_from_row(&row)
}

#[utoipa::path(
    get,
    path = "/v1/patients",
    params(PatientFilter),
    responses(
        (status = 200, description = "Patient listing, optionally filtered by category"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller lacks read_patients")
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
pub async fn list(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Query(filter): Query<PatientFilter>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_permission(&principal, "read_patients")?;

    if let Some(category) = filter.category.as_deref() {
        if !CATEGORIES.contains(&category) {
            return Err(AuthError::Validation("Unknown patient category.".to_string()));
        }
    }

    let patients = fetch_patients(&pool, filter.category.as_deref())
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    Ok(Json(ApiResponse::ok("OK", patients)))
}

#[utoipa::path(
    post,
    path = "/v1/patients",
    request_body = NewPatient,
    responses(
        (status = 201, description = "Patient record created"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller lacks write_patients")
    ),
    security(("bearer" = [])),
    tag = "patients"
)]
pub async fn create(
    Extension(state): Extension<Arc<AuthState>>,
    Extension(pool): Extension<PgPool>,
    headers: HeaderMap,
    Json(payload): Json<NewPatient>,
) -> Result<impl IntoResponse, AuthError> {
    let principal = authenticate(&state, &headers, Utc::now()).await?;
    require_permission(&principal, "write_patients")?;

    if payload.name.trim().is_empty() {
        return Err(AuthError::Validation("Name is required.".to_string()));
    }
    if !CATEGORIES.contains(&payload.category.as_str()) {
        return Err(AuthError::Validation("Unknown patient category.".to_string()));
    }

    let patient = insert_patient(&pool, &payload)
        .await
        .map_err(|err| AuthError::Internal(err.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Patient created.", patient)),
    ))
}
