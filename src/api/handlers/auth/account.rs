//! Account domain model: roles, permissions, and field validation.
//!
//! Validation lives here as plain functions invoked before construction so
//! the invariants hold no matter which store backs the accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::lockout::LockState;

/// Departments staff accounts may belong to.
pub const DEPARTMENTS: &[&str] = &[
    "Emergency",
    "Surgery",
    "Pediatrics",
    "Cardiology",
    "Oncology",
    "Laboratory",
    "Radiology",
    "Administration",
];

/// Full permission vocabulary.
pub const PERMISSIONS: &[&str] = &[
    "read_patients",
    "write_patients",
    "delete_patients",
    "read_staff",
    "write_staff",
    "delete_staff",
    "read_appointments",
    "write_appointments",
    "cancel_appointments",
    "read_medical_records",
    "write_medical_records",
    "read_lab_results",
    "write_lab_results",
    "admin_dashboard",
    "system_settings",
    "audit_logs",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
    Nurse,
    Admin,
    LabTechnician,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Admin => "admin",
            Self::LabTechnician => "lab_technician",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "patient" => Some(Self::Patient),
            "doctor" => Some(Self::Doctor),
            "nurse" => Some(Self::Nurse),
            "admin" => Some(Self::Admin),
            "lab_technician" => Some(Self::LabTechnician),
            _ => None,
        }
    }

    /// Patients are the only non-staff role.
    #[must_use]
    pub fn is_staff(self) -> bool {
        !matches!(self, Self::Patient)
    }

    #[must_use]
    pub fn public_id_prefix(self) -> &'static str {
        if self.is_staff() {
            "STF"
        } else {
            "PAT"
        }
    }

    /// Permission set granted at registration.
    #[must_use]
    pub fn default_permissions(self) -> Vec<String> {
        let permissions: &[&str] = match self {
            Self::Patient => &["read_appointments", "write_appointments"],
            Self::Nurse => &[
                "read_patients",
                "read_appointments",
                "write_appointments",
                "read_medical_records",
            ],
            Self::Doctor => &[
                "read_patients",
                "write_patients",
                "read_appointments",
                "write_appointments",
                "read_medical_records",
                "write_medical_records",
                "read_lab_results",
            ],
            Self::LabTechnician => &["read_patients", "read_lab_results", "write_lab_results"],
            Self::Admin => PERMISSIONS,
        };
        permissions.iter().map(ToString::to_string).collect()
    }
}

/// One account as stored, password hash included.
///
/// Sessions are addressed by `(account id, session id)` through the store;
/// they are exclusively owned by the account but not carried on this struct.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: Uuid,
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<String>,
    pub permissions: Vec<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub failed_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_password_change: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    #[must_use]
    pub fn lock_state(&self) -> LockState {
        LockState {
            failed_attempts: self.failed_attempts,
            lock_until: self.lock_until,
        }
    }
}

/// One concurrent login for an account.
#[derive(Clone, Debug)]
pub struct Session {
    pub session_id: String,
    pub device_info: String,
    pub ip_address: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Minimum password length; no character-class rules beyond it.
pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

pub fn valid_phone(phone: &str) -> bool {
    !phone.trim().is_empty()
        && phone
            .chars()
            .enumerate()
            .all(|(i, c)| c.is_ascii_digit() || " -()".contains(c) || (i == 0 && c == '+'))
}

pub fn valid_department(department: &str) -> bool {
    DEPARTMENTS.contains(&department)
}
