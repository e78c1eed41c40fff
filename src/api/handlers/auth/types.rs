//! Request/response payloads for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::account::{Account, Role};
use super::token::TokenPair;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub role: String,
    pub department: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordChangeRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Account view safe to return to clients; the id here is the public id,
/// never the row uuid.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub permissions: Vec<String>,
}

impl From<&Account> for PublicProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.public_id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            role: account.role,
            department: account.department.clone(),
            permissions: account.permissions.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: i64,
    pub user: PublicProfile,
}

impl LoginData {
    #[must_use]
    pub fn new(tokens: TokenPair, user: PublicProfile) -> Self {
        Self {
            token: tokens.token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_at: tokens.expires_at,
            user,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn profile_exposes_public_id_only() -> anyhow::Result<()> {
        let account = Account {
            id: Uuid::new_v4(),
            public_id: "PAT01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Patient,
            department: None,
            permissions: vec!["read_appointments".to_string()],
            is_active: true,
            is_verified: false,
            failed_attempts: 0,
            lock_until: None,
            last_password_change: Utc::now(),
            last_login: None,
        };

        let json = serde_json::to_string(&PublicProfile::from(&account))?;
        assert!(json.contains("PAT01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        assert!(!json.contains(&account.id.to_string()));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("department"));
        Ok(())
    }
}
