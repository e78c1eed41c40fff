//! Account persistence.
//!
//! The [`AccountStore`] trait is the seam between the auth flows and
//! Postgres; flows and tests run against any implementation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{
    account::{Account, Role, Session},
    lockout::LockState,
};

/// Fields for a new account row; everything else takes its column default.
#[derive(Clone, Debug)]
pub struct NewAccount {
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub department: Option<String>,
    pub permissions: Vec<String>,
}

/// Outcome of an account insert; the email unique constraint is the only
/// conflict a caller has to handle.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(Account),
    EmailTaken,
}

/// Partial update of the security fields. `None` leaves a column untouched;
/// `lock_until` is doubly optional so the expiry can be cleared.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecurityPatch {
    pub failed_attempts: Option<i32>,
    pub lock_until: Option<Option<DateTime<Utc>>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl SecurityPatch {
    #[must_use]
    pub fn from_lock_state(state: LockState) -> Self {
        Self {
            failed_attempts: Some(state.failed_attempts),
            lock_until: Some(state.lock_until),
            last_login: None,
        }
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome>;

    async fn update_security(&self, id: Uuid, patch: SecurityPatch) -> Result<()>;

    async fn set_password(&self, id: Uuid, hash: &str, changed_at: DateTime<Utc>) -> Result<()>;

    async fn add_session(&self, id: Uuid, session: Session) -> Result<()>;

    /// Removing an absent session is not an error.
    async fn remove_session(&self, id: Uuid, session_id: &str) -> Result<()>;

    async fn remove_other_sessions(&self, id: Uuid, keep_session_id: &str) -> Result<()>;

    async fn find_session(&self, id: Uuid, session_id: &str) -> Result<Option<Session>>;

    async fn touch_session(&self, id: Uuid, session_id: &str, now: DateTime<Utc>) -> Result<()>;
}

const ACCOUNT_COLUMNS: &str = "id, public_id, name, email, phone, password_hash, role, \
     department, permissions, is_active, is_verified, failed_attempts, lock_until, \
     last_password_change, last_login";

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    let role: String = row.try_get("role")?;
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown role in accounts row: {role}"))?;

    Ok(Account {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        password_hash: row.try_get("password_hash")?,
        role,
        department: row.try_get("department")?,
        permissions: row.try_get("permissions")?,
        is_active: row.try_get("is_active")?,
        is_verified: row.try_get("is_verified")?,
        failed_attempts: row.try_get("failed_attempts")?,
        lock_until: row.try_get("lock_until")?,
        last_password_change: row.try_get("last_password_change")?,
        last_login: row.try_get("last_login")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<Session> {
    Ok(Session {
        session_id: row.try_get("session_id")?,
        device_info: row.try_get("device_info")?,
        ip_address: row.try_get("ip_address")?,
        created_at: row.try_get("created_at")?,
        last_accessed: row.try_get("last_accessed")?,
        expires_at: row.try_get("expires_at")?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query,
        );

        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query account by email")?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query,
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query account by id")?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let query = format!(
            "INSERT INTO accounts \
             (public_id, name, email, phone, password_hash, role, department, permissions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query,
        );

        let result = sqlx::query(&query)
            .bind(&account.public_id)
            .bind(&account.name)
            .bind(&account.email)
            .bind(&account.phone)
            .bind(&account.password_hash)
            .bind(account.role.as_str())
            .bind(&account.department)
            .bind(&account.permissions)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(row) => Ok(CreateOutcome::Created(account_from_row(&row)?)),
            Err(err) if is_unique_violation(&err) => Ok(CreateOutcome::EmailTaken),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn update_security(&self, id: Uuid, patch: SecurityPatch) -> Result<()> {
        // $3 flags whether $4 overwrites lock_until; COALESCE cannot express
        // clearing a column to NULL.
        let query = "UPDATE accounts SET \
             failed_attempts = COALESCE($2, failed_attempts), \
             lock_until = CASE WHEN $3 THEN $4 ELSE lock_until END, \
             last_login = COALESCE($5, last_login) \
             WHERE id = $1";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(id)
            .bind(patch.failed_attempts)
            .bind(patch.lock_until.is_some())
            .bind(patch.lock_until.flatten())
            .bind(patch.last_login)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update account security fields")?;

        Ok(())
    }

    async fn set_password(&self, id: Uuid, hash: &str, changed_at: DateTime<Utc>) -> Result<()> {
        let query =
            "UPDATE accounts SET password_hash = $2, last_password_change = $3 WHERE id = $1";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(id)
            .bind(hash)
            .bind(changed_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password hash")?;

        Ok(())
    }

    async fn add_session(&self, id: Uuid, session: Session) -> Result<()> {
        let query = "INSERT INTO account_sessions \
             (session_id, account_id, device_info, ip_address, created_at, last_accessed, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(&session.session_id)
            .bind(id)
            .bind(&session.device_info)
            .bind(&session.ip_address)
            .bind(session.created_at)
            .bind(session.last_accessed)
            .bind(session.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert session")?;

        Ok(())
    }

    async fn remove_session(&self, id: Uuid, session_id: &str) -> Result<()> {
        let query = "DELETE FROM account_sessions WHERE account_id = $1 AND session_id = $2";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(id)
            .bind(session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;

        Ok(())
    }

    async fn remove_other_sessions(&self, id: Uuid, keep_session_id: &str) -> Result<()> {
        let query = "DELETE FROM account_sessions WHERE account_id = $1 AND session_id <> $2";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(id)
            .bind(keep_session_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete other sessions")?;

        Ok(())
    }

    async fn find_session(&self, id: Uuid, session_id: &str) -> Result<Option<Session>> {
        let query = "SELECT session_id, device_info, ip_address, created_at, last_accessed, \
             expires_at FROM account_sessions WHERE account_id = $1 AND session_id = $2";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query,
        );

        let row = sqlx::query(query)
            .bind(id)
            .bind(session_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to query session")?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn touch_session(&self, id: Uuid, session_id: &str, now: DateTime<Utc>) -> Result<()> {
        let query = "UPDATE account_sessions SET last_accessed = $3 \
             WHERE account_id = $1 AND session_id = $2";

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query,
        );

        sqlx::query(query)
            .bind(id)
            .bind(session_id)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to touch session")?;

        Ok(())
    }
}
