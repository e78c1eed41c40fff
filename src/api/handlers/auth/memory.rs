//! In-memory [`AccountStore`] used by tests and local development.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    account::{Account, Session},
    storage::{AccountStore, CreateOutcome, NewAccount, SecurityPatch},
};

#[derive(Clone)]
struct Record {
    account: Account,
    sessions: Vec<Session>,
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Record>>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts
            .values()
            .find(|record| record.account.email == email)
            .map(|record| record.account.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(&id).map(|record| record.account.clone()))
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let mut accounts = self.accounts.lock().await;

        if accounts
            .values()
            .any(|record| record.account.email == account.email)
        {
            return Ok(CreateOutcome::EmailTaken);
        }

        let created = Account {
            id: Uuid::new_v4(),
            public_id: account.public_id,
            name: account.name,
            email: account.email,
            phone: account.phone,
            password_hash: account.password_hash,
            role: account.role,
            department: account.department,
            permissions: account.permissions,
            is_active: true,
            is_verified: false,
            failed_attempts: 0,
            lock_until: None,
            last_password_change: Utc::now(),
            last_login: None,
        };
        accounts.insert(
            created.id,
            Record {
                account: created.clone(),
                sessions: Vec::new(),
            },
        );

        Ok(CreateOutcome::Created(created))
    }

    async fn update_security(&self, id: Uuid, patch: SecurityPatch) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            if let Some(failed_attempts) = patch.failed_attempts {
                record.account.failed_attempts = failed_attempts;
            }
            if let Some(lock_until) = patch.lock_until {
                record.account.lock_until = lock_until;
            }
            if let Some(last_login) = patch.last_login {
                record.account.last_login = Some(last_login);
            }
        }
        Ok(())
    }

    async fn set_password(&self, id: Uuid, hash: &str, changed_at: DateTime<Utc>) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            record.account.password_hash = hash.to_string();
            record.account.last_password_change = changed_at;
        }
        Ok(())
    }

    async fn add_session(&self, id: Uuid, session: Session) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            record.sessions.push(session);
        }
        Ok(())
    }

    async fn remove_session(&self, id: Uuid, session_id: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            record.sessions.retain(|s| s.session_id != session_id);
        }
        Ok(())
    }

    async fn remove_other_sessions(&self, id: Uuid, keep_session_id: &str) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            record.sessions.retain(|s| s.session_id == keep_session_id);
        }
        Ok(())
    }

    async fn find_session(&self, id: Uuid, session_id: &str) -> Result<Option<Session>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(&id).and_then(|record| {
            record
                .sessions
                .iter()
                .find(|s| s.session_id == session_id)
                .cloned()
        }))
    }

    async fn touch_session(&self, id: Uuid, session_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut accounts = self.accounts.lock().await;
        if let Some(record) = accounts.get_mut(&id) {
            if let Some(session) = record
                .sessions
                .iter_mut()
                .find(|s| s.session_id == session_id)
            {
                session.last_accessed = now;
            }
        }
        Ok(())
    }
}
