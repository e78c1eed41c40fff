//! Request authentication chain and authorization checks.
//!
//! Every protected handler calls [`authenticate`] first; role and
//! permission checks compose after it. The checks run in a fixed order so
//! a locked account with a bad token reports the token problem, not the
//! lock.

use anyhow::Context;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{
    account::Role,
    error::AuthError,
    lockout::is_locked,
    session::session_exists,
    state::AuthState,
    token::{Claims, TokenUse},
    utils::extract_bearer_token,
};

/// The authenticated caller, attached to the request after the gate passes.
#[derive(Clone, Debug)]
pub struct Principal {
    pub account_id: Uuid,
    pub public_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub permissions: Vec<String>,
    pub session_id: String,
}

/// Authenticate a request from its headers.
///
/// # Errors
///
/// `NoCredentials` when no bearer token is present; otherwise whatever
/// [`resolve_claims`] reports.
pub async fn authenticate(
    state: &AuthState,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::NoCredentials)?;
    authenticate_token(state, token, now).await
}

/// Authenticate a bare access token.
pub async fn authenticate_token(
    state: &AuthState,
    token: &str,
    now: DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let claims = state.issuer().verify(token, TokenUse::Access).map_err(|err| {
        debug!(reason = err.reason(), "access token rejected");
        AuthError::TokenInvalid
    })?;

    resolve_claims(state, &claims, now).await
}

/// Resolve verified claims against the account and session registry.
///
/// Check order: account exists and is active, session still registered,
/// account not locked, token not older than the last password change.
pub async fn resolve_claims(
    state: &AuthState,
    claims: &Claims,
    now: DateTime<Utc>,
) -> Result<Principal, AuthError> {
    let account = state
        .store()
        .find_by_id(claims.sub)
        .await
        .context("account lookup failed")?
        .ok_or(AuthError::AccountInactiveOrMissing)?;

    if !account.is_active {
        return Err(AuthError::AccountInactiveOrMissing);
    }

    if !session_exists(state.store(), account.id, &claims.sid, now)
        .await
        .context("session lookup failed")?
    {
        debug!("token references a dead session");
        return Err(AuthError::TokenInvalid);
    }

    if is_locked(&account.lock_state(), now) {
        return Err(AuthError::AccountLocked);
    }

    if claims.iat < account.last_password_change.timestamp() {
        return Err(AuthError::TokenStale);
    }

    Ok(Principal {
        account_id: account.id,
        public_id: account.public_id,
        name: account.name,
        email: account.email,
        role: account.role,
        department: account.department,
        permissions: account.permissions,
        session_id: claims.sid.clone(),
    })
}

/// Restrict an endpoint to the listed roles.
///
/// # Errors
///
/// `Forbidden` when the principal's role is not in the list.
pub fn require_role(principal: &Principal, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Restrict an endpoint to principals holding a permission.
///
/// # Errors
///
/// `Forbidden` when the permission is absent.
pub fn require_permission(principal: &Principal, permission: &str) -> Result<(), AuthError> {
    if principal.permissions.iter().any(|p| p == permission) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::{
        memory::MemoryAccountStore,
        password::hash_password,
        session::create_session,
        state::AuthConfig,
        storage::{AccountStore, CreateOutcome, NewAccount, SecurityPatch},
        token::TokenConfig,
    };
    use anyhow::Result;
    use axum::http::HeaderValue;
    use chrono::Duration;
    use secrecy::SecretString;
    use std::sync::Arc;

    struct Fixture {
        state: AuthState,
        store: Arc<MemoryAccountStore>,
        account_id: Uuid,
    }

    async fn fixture(role: Role) -> Result<Fixture> {
        let store = Arc::new(MemoryAccountStore::new());
        let outcome = store
            .create(NewAccount {
                public_id: format!("{}01ARZ3NDEKTSV4RRFFQ69G5FAV", role.public_id_prefix()),
                name: "Test".to_string(),
                email: "t@example.com".to_string(),
                phone: None,
                password_hash: hash_password("password1")?,
                role,
                department: role.is_staff().then(|| "Emergency".to_string()),
                permissions: role.default_permissions(),
            })
            .await?;
        let CreateOutcome::Created(account) = outcome else {
            anyhow::bail!("expected created");
        };

        let state = AuthState::new(
            AuthConfig::new("http://localhost:5173".to_string()),
            &TokenConfig::new(SecretString::from(
                "test-signing-key-at-least-32-bytes!!".to_string(),
            )),
            store.clone(),
        );

        Ok(Fixture {
            state,
            store,
            account_id: account.id,
        })
    }

    async fn login_token(f: &Fixture, now: DateTime<Utc>) -> Result<String> {
        let sid = create_session(
            f.store.as_ref(),
            f.account_id,
            "ua".into(),
            "127.0.0.1".into(),
            now,
            86_400,
        )
        .await?;
        let pair = f
            .state
            .issuer()
            .issue_pair(f.account_id, Role::Nurse, &sid, now)?;
        Ok(pair.token)
    }

    #[tokio::test]
    async fn missing_header_is_no_credentials() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let result = authenticate(&f.state, &HeaderMap::new(), Utc::now()).await;
        assert!(matches!(result, Err(AuthError::NoCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn valid_token_yields_principal() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let now = Utc::now();
        let token = login_token(&f, now).await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let principal = authenticate(&f.state, &headers, now)
            .await
            .map_err(|err| anyhow::anyhow!("gate failed: {err}"))?;
        assert_eq!(principal.account_id, f.account_id);
        assert_eq!(principal.role, Role::Nurse);
        assert!(principal.public_id.starts_with("STF"));
        Ok(())
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let result = authenticate_token(&f.state, "garbage", Utc::now()).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn dead_session_invalidates_the_token() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let now = Utc::now();
        let token = login_token(&f, now).await?;

        // Log out everywhere.
        f.store.remove_other_sessions(f.account_id, "none").await?;

        let result = authenticate_token(&f.state, &token, now).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
        Ok(())
    }

    #[tokio::test]
    async fn locked_account_is_rejected_even_with_a_valid_token() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let now = Utc::now();
        let token = login_token(&f, now).await?;

        f.store
            .update_security(
                f.account_id,
                SecurityPatch {
                    failed_attempts: Some(5),
                    lock_until: Some(Some(now + Duration::minutes(30))),
                    last_login: None,
                },
            )
            .await?;

        let result = authenticate_token(&f.state, &token, now).await;
        assert!(matches!(result, Err(AuthError::AccountLocked)));

        // After expiry the same token works again.
        let later = now + Duration::minutes(31);
        assert!(authenticate_token(&f.state, &token, later).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn password_change_stales_older_tokens() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let now = Utc::now();
        let token = login_token(&f, now).await?;

        f.store
            .set_password(f.account_id, "$argon2id$new", now + Duration::seconds(5))
            .await?;

        let result = authenticate_token(&f.state, &token, now + Duration::seconds(10)).await;
        assert!(matches!(result, Err(AuthError::TokenStale)));
        Ok(())
    }

    #[tokio::test]
    async fn role_and_permission_checks() -> Result<()> {
        let f = fixture(Role::Nurse).await?;
        let now = Utc::now();
        let token = login_token(&f, now).await?;
        let principal = authenticate_token(&f.state, &token, now)
            .await
            .map_err(|err| anyhow::anyhow!("gate failed: {err}"))?;

        assert!(require_role(&principal, &[Role::Nurse, Role::Admin]).is_ok());
        assert!(matches!(
            require_role(&principal, &[Role::Admin]),
            Err(AuthError::Forbidden)
        ));

        assert!(require_permission(&principal, "read_patients").is_ok());
        assert!(matches!(
            require_permission(&principal, "admin_dashboard"),
            Err(AuthError::Forbidden)
        ));
        Ok(())
    }
}
