//! End-to-end auth scenarios over the in-memory store.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::sync::Arc;

use flegi::api::handlers::auth::{
    account::Role,
    error::AuthError,
    gate::{authenticate_token, require_permission, require_role},
    login::{login_flow, LoginOutcome},
    memory::MemoryAccountStore,
    register::register_flow,
    state::{AuthConfig, AuthState},
    storage::AccountStore,
    token::TokenConfig,
    types::RegisterRequest,
};

fn state() -> AuthState {
    AuthState::new(
        AuthConfig::new("http://localhost:5173".to_string()),
        &TokenConfig::new(SecretString::from(
            "integration-test-key-32-bytes-long!!".to_string(),
        )),
        Arc::new(MemoryAccountStore::new()),
    )
}

fn patient(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ada Lovelace".to_string(),
        email: email.to_string(),
        password: "password1".to_string(),
        phone: None,
        role: "patient".to_string(),
        department: None,
    }
}

async fn register(state: &AuthState, email: &str) -> Result<LoginOutcome> {
    register_flow(
        state,
        patient(email),
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        Utc::now(),
    )
    .await
    .map_err(|err| anyhow!("register failed: {err}"))
}

async fn login(state: &AuthState, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
    login_flow(
        state,
        email,
        password,
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        Utc::now(),
    )
    .await
}

#[tokio::test]
async fn register_then_login() -> Result<()> {
    let state = state();
    let registered = register(&state, "ada@example.com").await?;
    assert!(registered.profile.id.starts_with("PAT"));

    let outcome = login(&state, "ada@example.com", "password1")
        .await
        .map_err(|err| anyhow!("login failed: {err}"))?;
    assert_eq!(outcome.tokens.token_type, "Bearer");

    // The access token passes the gate.
    let principal = authenticate_token(&state, &outcome.tokens.token, Utc::now())
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;
    assert_eq!(principal.role, Role::Patient);
    Ok(())
}

#[tokio::test]
async fn login_is_case_insensitive_on_email() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    assert!(login(&state, "  Ada@Example.COM ", "password1").await.is_ok());
    Ok(())
}

#[tokio::test]
async fn unknown_email_and_wrong_password_look_the_same() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    let unknown = login(&state, "ghost@example.com", "password1").await;
    let wrong = login(&state, "ada@example.com", "wrongpass1").await;

    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    Ok(())
}

#[tokio::test]
async fn fifth_failure_locks_the_account() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    for _ in 0..4 {
        let result = login(&state, "ada@example.com", "wrongpass1").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    // The fifth failure reports the lock, not bad credentials.
    let fifth = login(&state, "ada@example.com", "wrongpass1").await;
    assert!(matches!(fifth, Err(AuthError::AccountLocked)));

    // Even the correct password is refused while locked.
    let correct = login(&state, "ada@example.com", "password1").await;
    assert!(matches!(correct, Err(AuthError::AccountLocked)));
    Ok(())
}

#[tokio::test]
async fn lock_expires_after_thirty_minutes() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    for _ in 0..5 {
        let _ = login(&state, "ada@example.com", "wrongpass1").await;
    }

    let later = Utc::now() + Duration::minutes(31);
    let outcome = login_flow(
        &state,
        "ada@example.com",
        "password1",
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        later,
    )
    .await;
    assert!(outcome.is_ok(), "login after lock expiry should succeed");
    Ok(())
}

#[tokio::test]
async fn counter_resets_after_an_expired_lock() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    for _ in 0..5 {
        let _ = login(&state, "ada@example.com", "wrongpass1").await;
    }

    // One more failure after expiry starts a fresh count instead of
    // re-locking immediately.
    let later = Utc::now() + Duration::minutes(31);
    let result = login_flow(
        &state,
        "ada@example.com",
        "wrongpass1",
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        later,
    )
    .await;
    assert!(matches!(result, Err(AuthError::InvalidCredentials)));

    let result = login_flow(
        &state,
        "ada@example.com",
        "password1",
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        later,
    )
    .await;
    assert!(result.is_ok());
    Ok(())
}

#[tokio::test]
async fn logged_out_session_invalidates_the_token() -> Result<()> {
    let state = state();
    let outcome = register(&state, "ada@example.com").await?;

    let now = Utc::now();
    let principal = authenticate_token(&state, &outcome.tokens.token, now)
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;

    state
        .store()
        .remove_session(principal.account_id, &principal.session_id)
        .await?;

    let result = authenticate_token(&state, &outcome.tokens.token, now).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
    Ok(())
}

#[tokio::test]
async fn session_expires_after_its_ttl() -> Result<()> {
    let state = state();
    let outcome = register(&state, "ada@example.com").await?;

    let now = Utc::now();
    assert!(authenticate_token(&state, &outcome.tokens.token, now)
        .await
        .is_ok());

    // The access token itself is checked against the real clock, so push
    // only the session clock past the 24h TTL.
    let later = now + Duration::hours(25);
    let result = authenticate_token(&state, &outcome.tokens.token, later).await;
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
    Ok(())
}

#[tokio::test]
async fn concurrent_logins_get_distinct_sessions() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    let first = login(&state, "ada@example.com", "password1")
        .await
        .map_err(|err| anyhow!("login failed: {err}"))?;
    let second = login(&state, "ada@example.com", "password1")
        .await
        .map_err(|err| anyhow!("login failed: {err}"))?;

    let now = Utc::now();
    let p1 = authenticate_token(&state, &first.tokens.token, now)
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;
    let p2 = authenticate_token(&state, &second.tokens.token, now)
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;

    assert_ne!(p1.session_id, p2.session_id);

    // Dropping one session leaves the other usable.
    state
        .store()
        .remove_session(p1.account_id, &p1.session_id)
        .await?;
    assert!(authenticate_token(&state, &first.tokens.token, now)
        .await
        .is_err());
    assert!(authenticate_token(&state, &second.tokens.token, now)
        .await
        .is_ok());
    Ok(())
}

#[tokio::test]
async fn password_change_stales_earlier_tokens() -> Result<()> {
    let state = state();
    let outcome = register(&state, "ada@example.com").await?;

    let now = Utc::now();
    let principal = authenticate_token(&state, &outcome.tokens.token, now)
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;

    state
        .store()
        .set_password(
            principal.account_id,
            "$argon2id$replaced",
            now + Duration::seconds(2),
        )
        .await?;

    let result = authenticate_token(&state, &outcome.tokens.token, now + Duration::seconds(5)).await;
    assert!(matches!(result, Err(AuthError::TokenStale)));
    Ok(())
}

#[tokio::test]
async fn role_and_permission_gates_compose() -> Result<()> {
    let state = state();

    let nurse = register_flow(
        &state,
        RegisterRequest {
            name: "Flo".to_string(),
            email: "flo@example.com".to_string(),
            password: "password1".to_string(),
            phone: None,
            role: "nurse".to_string(),
            department: Some("Emergency".to_string()),
        },
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        Utc::now(),
    )
    .await
    .map_err(|err| anyhow!("register failed: {err}"))?;
    assert!(nurse.profile.id.starts_with("STF"));

    let principal = authenticate_token(&state, &nurse.tokens.token, Utc::now())
        .await
        .map_err(|err| anyhow!("gate failed: {err}"))?;

    assert!(require_role(&principal, &[Role::Nurse, Role::Admin]).is_ok());
    assert!(matches!(
        require_role(&principal, &[Role::Admin]),
        Err(AuthError::Forbidden)
    ));
    assert!(require_permission(&principal, "read_patients").is_ok());
    assert!(matches!(
        require_permission(&principal, "system_settings"),
        Err(AuthError::Forbidden)
    ));
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_is_a_validation_error() -> Result<()> {
    let state = state();
    register(&state, "ada@example.com").await?;

    let result = register_flow(
        &state,
        patient("ada@example.com"),
        "test-agent".to_string(),
        "127.0.0.1".to_string(),
        Utc::now(),
    )
    .await;
    assert!(matches!(result, Err(AuthError::Validation(_))));
    Ok(())
}
