//! Session registry: random ids, TTL, and lifecycle against the store.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};

use super::{account::Session, storage::AccountStore};

/// 256 bits of OS randomness, URL-safe base64 without padding.
pub fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| anyhow!("failed to read OS randomness: {err}"))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Register a new session for the account and return its id.
pub async fn create_session(
    store: &dyn AccountStore,
    account_id: uuid::Uuid,
    device_info: String,
    ip_address: String,
    now: DateTime<Utc>,
    ttl_seconds: i64,
) -> Result<String> {
    let session_id = generate_session_id()?;
    let session = Session {
        session_id: session_id.clone(),
        device_info,
        ip_address,
        created_at: now,
        last_accessed: now,
        expires_at: now + Duration::seconds(ttl_seconds),
    };
    store.add_session(account_id, session).await?;
    Ok(session_id)
}

/// A session counts as live only while its expiry is in the future.
pub async fn session_exists(
    store: &dyn AccountStore,
    account_id: uuid::Uuid,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let session = store.find_session(account_id, session_id).await?;
    Ok(session.is_some_and(|s| s.expires_at > now))
}
