//! Signed bearer tokens.
//!
//! Tokens are self-contained JWTs except for the embedded session id, which
//! lets the session registry invalidate a token early without a revocation
//! list: if the session is gone the token is rejected even while its
//! signature and expiry are still fine.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::account::Role;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Signing key and token lifetimes, passed in explicitly at construction.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    signing_key: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(signing_key: SecretString) -> Self {
        Self {
            signing_key,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claims carried by every token.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(rename = "use")]
    pub token_use: TokenUse,
}

/// Why verification failed. Logged server-side only; callers collapse all
/// reasons into one invalid-token outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Expired,
    BadSignature,
    WrongUse,
}

impl TokenError {
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::Expired => "expired",
            Self::BadSignature => "bad-signature",
            Self::WrongUse => "wrong-use",
        }
    }
}

/// Access + refresh token pair returned by login/refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: &TokenConfig) -> Self {
        let secret = config.signing_key.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: Duration::seconds(config.refresh_ttl_seconds),
        }
    }

    /// Mint an access + refresh pair bound to one session.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_pair(
        &self,
        account_id: Uuid,
        role: Role,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair> {
        let access_exp = now + self.access_ttl;
        let token = self.issue(account_id, role, session_id, now, access_exp, TokenUse::Access)?;
        let refresh_token = self.issue(
            account_id,
            role,
            session_id,
            now,
            now + self.refresh_ttl,
            TokenUse::Refresh,
        )?;

        Ok(TokenPair {
            token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_at: access_exp.timestamp(),
        })
    }

    fn issue(
        &self,
        account_id: Uuid,
        role: Role,
        session_id: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        token_use: TokenUse,
    ) -> Result<String> {
        let claims = Claims {
            sub: account_id,
            role,
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            token_use,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| anyhow!("failed to sign token: {err}"))
    }

    /// Check signature, expiry, well-formedness, and token use atomically.
    ///
    /// # Errors
    ///
    /// Any failure collapses to a single [`TokenError`], tagged for logging.
    pub fn verify(&self, token: &str, expected_use: TokenUse) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed,
            }
        })?;

        if data.claims.token_use != expected_use {
            return Err(TokenError::WrongUse);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&TokenConfig::new(SecretString::from(
            "test-signing-key-at-least-32-bytes!!".to_string(),
        )))
    }

    #[test]
    fn issued_access_token_verifies() -> Result<()> {
        let issuer = issuer();
        let account_id = Uuid::new_v4();
        let now = Utc::now();

        let pair = issuer.issue_pair(account_id, Role::Nurse, "sess-1", now)?;
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_at, (now + Duration::hours(1)).timestamp());

        let claims = issuer
            .verify(&pair.token, TokenUse::Access)
            .map_err(|err| anyhow!("verify failed: {}", err.reason()))?;
        assert_eq!(claims.sub, account_id);
        assert_eq!(claims.role, Role::Nurse);
        assert_eq!(claims.sid, "sess-1");
        assert_eq!(claims.iat, now.timestamp());
        Ok(())
    }

    #[test]
    fn access_token_rejected_as_refresh() -> Result<()> {
        let issuer = issuer();
        let pair = issuer.issue_pair(Uuid::new_v4(), Role::Patient, "sess-1", Utc::now())?;

        assert_eq!(
            issuer.verify(&pair.token, TokenUse::Refresh),
            Err(TokenError::WrongUse)
        );
        assert!(issuer.verify(&pair.refresh_token, TokenUse::Refresh).is_ok());
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let issuer = issuer();
        // Issued far enough in the past that even the refresh token expired.
        let then = Utc::now() - Duration::days(30);
        let pair = issuer.issue_pair(Uuid::new_v4(), Role::Admin, "sess-1", then)?;

        assert_eq!(
            issuer.verify(&pair.token, TokenUse::Access),
            Err(TokenError::Expired)
        );
        Ok(())
    }

    #[test]
    fn foreign_signature_is_rejected() -> Result<()> {
        let issuer = issuer();
        let other = TokenIssuer::new(&TokenConfig::new(SecretString::from(
            "another-signing-key-32-bytes-long!!!".to_string(),
        )));
        let pair = other.issue_pair(Uuid::new_v4(), Role::Doctor, "sess-1", Utc::now())?;

        assert_eq!(
            issuer.verify(&pair.token, TokenUse::Access),
            Err(TokenError::BadSignature)
        );
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            issuer().verify("not-a-token", TokenUse::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn ttl_overrides_apply() -> Result<()> {
        let config = TokenConfig::new(SecretString::from(
            "test-signing-key-at-least-32-bytes!!".to_string(),
        ))
        .with_access_ttl_seconds(120)
        .with_refresh_ttl_seconds(240);
        let issuer = TokenIssuer::new(&config);
        let now = Utc::now();

        let pair = issuer.issue_pair(Uuid::new_v4(), Role::Patient, "sess-1", now)?;
        assert_eq!(pair.expires_at, (now + Duration::seconds(120)).timestamp());
        Ok(())
    }
}
