//! Shared auth state threaded through the router as an extension.

use std::sync::Arc;

use super::{
    storage::AccountStore,
    token::{TokenConfig, TokenIssuer},
};

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    issuer: TokenIssuer,
    store: Arc<dyn AccountStore>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, token_config: &TokenConfig, store: Arc<dyn AccountStore>) -> Self {
        Self {
            config,
            issuer: TokenIssuer::new(token_config),
            store,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_a_day() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        assert_eq!(config.session_ttl_seconds(), 86_400);
        assert_eq!(config.frontend_base_url(), "http://localhost:5173");
    }

    #[test]
    fn ttl_override_applies() {
        let config =
            AuthConfig::new("http://localhost:5173".to_string()).with_session_ttl_seconds(60);
        assert_eq!(config.session_ttl_seconds(), 60);
    }
}
