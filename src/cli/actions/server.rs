use crate::api;
use crate::api::handlers::auth::{state::AuthConfig, token::TokenConfig};
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            token_key,
            frontend_url,
            access_ttl,
            refresh_ttl,
            session_ttl,
        } => {
            let auth_config =
                AuthConfig::new(frontend_url).with_session_ttl_seconds(session_ttl);

            let token_config = TokenConfig::new(token_key)
                .with_access_ttl_seconds(access_ttl)
                .with_refresh_ttl_seconds(refresh_ttl);

            api::new(port, dsn, auth_config, token_config).await?;
        }
    }

    Ok(())
}
