pub mod server;

use secrecy::SecretString;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        token_key: SecretString,
        frontend_url: String,
        access_ttl: i64,
        refresh_ttl: i64,
        session_ttl: i64,
    },
}
