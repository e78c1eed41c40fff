//! Authentication and authorization: accounts, credentials, tokens,
//! sessions, and the request gate.

pub mod account;
pub mod error;
pub mod gate;
pub mod lockout;
pub mod login;
pub mod me;
pub mod memory;
pub mod password;
pub mod password_change;
pub mod register;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;
pub mod utils;

pub use error::AuthError;
pub use gate::{authenticate, require_permission, require_role, Principal};
pub use state::{AuthConfig, AuthState};
pub use token::TokenConfig;
