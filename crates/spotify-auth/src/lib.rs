//! Spotify OAuth session library
//!
//! Authorization Code flow with PKCE plus an authenticated fetch
//! primitive. The page environment is injected: a `SessionStore` for
//! durable key-value state and a `UserAgent` for URL access and
//! navigation. No state crosses the authorization redirect in memory.
//!
//! Login flow:
//! 1. `SessionManager::begin_login()` stores a verifier + state and
//!    navigates to the authorize URL built by `pkce::build_authorization_url()`
//! 2. The provider redirects back with `code` and `state`
//! 3. `SessionManager::handle_callback()` checks state, redeems the code via
//!    `token::exchange_code()` and stores the token with its expiry
//! 4. Collaborators call `is_authed()`, `get_access_token()` and
//!    `authenticated_fetch()` until the token expires

pub mod agent;
pub mod api;
pub mod classify;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod session;
pub mod store;
pub mod token;

#[cfg(test)]
mod test_support;

pub use agent::{MemoryAgent, UserAgent};
pub use api::{ApiResponse, FetchRequest};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{ApiErrorKind, Denial, Error, Result, TokenExchangeReason};
pub use pkce::{digest, random_string};
pub use session::{LoginOptions, SessionManager};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use reqwest::Method;
