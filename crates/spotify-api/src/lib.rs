//! Collaborator-facing Spotify API abstraction
//!
//! Decouples callers (CLI commands, UI) from where data comes from.
//! `LiveApi` goes through the PKCE session's authenticated fetch;
//! `MockApi` answers from a canned catalog for dev mode, without any
//! login. The session manager itself has no dev-mode switch.

pub mod live;
pub mod mock;

pub use live::LiveApi;
pub use mock::MockApi;

use std::future::Future;
use std::pin::Pin;

pub use spotify_auth::{ApiResponse, Error, FetchRequest, Method, Result};

/// Source of Spotify Web API data.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Box<dyn MusicApi>`).
pub trait MusicApi: Send + Sync {
    /// Identifier for logging (e.g. "live", "mock")
    fn id(&self) -> &str;

    /// Whether calls can be made right now. Cheap; safe to call on every render.
    fn is_authed(&self) -> bool;

    /// Call `path` (relative to the API base, may carry a query string).
    fn fetch<'a>(
        &'a self,
        path: &'a str,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}
