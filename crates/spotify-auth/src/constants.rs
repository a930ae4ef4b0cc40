//! Spotify OAuth constants
//!
//! Public endpoints and the fixed scope list for the Authorization Code flow
//! with PKCE. Nothing here is a secret: a PKCE client has no client secret,
//! and the client ID is supplied by configuration.

/// Authorization endpoint the user agent is redirected to
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";

/// Token endpoint for authorization code redemption
pub const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Base URL for authenticated Web API calls. Paths are appended verbatim.
pub const API_BASE_URL: &str = "https://api.spotify.com/v1";

/// Scopes requested on every login.
/// Playback scopes require a Premium account at call time, not at login.
pub const SCOPES: &[&str] = &[
    "streaming",
    "user-read-private",
    "user-read-email",
    "user-modify-playback-state",
    "user-read-playback-state",
    "user-top-read",
];

/// Subtracted from the issuer's `expires_in` so a token is never presented
/// in the last seconds before the issuer would reject it.
pub const EXPIRY_SAFETY_MARGIN_MS: u64 = 10_000;

/// Query parameters removed from the visible URL once a callback is handled.
pub const CALLBACK_PARAMS: &[&str] = &["code", "state", "error"];
