//! Error taxonomy for the PKCE session and authenticated API calls
//!
//! Every variant renders a fixed, user-presentable message. Raw provider
//! bodies never reach `Display`; they are logged at debug level by the
//! code that received them.

/// Errors from session and API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The user or the provider refused the grant. Carries the provider's
    /// short error code (e.g. `access_denied`).
    #[error("authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("malformed callback: {0}")]
    MalformedCallback(&'static str),

    #[error("state mismatch: this callback does not belong to a pending login, try logging in again")]
    StateMismatch,

    #[error("missing PKCE verifier, try logging in again")]
    MissingVerifier,

    #[error("network error: {0}")]
    Network(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(TokenExchangeReason),

    #[error("not logged in to Spotify")]
    NotAuthenticated,

    #[error("Spotify API request failed: {0}")]
    Api(ApiErrorKind),

    #[error("session storage error: {0}")]
    Storage(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Why the token endpoint refused an authorization code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenExchangeReason {
    /// 400 whose body names the redirect URI. The URI sent at exchange time
    /// differs from the one used at authorization or the one registered.
    #[error("redirect URI does not match the one used to authorize")]
    RedirectUriMismatch,

    #[error("request rejected as malformed or the code is no longer valid")]
    BadRequest,

    /// 401/403
    #[error("client credentials or permissions rejected")]
    Unauthorized,

    /// 5xx
    #[error("authorization server unavailable")]
    ProviderUnavailable,

    #[error("unexpected status {0}")]
    UnexpectedStatus(u16),

    /// 2xx whose body is not a token response
    #[error("token response could not be parsed")]
    InvalidResponse,
}

/// Classified failure of an authenticated API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ApiErrorKind {
    /// 401. The caller should prompt for a new login.
    #[error("session expired, log in again")]
    SessionExpired,

    /// 403
    #[error("permission denied ({0})")]
    PermissionDenied(Denial),

    /// 5xx
    #[error("Spotify is unavailable, try again later")]
    UpstreamUnavailable,

    #[error("request failed with status {0}")]
    RequestFailed(u16),

    /// 2xx whose body is not valid JSON
    #[error("response body was not valid JSON")]
    InvalidPayload,
}

/// Provider-supplied detail for a 403, reduced to a fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("Spotify Premium required")]
    PremiumRequired,

    #[error("insufficient scope")]
    InsufficientScope,

    #[error("not permitted")]
    Unspecified,
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
