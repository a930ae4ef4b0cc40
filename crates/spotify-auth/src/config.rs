//! Session manager configuration

use crate::constants::{API_BASE_URL, AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT};

/// Client registration and endpoints used by the session manager.
///
/// `redirect_uri` is sent verbatim in both the authorization request and
/// the token exchange; the authorization server rejects the exchange if
/// the two differ by a single byte.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub api_base_url: String,
}

impl AuthConfig {
    /// Configuration against Spotify's production endpoints.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            api_base_url: API_BASE_URL.to_string(),
        }
    }

    /// Join the API base URL and a request path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
