//! Authorization code redemption
//!
//! One POST to the token endpoint: the authorization code plus the PKCE
//! verifier, form-encoded. There is no refresh path; when the access
//! token expires the user logs in again.

use serde::Deserialize;
use tracing::debug;

use crate::classify::classify_token_error;
use crate::config::AuthConfig;
use crate::constants::EXPIRY_SAFETY_MARGIN_MS;
use crate::error::{Error, Result, TokenExchangeReason};

/// Successful token endpoint response.
///
/// `expires_in` is a delta in seconds from the response time. Any
/// `refresh_token` in the response is ignored, and so is `token_type`:
/// Spotify only issues bearer tokens.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Exchange an authorization code for an access token.
///
/// Transport failures map to `Error::Network`; non-success statuses map to
/// `Error::TokenExchange` with a classified reason. The raw error body is
/// only logged at debug level.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_endpoint)
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ])
        .send()
        .await
        .map_err(|e| Error::Network(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        // A body we cannot read must not hide the status
        let body = response.text().await.unwrap_or_default();
        let reason = classify_token_error(status.as_u16(), &body);
        debug!(
            status = status.as_u16(),
            %reason,
            body = %body,
            "token endpoint rejected exchange"
        );
        return Err(Error::TokenExchange(reason));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Network(format!("reading token response: {e}")))?;

    serde_json::from_str::<TokenResponse>(&body).map_err(|e| {
        debug!(error = %e, "token response did not parse");
        Error::TokenExchange(TokenExchangeReason::InvalidResponse)
    })
}

/// Absolute expiry in epoch milliseconds, with the safety margin applied.
pub fn expiry_instant(issued_at_millis: u64, expires_in_secs: u64) -> u64 {
    issued_at_millis
        .saturating_add(expires_in_secs.saturating_mul(1000))
        .saturating_sub(EXPIRY_SAFETY_MARGIN_MS)
}
