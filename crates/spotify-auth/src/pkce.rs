//! PKCE (Proof Key for Code Exchange) primitives per RFC 7636
//!
//! The verifier is a random secret kept in session storage until the
//! callback; only its S256 digest travels in the authorization request.
//! The verifier itself is presented at token exchange to prove the same
//! party started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::AuthConfig;
use crate::constants::SCOPES;
use crate::error::Result;

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Verifier length. RFC 7636 allows 43-128 characters.
pub const VERIFIER_LENGTH: usize = 64;

/// Anti-forgery state length.
pub const STATE_LENGTH: usize = 16;

/// Random alphanumeric string of exactly `length` characters.
///
/// Bytes come from the thread-local CSPRNG and are mapped `byte % 62`.
/// 256 is not a multiple of 62, so the first 8 symbols are drawn slightly
/// more often (5/256 vs 4/256). Accepted: the output is used for entropy,
/// and a 64-character verifier still carries well over 256 bits.
pub fn random_string(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill(bytes.as_mut_slice());
    bytes
        .iter()
        .map(|b| char::from(ALPHABET[usize::from(*b) % ALPHABET.len()]))
        .collect()
}

/// S256 digest: `BASE64URL-NOPAD(SHA256(utf8(input)))`.
pub fn digest(input: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}

/// Fresh code verifier for one login attempt.
pub fn generate_verifier() -> String {
    random_string(VERIFIER_LENGTH)
}

/// Fresh anti-forgery state for one login attempt.
pub fn generate_state() -> String {
    random_string(STATE_LENGTH)
}

/// Build the authorization URL the user agent is sent to.
///
/// `force` adds `show_dialog=true` so the consent screen is shown even
/// when the user already granted this client.
pub fn build_authorization_url(
    config: &AuthConfig,
    challenge: &str,
    state: &str,
    force: bool,
) -> Result<Url> {
    let scope = SCOPES.join(" ");
    let mut url = Url::parse_with_params(
        &config.authorize_endpoint,
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge),
            ("state", state),
        ],
    )?;
    if force {
        url.query_pairs_mut().append_pair("show_dialog", "true");
    }
    Ok(url)
}
