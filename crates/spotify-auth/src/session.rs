//! Auth session manager
//!
//! Drives the Authorization Code + PKCE flow across a full-page redirect.
//! The flow has two entry points joined only by the session store:
//!
//! 1. `begin_login` persists a fresh verifier and state, then navigates to
//!    the authorization endpoint. Nothing runs after the navigation.
//! 2. `handle_callback` runs on the page the provider redirects back to. It
//!    validates the response against the persisted secrets and redeems the
//!    code.
//!
//! Session state is implicit in the store: no token (or an expired one) is
//! logged out; a valid token is authenticated; verifier + state without a
//! token is a login waiting for its callback.

use std::sync::{Arc, Mutex, PoisonError};

use common::Secret;
use tracing::{debug, info, warn};
use url::Url;

use crate::agent::UserAgent;
use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::constants::CALLBACK_PARAMS;
use crate::error::{Error, Result};
use crate::pkce;
use crate::store::{SessionStore, keys};
use crate::token;

/// Options for `begin_login`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginOptions {
    /// Always show the consent dialog, even for an existing grant.
    pub force: bool,
}

/// Query parameters the provider appends to the redirect target.
///
/// An empty value counts as absent.
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackParams {
    fn from_url(url: &Url) -> Self {
        let mut params = Self {
            code: None,
            state: None,
            error: None,
        };
        for (name, value) in url.query_pairs() {
            let slot = match name.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                _ => continue,
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

pub struct SessionManager {
    config: AuthConfig,
    store: Arc<dyn SessionStore>,
    agent: Arc<dyn UserAgent>,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    /// Serializes check-and-consume of the pending login across callbacks
    pending: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        config: AuthConfig,
        store: Arc<dyn SessionStore>,
        agent: Arc<dyn UserAgent>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            store,
            agent,
            clock: Arc::new(SystemClock),
            http,
            pending: Mutex::new(()),
        }
    }

    /// Replace the wall clock used for expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Start a login: persist fresh PKCE secrets and redirect the user agent.
    ///
    /// Overwrites any verifier/state from an earlier attempt, which makes a
    /// callback for that attempt fail the state check.
    pub fn begin_login(&self, options: LoginOptions) -> Result<()> {
        let verifier = pkce::generate_verifier();
        let state = pkce::generate_state();
        let challenge = pkce::digest(&verifier);
        let url = pkce::build_authorization_url(&self.config, &challenge, &state, options.force)?;

        self.store
            .set_many(&[(keys::VERIFIER, &verifier), (keys::STATE, &state)])?;

        metrics::counter!("spotify_auth_logins_started_total").increment(1);
        info!(force = options.force, "redirecting to authorization endpoint");
        self.agent.navigate(&url)
    }

    /// Complete a login from the redirect target page.
    ///
    /// Returns the new access token. On any failure no token is written;
    /// once the state check passes, the verifier and state are consumed
    /// whether or not the exchange succeeds.
    pub async fn handle_callback(&self) -> Result<Secret<String>> {
        let mut url = self.agent.current_url()?;
        let params = CallbackParams::from_url(&url);

        if let Some(error) = params.error {
            warn!(error = %error, "authorization denied by provider");
            return Err(Error::AuthorizationDenied(error));
        }

        let code = params
            .code
            .ok_or(Error::MalformedCallback("missing code parameter"))?;

        let verifier = self.consume_pending_login(params.state.as_deref())?;

        let outcome = token::exchange_code(&self.http, &self.config, &code, &verifier).await;
        let label = match &outcome {
            Ok(_) => "success",
            Err(Error::Network(_)) => "network_error",
            Err(_) => "rejected",
        };
        metrics::counter!("spotify_auth_token_exchanges_total", "outcome" => label).increment(1);
        let response = outcome?;

        let expires_at = token::expiry_instant(self.clock.now_millis(), response.expires_in);
        self.store.set_many(&[
            (keys::ACCESS_TOKEN, &response.access_token),
            (keys::TOKEN_EXPIRY, &expires_at.to_string()),
        ])?;

        strip_callback_params(&mut url);
        self.agent.replace_url(&url);

        info!(
            expires_at,
            scope = response.scope.as_deref().unwrap_or(""),
            "spotify session established"
        );
        Ok(Secret::new(response.access_token))
    }

    /// Check the returned state against the pending login and consume it.
    ///
    /// Runs under `pending`, so of two concurrent callbacks for the same
    /// login only one gets the verifier; the other sees `MissingVerifier`.
    fn consume_pending_login(&self, returned_state: Option<&str>) -> Result<String> {
        let _guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        // No verifier means there is no pending login to complete at all
        let verifier = self.store.get(keys::VERIFIER).ok_or_else(|| {
            warn!("callback received without a pending login");
            Error::MissingVerifier
        })?;

        let expected_state = self.store.get(keys::STATE);
        match (returned_state, expected_state.as_deref()) {
            (Some(returned), Some(expected)) if returned.as_bytes() == expected.as_bytes() => {}
            (returned, expected) => {
                warn!(
                    returned_present = returned.is_some(),
                    expected_present = expected.is_some(),
                    "callback state does not match pending login"
                );
                return Err(Error::StateMismatch);
            }
        }

        // Single use: consumed before the exchange so a failed attempt
        // cannot be replayed with the same verifier
        self.store.remove_many(&[keys::STATE, keys::VERIFIER])?;
        Ok(verifier)
    }

    /// The stored access token, if present and not yet expired.
    pub fn get_access_token(&self) -> Option<Secret<String>> {
        let token = self.store.get(keys::ACCESS_TOKEN)?;
        self.valid_expiry()?;
        Some(Secret::new(token))
    }

    pub fn is_authed(&self) -> bool {
        self.get_access_token().is_some()
    }

    /// Expiry (epoch milliseconds) of the current token while it is valid.
    pub fn expires_at(&self) -> Option<u64> {
        self.store.get(keys::ACCESS_TOKEN)?;
        self.valid_expiry()
    }

    /// Forget the session and any pending login. Never fails.
    pub fn logout(&self) {
        match self.store.remove_many(&keys::ALL) {
            Ok(()) => info!("session cleared"),
            Err(e) => warn!(error = %e, "failed to clear persisted session"),
        }
    }

    fn valid_expiry(&self) -> Option<u64> {
        let raw = self.store.get(keys::TOKEN_EXPIRY)?;
        let expires_at = match raw.parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                debug!("stored token expiry is not a number, treating token as absent");
                return None;
            }
        };
        (self.clock.now_millis() < expires_at).then_some(expires_at)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

/// Drop `code`, `state` and `error` from the query, keeping anything else.
fn strip_callback_params(url: &mut Url) {
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !CALLBACK_PARAMS.contains(&name.as_ref()))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if retained.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(retained);
    }
}
