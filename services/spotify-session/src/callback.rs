//! Loopback callback server for the interactive login
//!
//! The CLI has no browser tab of its own, so it stands in for the redirect
//! target page: it binds the address named by `redirect_uri`, loads each
//! callback request URL into a `MemoryAgent`, and lets the session manager
//! finish the login from there. The system browser only ever sees the
//! authorize page and the small HTML result page served here.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use spotify_auth::{LoginOptions, MemoryAgent, SessionManager, UserAgent};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use url::{Host, Url};

use crate::error::{LoginError, Result};

/// Upper bound on waiting for the callback server to finish its last response.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// User agent for the CLI: navigation opens the system browser, everything
/// else acts on the page the callback server last loaded.
pub struct BrowserAgent {
    page: Arc<MemoryAgent>,
}

impl BrowserAgent {
    pub fn new(page: Arc<MemoryAgent>) -> Self {
        Self { page }
    }
}

impl UserAgent for BrowserAgent {
    fn current_url(&self) -> spotify_auth::Result<Url> {
        self.page.current_url()
    }

    fn navigate(&self, url: &Url) -> spotify_auth::Result<()> {
        if let Err(e) = open::that(url.as_str()) {
            warn!(error = %e, "could not launch a browser");
            println!("Open this URL in your browser to log in:\n\n  {url}\n");
        } else {
            println!("Opened your browser to log in to Spotify.");
        }
        Ok(())
    }

    fn replace_url(&self, url: &Url) {
        self.page.replace_url(url);
    }
}

/// Socket address to serve `redirect` on. Only plain-http loopback
/// redirects can be served locally; `localhost` binds the IPv4 loopback.
pub fn loopback_addr(redirect: &Url) -> Result<SocketAddr> {
    let not_loopback = || LoginError::NotLoopback(redirect.to_string());
    if redirect.scheme() != "http" {
        return Err(not_loopback());
    }
    let ip = match redirect.host() {
        Some(Host::Ipv4(ip)) if ip.is_loopback() => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) if ip.is_loopback() => IpAddr::V6(ip),
        Some(Host::Domain(domain)) if domain.eq_ignore_ascii_case("localhost") => {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
        _ => return Err(not_loopback()),
    };
    let port = redirect.port_or_known_default().ok_or_else(not_loopback)?;
    Ok(SocketAddr::new(ip, port))
}

type Outcome = std::result::Result<(), spotify_auth::Error>;

/// Shared state of the callback route
#[derive(Clone)]
struct CallbackState {
    session: Arc<SessionManager>,
    page: Arc<MemoryAgent>,
    redirect: Url,
    /// Taken by the first callback; later requests only get the page.
    done: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

fn router(state: CallbackState) -> Router {
    let path = state.redirect.path().to_owned();
    Router::new()
        .route(&path, get(callback_handler))
        .with_state(state)
}

async fn callback_handler(
    State(state): State<CallbackState>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut url = state.redirect.clone();
    url.set_query(query.as_deref());
    state.page.load(url);

    let outcome = state.session.handle_callback().await.map(|_token| ());
    let response = match &outcome {
        Ok(()) => {
            info!("login completed");
            (
                StatusCode::OK,
                Html(result_page(
                    "Logged in to Spotify",
                    "You can close this tab and return to the terminal.",
                )),
            )
                .into_response()
        }
        Err(e) => {
            warn!(error = %e, "login callback failed");
            (
                failure_status(e),
                Html(result_page("Spotify login failed", &e.to_string())),
            )
                .into_response()
        }
    };

    let sender = state
        .done
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(outcome);
    }
    response
}

fn failure_status(error: &spotify_auth::Error) -> StatusCode {
    use spotify_auth::Error;
    match error {
        Error::Network(_) | Error::TokenExchange(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn result_page(title: &str, message: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p>{message}</p></body></html>\n",
        title = escape_html(title),
        message = escape_html(message),
    )
}

/// The provider's `error` parameter ends up in the page; never trust it.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Run an interactive login: serve the redirect target, send the user to
/// the authorize page and wait up to `wait` for the callback.
///
/// The listener is bound before the browser opens so a fast redirect can
/// never arrive at a closed port.
pub async fn login(
    session: Arc<SessionManager>,
    page: Arc<MemoryAgent>,
    options: LoginOptions,
    wait: Duration,
) -> Result<()> {
    let redirect = Url::parse(&session.config().redirect_uri).map_err(spotify_auth::Error::from)?;
    let addr = loopback_addr(&redirect)?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| LoginError::Bind { addr, source })?;
    info!(%addr, path = redirect.path(), "waiting for login callback");

    let (done_tx, done_rx) = oneshot::channel();
    let app = router(CallbackState {
        session: session.clone(),
        page,
        redirect,
        done: Arc::new(Mutex::new(Some(done_tx))),
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = match session.begin_login(options) {
        Ok(()) => tokio::time::timeout(wait, done_rx).await,
        Err(e) => Ok(Ok(Err(e))),
    };

    // The result page for the callback is still in flight; let it drain.
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "callback server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "callback server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "callback server did not drain in time"
        ),
    }

    match outcome {
        Ok(Ok(result)) => result.map_err(LoginError::from),
        Ok(Err(_)) => Err(LoginError::ServerStopped),
        Err(_) => Err(LoginError::Timeout(wait)),
    }
}
