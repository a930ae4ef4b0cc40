//! Loopback mock endpoints and a wired-up session for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tokio::net::TcpListener;
use url::Url;

use crate::agent::MemoryAgent;
use crate::clock::ManualClock;
use crate::config::AuthConfig;
use crate::session::SessionManager;
use crate::store::{MemoryStore, SessionStore, keys};

pub const REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const START_MILLIS: u64 = 1_750_000_000_000;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }
}

/// Server that answers every request with a fixed status and body.
pub struct MockServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<CapturedRequest>>>,
}

impl MockServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> CapturedRequest {
        self.last
            .lock()
            .unwrap()
            .clone()
            .expect("mock server received no request")
    }
}

pub async fn start_mock_server(status: StatusCode, body: &'static str) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(None));

    let (server_hits, server_last) = (hits.clone(), last.clone());
    let app = axum::Router::new().fallback(move |request: Request<Body>| {
        let hits = server_hits.clone();
        let last = server_last.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            let headers = request
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        value.to_str().unwrap_or("").to_string(),
                    )
                })
                .collect();
            let method = request.method().to_string();
            let path = request.uri().path().to_string();
            let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
                .await
                .unwrap();
            *last.lock().unwrap() = Some(CapturedRequest {
                method,
                path,
                headers,
                body: String::from_utf8_lossy(&bytes).to_string(),
            });
            (status, [(header::CONTENT_TYPE, "application/json")], body)
        }
    });

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { url, hits, last }
}

/// A loopback URL with nothing listening behind it.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub struct Harness {
    pub session: SessionManager,
    pub store: Arc<MemoryStore>,
    pub agent: Arc<MemoryAgent>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    /// Load the redirect target with the given query string.
    pub fn load_callback(&self, query: &str) {
        let url = Url::parse(&format!("{REDIRECT_URI}?{query}")).unwrap();
        self.agent.load(url);
    }

    /// Persist a token directly, bypassing the exchange.
    pub fn seed_token(&self, token: &str, expires_at: u64) {
        self.store
            .set_many(&[
                (keys::ACCESS_TOKEN, token),
                (keys::TOKEN_EXPIRY, &expires_at.to_string()),
            ])
            .unwrap();
    }
}

/// Session manager whose token endpoint and API base point at `server_url`.
pub fn harness(server_url: &str) -> Harness {
    let mut config = AuthConfig::new("test-client", REDIRECT_URI);
    config.token_endpoint = format!("{server_url}/api/token");
    config.api_base_url = format!("{server_url}/v1");

    let store = Arc::new(MemoryStore::new());
    let agent = Arc::new(MemoryAgent::new());
    let clock = Arc::new(ManualClock::new(START_MILLIS));
    let session = SessionManager::new(
        config,
        store.clone(),
        agent.clone(),
        reqwest::Client::new(),
    )
    .with_clock(clock.clone());

    Harness {
        session,
        store,
        agent,
        clock,
    }
}
