//! Dev-mode API with canned responses
//!
//! Answers the handful of endpoints the game uses from a fixed catalog,
//! after a short artificial delay so loading states stay visible. Always
//! reports itself as authenticated.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use crate::{ApiResponse, FetchRequest, Method, MusicApi, Result};

const DEFAULT_LATENCY: Duration = Duration::from_millis(300);

/// (uri, name, artist, duration_ms)
const CATALOG: &[(&str, &str, &str, u64)] = &[
    ("spotify:track:mock1", "Bohemian Rhapsody", "Queen", 355_000),
    ("spotify:track:mock2", "Stairway to Heaven", "Led Zeppelin", 482_000),
    ("spotify:track:mock3", "Hotel California", "Eagles", 391_000),
    ("spotify:track:mock4", "Sweet Child O' Mine", "Guns N' Roses", 356_000),
    ("spotify:track:mock5", "Imagine", "John Lennon", 183_000),
    ("spotify:track:mock6", "Billie Jean", "Michael Jackson", 294_000),
    ("spotify:track:mock7", "Smells Like Teen Spirit", "Nirvana", 301_000),
    ("spotify:track:mock8", "Like a Rolling Stone", "Bob Dylan", 366_000),
    ("spotify:track:mock9", "Wonderwall", "Oasis", 258_000),
    ("spotify:track:mock10", "Don't Stop Believin'", "Journey", 251_000),
];

pub struct MockApi {
    latency: Duration,
}

impl MockApi {
    pub fn new() -> Self {
        Self::with_latency(DEFAULT_LATENCY)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

fn tracks() -> Value {
    CATALOG
        .iter()
        .map(|(uri, name, artist, duration_ms)| {
            json!({
                "uri": uri,
                "name": name,
                "artists": [{ "name": artist }],
                "duration_ms": duration_ms,
            })
        })
        .collect()
}

/// Canned response for `path`. The query string is ignored.
fn respond(path: &str, method: &Method) -> ApiResponse {
    let route = path.split('?').next().unwrap_or(path);
    match route {
        "/me" => ApiResponse::Json(json!({
            "display_name": "Dev Mode",
            "product": "premium",
            "country": "US",
        })),
        "/me/top/tracks" => ApiResponse::Json(json!({ "items": tracks() })),
        "/me/player" if *method == Method::GET => ApiResponse::Json(json!({
            "device": { "id": "dev-device", "is_active": true },
        })),
        "/me/player" => ApiResponse::NoContent,
        r if r.starts_with("/me/player/") => ApiResponse::NoContent,
        r if r.starts_with("/search") => {
            ApiResponse::Json(json!({ "tracks": { "items": tracks() } }))
        }
        _ => ApiResponse::Json(json!({})),
    }
}

impl MusicApi for MockApi {
    fn id(&self) -> &str {
        "mock"
    }

    fn is_authed(&self) -> bool {
        true
    }

    fn fetch<'a>(
        &'a self,
        path: &'a str,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;
            debug!(path, method = %request.method, "serving mock response");
            Ok(respond(path, &request.method))
        })
    }
}
