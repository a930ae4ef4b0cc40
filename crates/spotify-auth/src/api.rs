//! Authenticated Web API calls
//!
//! `authenticated_fetch` is the one primitive collaborators build on: it
//! attaches the bearer token, JSON-encodes the body, and maps failures onto
//! `ApiErrorKind`. Raw error bodies are logged at debug level only.

use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::classify::classify_api_error;
use crate::error::{ApiErrorKind, Error, Result};
use crate::session::SessionManager;

/// Method and optional JSON body of an API call. Defaults to a bare GET.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub method: Method,
    pub body: Option<serde_json::Value>,
}

impl FetchRequest {
    pub fn new(method: Method) -> Self {
        Self { method, body: None }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Successful API result.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 204, or a 2xx with an empty body
    NoContent,
    Json(serde_json::Value),
}

impl SessionManager {
    /// Call the Web API at `path` with the current access token.
    ///
    /// Fails with `NotAuthenticated` before any I/O when there is no valid
    /// token.
    pub async fn authenticated_fetch(
        &self,
        path: &str,
        request: FetchRequest,
    ) -> Result<ApiResponse> {
        let token = self.get_access_token().ok_or(Error::NotAuthenticated)?;
        let url = self.config().api_url(path);
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        debug!(request_id, method = %request.method, path, "calling Spotify API");

        let mut builder = self
            .http()
            .request(request.method.clone(), &url)
            .bearer_auth(token.expose());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("Spotify API request failed: {e}")))?;

        let status = response.status();
        metrics::counter!("spotify_api_requests_total", "status" => status.as_u16().to_string())
            .increment(1);

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse::NoContent);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = classify_api_error(status.as_u16(), &body);
            debug!(request_id, status = status.as_u16(), body = %body, "Spotify API error body");
            warn!(request_id, status = status.as_u16(), %kind, path, "Spotify API request failed");
            return Err(Error::Api(kind));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("reading Spotify API response: {e}")))?;
        if bytes.is_empty() {
            return Ok(ApiResponse::NoContent);
        }

        serde_json::from_slice(&bytes)
            .map(ApiResponse::Json)
            .map_err(|e| {
                debug!(request_id, error = %e, "Spotify API response is not JSON");
                Error::Api(ApiErrorKind::InvalidPayload)
            })
    }
}
