//! Live API backed by the PKCE session

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use spotify_auth::SessionManager;

use crate::{ApiResponse, FetchRequest, MusicApi, Result};

pub struct LiveApi {
    session: Arc<SessionManager>,
}

impl LiveApi {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

impl MusicApi for LiveApi {
    fn id(&self) -> &str {
        "live"
    }

    fn is_authed(&self) -> bool {
        self.session.is_authed()
    }

    fn fetch<'a>(
        &'a self,
        path: &'a str,
        request: FetchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(self.session.authenticated_fetch(path, request))
    }
}
