//! The page the session code runs in
//!
//! A `UserAgent` exposes the three browser capabilities the PKCE flow
//! needs: the current page URL, full-page navigation, and replacing the
//! visible URL without a reload (history replacement).

use std::sync::{Mutex, PoisonError};

use url::Url;

use crate::error::{Error, Result};

pub trait UserAgent: Send + Sync {
    /// URL of the page currently loaded.
    fn current_url(&self) -> Result<Url>;

    /// Full-page navigation. Nothing after this call runs on the old page.
    fn navigate(&self, url: &Url) -> Result<()>;

    /// Replace the visible URL in place. No reload, no history entry.
    fn replace_url(&self, url: &Url);
}

/// User agent whose page is set explicitly.
///
/// Used wherever the "page" is not a real browser tab: tests, and the
/// loopback callback server, which loads each callback request URL into
/// its agent before handling it.
#[derive(Debug, Default)]
pub struct MemoryAgent {
    current: Mutex<Option<Url>>,
    navigations: Mutex<Vec<Url>>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `url` as the current page.
    pub fn load(&self, url: Url) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(url);
    }

    /// Every URL passed to `navigate`, oldest first.
    pub fn navigations(&self) -> Vec<Url> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_navigation(&self) -> Option<Url> {
        self.navigations().pop()
    }
}

impl UserAgent for MemoryAgent {
    fn current_url(&self) -> Result<Url> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| Error::Navigation("no page loaded".into()))
    }

    fn navigate(&self, url: &Url) -> Result<()> {
        self.navigations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
        self.load(url.clone());
        Ok(())
    }

    fn replace_url(&self, url: &Url) {
        self.load(url.clone());
    }
}
