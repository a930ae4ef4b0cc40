//! Service-specific error types

use std::time::Duration;

use thiserror::Error;

/// Failures of the interactive `login` command.
///
/// Errors raised by the session manager itself (state mismatch, token
/// exchange, ...) pass through unchanged as `Session`.
#[derive(Error, Debug)]
pub enum LoginError {
    #[error("redirect_uri must be an http:// loopback address to log in from the CLI, got: {0}")]
    NotLoopback(String),

    #[error("failed to listen for the callback on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("no callback received within {}s, run login again", .0.as_secs())]
    Timeout(Duration),

    #[error("callback server stopped before a callback arrived")]
    ServerStopped,

    #[error(transparent)]
    Session(#[from] spotify_auth::Error),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, LoginError>;
