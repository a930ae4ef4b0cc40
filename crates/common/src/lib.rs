//! Shared types for the Spotify session workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
