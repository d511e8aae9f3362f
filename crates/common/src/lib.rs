//! Shared types for the OAuth 2.0 MFA client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
