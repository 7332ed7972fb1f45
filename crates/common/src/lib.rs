//! Common types for the clinic API client workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
