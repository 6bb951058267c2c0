#![allow(dead_code)]

#[cfg(feature = "serde-full")]
pub mod model;
#[cfg(feature = "serde-full")]
pub use model::*;

use thiserror::Error;

/// Shared error type for the rare case a component needs to raise an
/// orchestration-wide error that doesn't fit one of the crate-local
/// `thiserror` enums.
#[derive(Debug, Error, Clone)]
pub enum SoulError {
    #[error("{message}")]
    Message { message: String },
}

impl SoulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}
