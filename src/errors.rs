//! Top-level error type for the `soulbrowser` binary.
//!
//! The orchestration crates each carry their own typed errors (e.g.
//! `browser_manager::BrowserManagerError`, `credential_store::CredentialError`);
//! this type exists only to give the CLI a single `Result` alias to return
//! from `main`, the same role `anyhow::Error` already plays one layer down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("credential store error: {0}")]
    Credential(#[from] credential_store::CredentialError),
    #[error("session store error: {0}")]
    Session(#[from] session_store::SessionError),
    #[error("invalid action type: {0}")]
    InvalidActionType(String),
    #[error("invalid approach: {0}")]
    InvalidApproach(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;
