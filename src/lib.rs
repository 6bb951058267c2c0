//! Binary-crate support library: configuration, error types, metrics, the
//! HTTP surface, and the wiring that turns the orchestration crates into a
//! runnable `Orchestrator`. Exposed as a library (rather than folded into
//! `main.rs`) so `tests/` integration tests and `assert_cmd` can drive it
//! directly.

pub mod cli;
pub mod config;
pub mod errors;
pub mod http;
pub mod metrics;
pub mod runtime;

pub use errors::{AppError, AppResult};
