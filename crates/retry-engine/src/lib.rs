//! Retry Engine (C8): runs an async operation with category-aware
//! exponential backoff, jitter and a per-attempt deadline.
//!
//! Backoff shape follows `action-flow::strategies::DefaultFailureHandler`
//! (exponential, capped) generalized with the per-category multiplier table
//! and jitter spec.md calls for; outcome recording follows
//! `state_center::BoundedRing` for the bounded history.

use error_classifier::classify;
use rand::Rng;
use soulbrowser_core_types::{ActionResult, ErrorCategory};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_backoff: bool,
    pub jitter: bool,
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_backoff: true,
            jitter: true,
            timeout: Duration::from_secs(120),
        }
    }
}

fn category_multiplier(category: ErrorCategory) -> f64 {
    use ErrorCategory::*;
    match category {
        Network => 1.5,
        PageLoad => 1.2,
        Timeout => 1.3,
        Browser => 2.0,
        ElementNotFound => 0.8,
        InteractionFailed => 0.9,
        PermissionDenied | Configuration | Unknown => 1.0,
    }
}

/// Delay between attempt `attempt_index` (0-indexed) and the next one.
pub fn backoff_delay(config: &RetryConfig, attempt_index: u32, category: ErrorCategory) -> Duration {
    let exponent: u32 = if config.exponential_backoff {
        attempt_index
    } else {
        0
    };
    let multiplier = category_multiplier(category);
    let base_ms = config.base_delay.as_millis() as f64;
    let scaled_ms = base_ms * 2f64.powi(exponent as i32) * multiplier;
    let capped_ms = scaled_ms.min(config.max_delay.as_millis() as f64);

    let jittered_ms = if config.jitter {
        let jitter_frac = rand::thread_rng().gen_range(-0.1..=0.1);
        (capped_ms * (1.0 + jitter_frac)).max(0.0)
    } else {
        capped_ms
    };

    Duration::from_millis(jittered_ms.round() as u64)
}

#[derive(Clone, Debug)]
pub struct RetryRecord {
    pub attempts: u32,
    pub succeeded: bool,
    pub last_category: Option<ErrorCategory>,
}

/// Bounded ring buffer of retry outcomes, capped at 500 per spec.md §4.8.
pub struct RetryHistory {
    capacity: usize,
    records: parking_lot::Mutex<VecDeque<RetryRecord>>,
}

impl RetryHistory {
    pub fn new() -> Self {
        Self::with_capacity(500)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: parking_lot::Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    fn push(&self, record: RetryRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn snapshot(&self) -> Vec<RetryRecord> {
        self.records.lock().iter().cloned().collect()
    }
}

impl Default for RetryHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `op` under `config`, classifying failures via the Error Classifier
/// (C7) and retrying only retryable categories. `op` takes the 1-indexed
/// attempt number and must resolve within `config.timeout` (enforced here).
pub async fn run<F, Fut>(
    mut op: F,
    config: &RetryConfig,
    history: &RetryHistory,
    metadata: HashMap<String, String>,
) -> ActionResult
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ActionResult>,
{
    let mut last_result = ActionResult::failure(None, "retry engine never invoked the operation");
    let mut last_category = None;

    for attempt_index in 0..=config.max_retries {
        let attempt = attempt_index + 1;
        let deadline = tokio::time::timeout(config.timeout, op(attempt)).await;

        let result = match deadline {
            Ok(result) => result,
            Err(_) => ActionResult::failure(None, format!("attempt {attempt} exceeded timeout")),
        };

        if result.success {
            history.push(RetryRecord {
                attempts: attempt,
                succeeded: true,
                last_category: None,
            });
            return result;
        }

        let message = result
            .error_message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        let ctx = classify(&message, result.approach_used, metadata.clone());
        last_category = Some(ctx.category);
        last_result = result;
        last_result.recommendation = Some(error_classifier::recommendation(ctx.category).to_string());

        if !ctx.retryable || attempt_index == config.max_retries {
            warn!(target: "retry_engine", attempt, retryable = ctx.retryable, "giving up");
            break;
        }

        let delay = backoff_delay(config, attempt_index, ctx.category);
        info!(target: "retry_engine", attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        tokio::time::sleep(delay).await;
    }

    history.push(RetryRecord {
        attempts: config.max_retries + 1,
        succeeded: false,
        last_category,
    });
    last_result
}
