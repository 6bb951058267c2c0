//! Error Classifier (C7): a pure function mapping a failure message onto the
//! automation error taxonomy.
//!
//! Grounded in the rule-table shape of `error_classification.py` in the
//! original implementation, redesigned per spec as a deterministic
//! first-match-wins table instead of a confidence-weighted scorer — the
//! taxonomy here carries fixed retryability/fallback/impact values per
//! category rather than a continuous confidence number.

use soulbrowser_core_types::{Approach, ErrorCategory, ErrorContext};
use std::collections::HashMap;

struct Rule {
    category: ErrorCategory,
    signals: &'static [&'static str],
    impact: f64,
}

const RULES: &[Rule] = &[
    Rule {
        category: ErrorCategory::Network,
        signals: &["connection", "dns", "unreachable", "httperror", "urlerror"],
        impact: 0.1,
    },
    Rule {
        category: ErrorCategory::PageLoad,
        signals: &["failed to load", "navigation", "page not found", "404", "500"],
        impact: 0.2,
    },
    Rule {
        category: ErrorCategory::ElementNotFound,
        signals: &[
            "element not found",
            "no such element",
            "not visible",
            "selector",
            "xpath",
        ],
        impact: 0.3,
    },
    Rule {
        category: ErrorCategory::InteractionFailed,
        signals: &["click failed", "not interactable", "intercepted", "obscured"],
        impact: 0.2,
    },
    Rule {
        category: ErrorCategory::PermissionDenied,
        signals: &["denied", "cors", "cross-origin", "forbidden", "security"],
        impact: 0.5,
    },
    Rule {
        category: ErrorCategory::Browser,
        signals: &["webdriver", "chromedriver", "driver", "session"],
        impact: 0.4,
    },
    Rule {
        category: ErrorCategory::Timeout,
        signals: &["timeout", "timed out", "time limit", "deadline"],
        impact: 0.2,
    },
    Rule {
        category: ErrorCategory::Configuration,
        signals: &["config", "setup", "initialization", "not configured"],
        impact: 0.3,
    },
];

/// "timeout" + "network" both present routes to `Network` ahead of the
/// generic timeout rule — spec.md's network row lists this as a combined
/// signal distinct from the plain `timeout` row below it.
fn matches_network_timeout_combo(haystack: &str) -> bool {
    haystack.contains("timeout") && haystack.contains("network")
}

fn retryable(category: ErrorCategory, approach: Option<Approach>) -> bool {
    use ErrorCategory::*;
    match category {
        Network | PageLoad | InteractionFailed | Timeout | Unknown => true,
        ElementNotFound => approach == Some(Approach::Dom),
        Browser => approach != Some(Approach::Vision),
        PermissionDenied | Configuration => false,
    }
}

fn fallback_recommended(category: ErrorCategory, approach: Option<Approach>) -> bool {
    use ErrorCategory::*;
    match category {
        PageLoad | ElementNotFound | InteractionFailed | Browser | Configuration | Unknown => true,
        Network | PermissionDenied => false,
        Timeout => approach == Some(Approach::Dom),
    }
}

/// Classifies `message` for the given `approach`, attaching `metadata`
/// unchanged to the resulting context.
pub fn classify(
    message: &str,
    approach: Option<Approach>,
    metadata: HashMap<String, String>,
) -> ErrorContext {
    let haystack = message.to_lowercase();

    if matches_network_timeout_combo(&haystack) {
        return build(ErrorCategory::Network, 0.1, message, approach, metadata);
    }

    for rule in RULES {
        if rule.signals.iter().any(|s| haystack.contains(s)) {
            return build(rule.category, rule.impact, message, approach, metadata);
        }
    }

    build(ErrorCategory::Unknown, 0.2, message, approach, metadata)
}

fn build(
    category: ErrorCategory,
    impact: f64,
    message: &str,
    approach: Option<Approach>,
    metadata: HashMap<String, String>,
) -> ErrorContext {
    let ctx = ErrorContext {
        category,
        message: message.to_string(),
        approach_used: approach,
        retryable: retryable(category, approach),
        fallback_recommended: fallback_recommended(category, approach),
        confidence_impact: impact,
        metadata,
    };
    tracing::debug!(target: "error_classifier", category = ?ctx.category, retryable = ctx.retryable, "classified error");
    ctx
}

/// A short, human-readable next step derived from the error category, used
/// to populate `ErrorContext`/`ActionResult.recommendation` fields.
pub fn recommendation(category: ErrorCategory) -> &'static str {
    use ErrorCategory::*;
    match category {
        Network => "Check network connectivity and retry",
        PageLoad => "Reload the page and verify the URL is reachable",
        ElementNotFound => "Try an alternative selector or use AI-Assist",
        InteractionFailed => "Scroll the element into view and retry",
        PermissionDenied => "Check security policy; this approach cannot proceed",
        Browser => "Restart the browser session",
        Timeout => "Increase the timeout or add an explicit wait",
        Configuration => "Verify the approach is configured before use",
        Unknown => "Retry once, then try a different approach",
    }
}
