//! Interactive Recovery (C10): enumerates recovery options after a failure
//! and dispatches whichever action the user (or a default policy) selects.
//!
//! Option generation/dispatch is generalized from
//! `action-flow::strategies::FailureHandler`'s strategy-to-result mapping;
//! the ranked-options + user-callback shape is new to this component since
//! the teacher's failure handler has no interactive step.

use async_trait::async_trait;
use soulbrowser_core_types::{Approach, ActionResult, ErrorContext, RecoveryAction, RecoveryOption};

#[derive(Clone, Debug)]
pub struct RecoveryContext {
    pub error: ErrorContext,
    pub failed_result: ActionResult,
    pub tried_approaches: Vec<Approach>,
    pub explanation: String,
    pub options: Vec<RecoveryOption>,
    pub llm_analysis: Option<String>,
}

fn all_approaches() -> [Approach; 3] {
    [Approach::Dom, Approach::AiAssist, Approach::Vision]
}

fn remaining_approaches(tried: &[Approach]) -> Vec<Approach> {
    all_approaches()
        .into_iter()
        .filter(|a| !tried.contains(a))
        .collect()
}

/// Builds the ranked option list per spec.md §4.10's generation rules.
pub fn generate_options(error: &ErrorContext, tried: &[Approach]) -> Vec<RecoveryOption> {
    let mut options = Vec::new();

    if error.retryable {
        options.push(RecoveryOption {
            action: RecoveryAction::RetrySame,
            title: "Retry the same approach".to_string(),
            description: "The last failure was retryable; try it again".to_string(),
            confidence: 0.6,
            requires_input: false,
        });
    }

    for approach in remaining_approaches(tried) {
        options.push(RecoveryOption {
            action: RecoveryAction::TryDifferent,
            title: format!("Try {approach} instead"),
            description: format!("Switch to the {approach} approach and re-run routing"),
            confidence: 0.7,
            requires_input: false,
        });
    }

    options.push(RecoveryOption {
        action: RecoveryAction::ShowBrowser,
        title: "Show the browser".to_string(),
        description: "Re-run the same approach with the browser window visible".to_string(),
        confidence: 0.4,
        requires_input: false,
    });
    options.push(RecoveryOption {
        action: RecoveryAction::ModifyTask,
        title: "Modify the task".to_string(),
        description: "Rephrase the task or target description and retry".to_string(),
        confidence: 0.5,
        requires_input: true,
    });
    options.push(RecoveryOption {
        action: RecoveryAction::Manual,
        title: "Take over manually".to_string(),
        description: "Complete the remaining steps by hand".to_string(),
        confidence: 0.3,
        requires_input: false,
    });
    options.push(RecoveryOption {
        action: RecoveryAction::Abort,
        title: "Abort".to_string(),
        description: "Give up on this action request".to_string(),
        confidence: 0.1,
        requires_input: false,
    });

    options.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());
    options
}

pub fn build_context(
    error: ErrorContext,
    failed_result: ActionResult,
    tried_approaches: Vec<Approach>,
    llm_analysis: Option<String>,
) -> RecoveryContext {
    let options = generate_options(&error, &tried_approaches);
    let explanation = format!(
        "{:?} failed after trying {:?}: {}",
        error.category, tried_approaches, error.message
    );
    RecoveryContext {
        error,
        failed_result,
        tried_approaches,
        explanation,
        options,
        llm_analysis,
    }
}

/// Receives a `RecoveryContext` and returns the chosen action plus any
/// freeform additional input (used by `ModifyTask`).
#[async_trait]
pub trait UserCallback: Send + Sync {
    async fn choose(&self, context: &RecoveryContext) -> Option<(RecoveryAction, Option<String>)>;
}

/// Falls back to `try_different` when another approach remains, else
/// `abort` — used when no callback is registered or the callback panics.
pub fn default_choice(tried: &[Approach]) -> RecoveryAction {
    if remaining_approaches(tried).is_empty() {
        RecoveryAction::Abort
    } else {
        RecoveryAction::TryDifferent
    }
}

/// What the orchestrator should do next given the user's chosen action.
#[derive(Clone, Debug)]
pub enum RecoveryOutcome {
    RetrySameApproach,
    RerouteExcluding(Vec<Approach>),
    TaskNeedsModification { additional_input: Option<String> },
    RetryWithVisibleBrowser,
    ManualSuccess,
    Aborted,
}

pub async fn resolve(
    context: &RecoveryContext,
    callback: Option<&dyn UserCallback>,
) -> RecoveryOutcome {
    let chosen = match callback {
        Some(cb) => cb
            .choose(context)
            .await
            .map(|(action, input)| (action, input))
            .unwrap_or_else(|| (default_choice(&context.tried_approaches), None)),
        None => (default_choice(&context.tried_approaches), None),
    };

    let outcome = match chosen {
        (RecoveryAction::RetrySame, _) => RecoveryOutcome::RetrySameApproach,
        (RecoveryAction::TryDifferent, _) => {
            RecoveryOutcome::RerouteExcluding(context.tried_approaches.clone())
        }
        (RecoveryAction::ModifyTask, input) => {
            RecoveryOutcome::TaskNeedsModification { additional_input: input }
        }
        (RecoveryAction::ShowBrowser, _) => RecoveryOutcome::RetryWithVisibleBrowser,
        (RecoveryAction::Manual, _) => RecoveryOutcome::ManualSuccess,
        (RecoveryAction::Abort, _) => RecoveryOutcome::Aborted,
    };

    tracing::info!(
        target: "recovery",
        category = ?context.error.category,
        tried = ?context.tried_approaches,
        outcome = ?outcome,
        "recovery resolved"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulbrowser_core_types::ErrorCategory;
    use std::collections::HashMap;

    fn sample_error(retryable: bool) -> ErrorContext {
        ErrorContext {
            category: ErrorCategory::ElementNotFound,
            message: "element not found".to_string(),
            approach_used: Some(Approach::Dom),
            retryable,
            fallback_recommended: true,
            confidence_impact: 0.3,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn retry_same_only_offered_when_retryable() {
        let retryable = generate_options(&sample_error(true), &[]);
        assert!(retryable.iter().any(|o| o.action == RecoveryAction::RetrySame));

        let not_retryable = generate_options(&sample_error(false), &[]);
        assert!(!not_retryable.iter().any(|o| o.action == RecoveryAction::RetrySame));
    }

    #[test]
    fn always_includes_terminal_options() {
        let options = generate_options(&sample_error(true), &[Approach::Dom, Approach::AiAssist, Approach::Vision]);
        let actions: Vec<_> = options.iter().map(|o| o.action).collect();
        assert!(actions.contains(&RecoveryAction::ShowBrowser));
        assert!(actions.contains(&RecoveryAction::Manual));
        assert!(actions.contains(&RecoveryAction::Abort));
        assert!(actions.contains(&RecoveryAction::ModifyTask));
        assert!(!actions.contains(&RecoveryAction::TryDifferent));
    }

    #[test]
    fn options_are_ranked_by_confidence_descending() {
        let options = generate_options(&sample_error(true), &[]);
        for pair in options.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[tokio::test]
    async fn no_callback_defaults_to_try_different_then_abort() {
        let ctx_with_remaining = build_context(sample_error(true), ActionResult::default(), vec![Approach::Dom], None);
        match resolve(&ctx_with_remaining, None).await {
            RecoveryOutcome::RerouteExcluding(tried) => assert_eq!(tried, vec![Approach::Dom]),
            other => panic!("expected reroute, got {other:?}"),
        }

        let ctx_exhausted = build_context(
            sample_error(true),
            ActionResult::default(),
            vec![Approach::Dom, Approach::AiAssist, Approach::Vision],
            None,
        );
        match resolve(&ctx_exhausted, None).await {
            RecoveryOutcome::Aborted => {}
            other => panic!("expected abort, got {other:?}"),
        }
    }
}
