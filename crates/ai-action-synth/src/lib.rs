//! AI Action Synthesizer (C5): produces an abstract `{observe, act, extract}`
//! action sequence, LLM-independent, and drives its execution against the
//! current page. Grounded on `pattern-cache` (C4) for reuse/learning.
//!
//! The live executor is an external collaborator satisfying the
//! `ActionExecutor` trait; `StubActionExecutor` is the deterministic
//! in-process stand-in used in tests, resolving spec.md's open question
//! about the synthesizer's "largely simulated placeholder" execution
//! semantics — mirrors `browser-manager`'s driver-behind-a-trait shape.

use async_trait::async_trait;
use pattern_cache::{pattern_key, PatternCache};
use soulbrowser_core_types::{
    AbstractAction, AbstractActionKind, ActionResult, ActionType, Approach, ErrorCategory,
    ErrorContext, Pattern,
};
use std::collections::HashMap;
use std::time::Duration;

/// Three-state probe for whether the AI-Assist backend can run at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Availability {
    Available,
    NotInstalled,
    NotConfigured,
}

fn unavailable_error_context(availability: Availability) -> ErrorContext {
    ErrorContext {
        category: ErrorCategory::Configuration,
        message: format!("AI-Assist executor not available: {availability:?}"),
        approach_used: Some(Approach::AiAssist),
        retryable: false,
        fallback_recommended: true,
        confidence_impact: 0.3,
        metadata: HashMap::new(),
    }
}

/// Synthesizes the 3-step abstract sequence per spec.md §4.5 (bypassing the
/// cache — callers normally go through `synthesize_and_execute`, which
/// consults the cache first).
pub fn synthesize(
    target_description: &str,
    action_type: ActionType,
    action_data: &HashMap<String, String>,
) -> Vec<AbstractAction> {
    let observe_locate = AbstractAction {
        kind: AbstractActionKind::Observe,
        description: format!("locate \"{target_description}\""),
        options: HashMap::new(),
    };

    let middle = match action_type {
        ActionType::Extract => {
            let mut options = HashMap::new();
            if let Some(schema) = action_data.get("schema") {
                options.insert("schema".to_string(), schema.clone());
            }
            AbstractAction {
                kind: AbstractActionKind::Extract,
                description: format!("extract from \"{target_description}\""),
                options,
            }
        }
        ActionType::Type => {
            let text = action_data.get("text").cloned().unwrap_or_default();
            let mut options = HashMap::new();
            options.insert("text".to_string(), text.clone());
            AbstractAction {
                kind: AbstractActionKind::Act,
                description: format!("enter \"{text}\" into \"{target_description}\""),
                options,
            }
        }
        other => AbstractAction {
            kind: AbstractActionKind::Act,
            description: format!("perform {other:?} on \"{target_description}\""),
            options: action_data.clone(),
        },
    };

    let observe_verify = AbstractAction {
        kind: AbstractActionKind::Observe,
        description: "verify completion".to_string(),
        options: HashMap::new(),
    };

    vec![observe_locate, middle, observe_verify]
}

/// Contract satisfied by whichever concrete AI-driven executor runs the
/// abstract sequence against a live page.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn run(
        &self,
        actions: &[AbstractAction],
        timeout: Duration,
    ) -> Result<HashMap<String, String>, String>;
}

/// Deterministic stub used in tests and wherever a live executor isn't
/// wired in — always succeeds, echoing the action descriptions back.
pub struct StubActionExecutor;

#[async_trait]
impl ActionExecutor for StubActionExecutor {
    async fn run(
        &self,
        actions: &[AbstractAction],
        _timeout: Duration,
    ) -> Result<HashMap<String, String>, String> {
        let mut data = HashMap::new();
        data.insert(
            "executed_actions".to_string(),
            actions.iter().map(|a| a.description.clone()).collect::<Vec<_>>().join(" -> "),
        );
        Ok(data)
    }
}

/// Consults the pattern cache, synthesizing and storing a new pattern on a
/// miss, then drives `executor` against the resulting sequence. Updates the
/// pattern's success/failure counters based on the outcome.
pub async fn synthesize_and_execute(
    cache: &PatternCache,
    executor: &dyn ActionExecutor,
    availability: Availability,
    task_description: &str,
    action_type: ActionType,
    target_description: &str,
    action_data: &HashMap<String, String>,
    timeout: Duration,
) -> ActionResult {
    if availability != Availability::Available {
        let ctx = unavailable_error_context(availability);
        let mut result = ActionResult::failure(Some(Approach::AiAssist), ctx.message.clone());
        result.recommendation = Some("configure the AI-Assist backend before use".to_string());
        return result;
    }

    let action_type_str = format!("{action_type:?}").to_lowercase();
    let key = pattern_key(task_description, &action_type_str, target_description);

    let actions = if let Some(existing) = cache.touch(&key) {
        tracing::debug!(target: "ai_action_synth", key, "pattern cache hit");
        existing.actions
    } else {
        let synthesized = synthesize(target_description, action_type, action_data);
        let pattern = Pattern {
            pattern_id: key.clone(),
            actions: synthesized.clone(),
            success_count: 0,
            failure_count: 0,
            last_used: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };
        cache.put(pattern);
        synthesized
    };

    let mut result_data = HashMap::new();
    result_data.insert(
        "actions".to_string(),
        actions.iter().map(|a| a.description.clone()).collect::<Vec<_>>().join(" -> "),
    );

    match executor.run(&actions, timeout).await {
        Ok(echoed) => {
            cache.record(&key, true);
            result_data.extend(echoed);
            ActionResult {
                success: true,
                approach_used: Some(Approach::AiAssist),
                confidence: 0.7,
                execution_time_secs: 0.0,
                result_data,
                error_message: None,
                recommendation: None,
            }
        }
        Err(error) => {
            cache.record(&key, false);
            let mut result = ActionResult::failure(Some(Approach::AiAssist), error);
            result.result_data = result_data;
            result
        }
    }
}
