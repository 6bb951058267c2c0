//! DOM Action Executor (C3): executes concrete click/type/select/clear
//! actions against elements located from a `DomAnalysis` by description.
//!
//! Locator matching (substring then fuzzy token overlap) follows the same
//! two-pass "exact, then relaxed" idiom `routing-decider` uses for keyword
//! dispatch, generalized here to element text/attribute matching.

use async_trait::async_trait;
use dom_analyzer::PageInspector;
use soulbrowser_core_types::{ActionResult, ActionType, DomAnalysis, DomElement};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomActionError {
    #[error("actuator error: {0}")]
    Actuator(String),
    #[error("inspector error: {0}")]
    Inspector(String),
}

impl From<dom_analyzer::DomAnalyzerError> for DomActionError {
    fn from(e: dom_analyzer::DomAnalyzerError) -> Self {
        DomActionError::Inspector(e.to_string())
    }
}

/// Contract satisfied by whichever concrete browser driver performs the
/// interaction. Timeouts are expressed per spec.md §6 by the caller.
#[async_trait]
pub trait ElementActuator: Send + Sync {
    async fn click(&self, selector: &str) -> Result<(), DomActionError>;
    async fn fill(&self, selector: &str, text: &str) -> Result<(), DomActionError>;
    async fn select_option(&self, selector: &str, option: &str) -> Result<(), DomActionError>;
    async fn wait_quiescent(&self, timeout: Duration) -> Result<(), DomActionError>;
}

/// Case-insensitive substring match against visible text and attribute
/// values, falling back to fuzzy whitespace-token overlap. Returns the
/// highest-scoring candidate above a minimal relevance floor.
pub fn locate<'a>(analysis: &'a DomAnalysis, target_description: &str) -> Option<&'a DomElement> {
    let target_lower = target_description.to_lowercase();

    let substring_hit = analysis.interactive_elements.iter().find(|el| {
        el.text.to_lowercase().contains(&target_lower)
            || el
                .attributes
                .values()
                .any(|v| v.to_lowercase().contains(&target_lower))
    });
    if let Some(hit) = substring_hit {
        return Some(hit);
    }

    let target_tokens: std::collections::HashSet<&str> =
        target_lower.split_whitespace().collect();
    if target_tokens.is_empty() {
        return None;
    }

    analysis
        .interactive_elements
        .iter()
        .filter_map(|el| {
            let haystack = format!(
                "{} {}",
                el.text.to_lowercase(),
                el.attributes.values().cloned().collect::<Vec<_>>().join(" ").to_lowercase()
            );
            let haystack_tokens: std::collections::HashSet<&str> =
                haystack.split_whitespace().collect();
            let overlap = target_tokens.intersection(&haystack_tokens).count();
            if overlap == 0 {
                None
            } else {
                Some((overlap, el))
            }
        })
        .max_by_key(|(overlap, _)| *overlap)
        .map(|(_, el)| el)
}

/// Executes one DOM action end to end per spec.md §4.3.
pub async fn execute(
    inspector: &dyn PageInspector,
    actuator: &dyn ElementActuator,
    url: &str,
    action_type: ActionType,
    target_description: &str,
    action_data: &HashMap<String, String>,
    confidence_threshold: f64,
    timeout: Duration,
) -> ActionResult {
    let analysis = match dom_analyzer::analyze_page(inspector, url).await {
        Ok(a) => a,
        Err(e) => return ActionResult::failure(Some(soulbrowser_core_types::Approach::Dom), e.to_string()),
    };

    if analysis.analysis_confidence < confidence_threshold {
        let mut result = ActionResult::failure(
            Some(soulbrowser_core_types::Approach::Dom),
            format!(
                "DOM analysis confidence {:.2} below threshold {:.2}",
                analysis.analysis_confidence, confidence_threshold
            ),
        );
        result.recommendation = Some("use AI-Assist".to_string());
        return result;
    }

    let element = match locate(&analysis, target_description) {
        Some(el) => el.clone(),
        None => {
            return ActionResult::failure(
                Some(soulbrowser_core_types::Approach::Dom),
                format!("element not found: \"{target_description}\""),
            )
        }
    };

    let action_outcome = match action_type {
        ActionType::Click | ActionType::Submit | ActionType::Automation => {
            actuator.click(&element.selector).await
        }
        ActionType::Type => match action_data.get("text") {
            Some(text) => actuator.fill(&element.selector, text).await,
            None => {
                return ActionResult::failure(
                    Some(soulbrowser_core_types::Approach::Dom),
                    "type action requires action_data.text",
                )
            }
        },
        ActionType::Select => match action_data.get("option") {
            Some(option) => actuator.select_option(&element.selector, option).await,
            None => {
                return ActionResult::failure(
                    Some(soulbrowser_core_types::Approach::Dom),
                    "select action requires action_data.option",
                )
            }
        },
        ActionType::Clear => actuator.fill(&element.selector, "").await,
        ActionType::Extract => Ok(()),
    };

    if let Err(e) = action_outcome {
        return ActionResult::failure(Some(soulbrowser_core_types::Approach::Dom), e.to_string());
    }

    if let Err(e) = actuator.wait_quiescent(timeout).await {
        tracing::warn!(target: "dom_action_executor", error = %e, "quiescence wait failed, reporting success anyway");
    }

    let mut result_data = HashMap::new();
    result_data.insert("selector".to_string(), element.selector.clone());
    result_data.insert("matched_text".to_string(), element.text.clone());

    ActionResult {
        success: true,
        approach_used: Some(soulbrowser_core_types::Approach::Dom),
        confidence: element.confidence,
        execution_time_secs: 0.0,
        result_data,
        error_message: None,
        recommendation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_analyzer::RawCandidate;
    use soulbrowser_core_types::FormInfo;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn candidate(tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawCandidate {
        RawCandidate {
            tag: tag.to_string(),
            text: text.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            xpath: format!("//{tag}"),
            selector: format!("#{text}").to_lowercase(),
        }
    }

    struct StubInspector {
        elements: Vec<RawCandidate>,
    }

    #[async_trait]
    impl PageInspector for StubInspector {
        async fn title(&self) -> Result<String, dom_analyzer::DomAnalyzerError> {
            Ok("Stub".to_string())
        }
        async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(self.elements.clone())
        }
        async fn forms(&self) -> Result<Vec<FormInfo>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![FormInfo::default()])
        }
        async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn content_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct RecordingActuator {
        clicks: AtomicU32,
        filled: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ElementActuator for RecordingActuator {
        async fn click(&self, _selector: &str) -> Result<(), DomActionError> {
            self.clicks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn fill(&self, selector: &str, text: &str) -> Result<(), DomActionError> {
            self.filled.lock().unwrap().push((selector.to_string(), text.to_string()));
            Ok(())
        }
        async fn select_option(&self, _selector: &str, _option: &str) -> Result<(), DomActionError> {
            Ok(())
        }
        async fn wait_quiescent(&self, _timeout: Duration) -> Result<(), DomActionError> {
            Ok(())
        }
    }

    fn high_confidence_page() -> StubInspector {
        StubInspector {
            elements: (0..5)
                .map(|i| candidate("button", &format!("Action{i}"), &[("id", "x"), ("aria-label", "y")]))
                .chain(std::iter::once(candidate(
                    "button",
                    "Submit",
                    &[("id", "submit-btn"), ("aria-label", "Submit form")],
                )))
                .collect(),
        }
    }

    #[tokio::test]
    async fn clicks_matched_element_and_reports_its_confidence() {
        let inspector = high_confidence_page();
        let actuator = RecordingActuator::default();
        let result = execute(
            &inspector,
            &actuator,
            "https://example.com",
            ActionType::Click,
            "submit button",
            &HashMap::new(),
            0.5,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.success);
        assert_eq!(actuator.clicks.load(Ordering::SeqCst), 1);
        assert!(result.confidence > 0.9);
    }

    #[tokio::test]
    async fn low_confidence_page_recommends_ai_assist() {
        let inspector = StubInspector { elements: vec![candidate("div", "", &[])] };
        let actuator = RecordingActuator::default();
        let result = execute(
            &inspector,
            &actuator,
            "https://example.com",
            ActionType::Click,
            "anything",
            &HashMap::new(),
            0.7,
            Duration::from_secs(1),
        )
        .await;
        assert!(!result.success);
        assert_eq!(result.recommendation.as_deref(), Some("use AI-Assist"));
    }

    #[tokio::test]
    async fn missing_element_fails_with_not_found() {
        let inspector = high_confidence_page();
        let actuator = RecordingActuator::default();
        let result = execute(
            &inspector,
            &actuator,
            "https://example.com",
            ActionType::Click,
            "nonexistent widget",
            &HashMap::new(),
            0.5,
            Duration::from_secs(1),
        )
        .await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("element not found"));
    }

    #[tokio::test]
    async fn type_without_text_fails() {
        let inspector = high_confidence_page();
        let actuator = RecordingActuator::default();
        let result = execute(
            &inspector,
            &actuator,
            "https://example.com",
            ActionType::Type,
            "submit",
            &HashMap::new(),
            0.5,
            Duration::from_secs(1),
        )
        .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn type_fills_with_provided_text() {
        let inspector = high_confidence_page();
        let actuator = RecordingActuator::default();
        let mut data = HashMap::new();
        data.insert("text".to_string(), "hello".to_string());
        let result = execute(
            &inspector,
            &actuator,
            "https://example.com",
            ActionType::Type,
            "submit",
            &data,
            0.5,
            Duration::from_secs(1),
        )
        .await;
        assert!(result.success);
        assert_eq!(actuator.filled.lock().unwrap()[0].1, "hello");
    }
}
