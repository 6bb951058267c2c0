//! Automation data model shared by every orchestration component.
//!
//! Kept deliberately flat: these are the wire/value types that flow between
//! the routing, retry, recovery and execution crates. Behavior lives next to
//! the component that owns it, not here.

use std::collections::HashMap;

#[cfg(feature = "serde-full")]
use serde::{Deserialize, Serialize};

/// Strategy used to fulfill an action request.
#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Approach {
    Dom,
    AiAssist,
    Vision,
}

impl Approach {
    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::Dom => "dom",
            Approach::AiAssist => "ai_assist",
            Approach::Vision => "vision",
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of {click, type, select, clear, extract, submit, automation}.
#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum ActionType {
    Click,
    Type,
    Select,
    Clear,
    Extract,
    Submit,
    Automation,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub url: String,
    pub task_description: String,
    pub action_type: ActionType,
    pub target_description: String,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub action_data: HashMap<String, String>,
    pub confidence_threshold: f64,
    pub show_browser: bool,
    /// Bypasses the Routing Decider (C9) when set.
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub force_approach: Option<Approach>,
    /// User-preferred approach, consulted by the Routing Decider before any
    /// other rule.
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub user_preference: Option<Approach>,
}

impl ActionRequest {
    pub fn default_confidence_threshold() -> f64 {
        0.7
    }
}

/// Buckets a page by interactive-element and form counts.
#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum PageComplexity {
    Simple,
    Moderate,
    Complex,
}

impl PageComplexity {
    pub fn bucket(interactive_count: usize, forms_count: usize) -> Self {
        if interactive_count > 20 || forms_count > 2 {
            PageComplexity::Complex
        } else if interactive_count > 8 || forms_count > 0 {
            PageComplexity::Moderate
        } else {
            PageComplexity::Simple
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct DecisionContext {
    pub dom_confidence: f64,
    pub page_complexity: PageComplexity,
    pub element_count: usize,
    pub forms_count: usize,
    pub previous_failures: Vec<Approach>,
    pub user_preference: Option<Approach>,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum ElementType {
    Button,
    TextInput,
    Checkbox,
    Radio,
    Select,
    Link,
    Other,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct DomElement {
    pub tag: String,
    pub text: String,
    pub element_type: ElementType,
    pub attributes: HashMap<String, String>,
    pub xpath: String,
    pub selector: String,
    pub is_interactive: bool,
    pub confidence: f64,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct FormInfo {
    pub method: String,
    pub action: String,
    pub fields: Vec<String>,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct DomAnalysis {
    pub url: String,
    pub title: String,
    pub interactive_elements: Vec<DomElement>,
    pub forms: Vec<FormInfo>,
    pub navigation_elements: Vec<DomElement>,
    pub content_elements: Vec<DomElement>,
    pub total_element_count: usize,
    pub analysis_confidence: f64,
}

/// Abstract action emitted by the AI Action Synthesizer (C5).
#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum AbstractActionKind {
    Observe,
    Act,
    Extract,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct AbstractAction {
    pub kind: AbstractActionKind,
    pub description: String,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub options: HashMap<String, String>,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct Pattern {
    pub pattern_id: String,
    pub actions: Vec<AbstractAction>,
    pub success_count: u64,
    pub failure_count: u64,
    #[cfg_attr(feature = "serde-full", serde(with = "chrono::serde::ts_seconds"))]
    pub last_used: chrono::DateTime<chrono::Utc>,
    #[cfg_attr(feature = "serde-full", serde(with = "chrono::serde::ts_seconds"))]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Pattern {
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    /// Patterns are not consulted for historical-learning decisions until at
    /// least 3 attempts have been recorded.
    pub fn is_learnable(&self) -> bool {
        self.success_count + self.failure_count >= 3
    }
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct ActionResult {
    pub success: bool,
    pub approach_used: Option<Approach>,
    pub confidence: f64,
    pub execution_time_secs: f64,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub result_data: HashMap<String, String>,
    pub error_message: Option<String>,
    pub recommendation: Option<String>,
}

impl ActionResult {
    pub fn failure(approach: Option<Approach>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            approach_used: approach,
            confidence: 0.0,
            execution_time_secs: 0.0,
            result_data: HashMap::new(),
            error_message: Some(message.into()),
            recommendation: None,
        }
    }
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum ErrorCategory {
    Network,
    PageLoad,
    ElementNotFound,
    InteractionFailed,
    PermissionDenied,
    Browser,
    Timeout,
    Configuration,
    Unknown,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct ErrorContext {
    pub category: ErrorCategory,
    pub message: String,
    pub approach_used: Option<Approach>,
    pub retryable: bool,
    pub fallback_recommended: bool,
    pub confidence_impact: f64,
    #[cfg_attr(feature = "serde-full", serde(default))]
    pub metadata: HashMap<String, String>,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde-full", serde(rename_all = "snake_case"))]
pub enum RecoveryAction {
    RetrySame,
    TryDifferent,
    ModifyTask,
    ShowBrowser,
    Manual,
    Abort,
}

#[cfg_attr(feature = "serde-full", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct RecoveryOption {
    pub action: RecoveryAction,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub requires_input: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_buckets_on_either_threshold() {
        assert_eq!(PageComplexity::bucket(3, 0), PageComplexity::Simple);
        assert_eq!(PageComplexity::bucket(9, 0), PageComplexity::Moderate);
        assert_eq!(PageComplexity::bucket(3, 1), PageComplexity::Moderate);
        assert_eq!(PageComplexity::bucket(21, 0), PageComplexity::Complex);
        assert_eq!(PageComplexity::bucket(3, 3), PageComplexity::Complex);
    }

    #[test]
    fn failure_result_has_zero_confidence_and_no_data() {
        let result = ActionResult::failure(Some(Approach::Dom), "element not found");
        assert!(!result.success);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.error_message.as_deref(), Some("element not found"));
        assert!(result.result_data.is_empty());
    }
}
