//! Routing Decider (C9): chooses an Approach from DOM analysis, task-type
//! keyword heuristics, and historical success rates.
//!
//! The keyword-dispatch idiom (ordered lowercase-substring chains) follows
//! `agent-core::planner::rule_based`, generalized from that module's
//! domain-specific intent recipes to the five task types spec.md names.

use soulbrowser_core_types::{Approach, PageComplexity};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskType {
    SimpleInteraction,
    FormInteraction,
    ComplexNavigation,
    ContentExtraction,
    General,
}

static SIMPLE_ACTIONS: &[&str] = &["click", "press", "select"];
static FORM_KEYWORDS: &[&str] = &["form", "submit", "login", "signup", "register", "fill"];
static NAV_KEYWORDS: &[&str] = &[
    "navigate", "multi-step", "workflow", "checkout", "wizard", "spa", "dashboard",
];
static EXTRACT_KEYWORDS: &[&str] = &["extract", "scrape", "read", "list", "collect", "find all"];

/// Classifies task intent from free-form text plus the request's action
/// type, in the same priority order spec.md §4.9 lists them.
pub fn infer_task_type(task_description: &str, action_type: &str) -> TaskType {
    let task_lower = task_description.to_lowercase();
    let action_lower = action_type.to_lowercase();

    if FORM_KEYWORDS.iter().any(|k| task_lower.contains(k)) {
        return TaskType::FormInteraction;
    }
    if NAV_KEYWORDS.iter().any(|k| task_lower.contains(k)) {
        return TaskType::ComplexNavigation;
    }
    if action_lower == "extract" || EXTRACT_KEYWORDS.iter().any(|k| task_lower.contains(k)) {
        return TaskType::ContentExtraction;
    }
    if SIMPLE_ACTIONS.contains(&action_lower.as_str()) {
        return TaskType::SimpleInteraction;
    }
    TaskType::General
}

static EDGE_KEYWORDS: &[&str] = &[
    "dynamic", "javascript", "ajax", "react", "vue", "angular", "spa", "interactive", "animated",
    "popup", "modal", "dropdown", "autocomplete", "drag", "drop", "canvas", "svg", "iframe",
    "shadow", "complex", "multi-step",
];

#[derive(Clone, Debug)]
pub struct RoutingInput {
    pub task_description: String,
    pub action_type: String,
    pub dom_confidence: f64,
    pub confidence_threshold: f64,
    pub page_complexity: PageComplexity,
    pub element_count: usize,
    pub forms_count: usize,
    pub previous_failures: Vec<Approach>,
    pub user_preference: Option<Approach>,
    /// Mirrors `ai_assist_enabled`/`vision_enabled`: when false, DOM is
    /// never the chosen approach even if every other rule would pick it
    /// (spec.md §6's `enable_dom_analysis` config flag).
    pub dom_enabled: bool,
    pub ai_assist_enabled: bool,
    pub vision_enabled: bool,
}

#[derive(Clone, Debug, Default)]
pub struct HistoricalStats {
    /// (approach, confidence band in tenths) -> (successes, attempts)
    bands: HashMap<(Approach, u8), (u32, u32)>,
    total_executions: u32,
}

impl HistoricalStats {
    pub fn record(&mut self, approach: Approach, dom_confidence: f64, success: bool) {
        self.total_executions += 1;
        let band = Self::band(dom_confidence);
        let entry = self.bands.entry((approach, band)).or_insert((0, 0));
        entry.1 += 1;
        if success {
            entry.0 += 1;
        }
    }

    fn band(confidence: f64) -> u8 {
        ((confidence.clamp(0.0, 1.0)) * 10.0).floor() as u8
    }

    /// Success rate at `confidence`'s band, `None` unless history has at
    /// least 10 total executions and this band has at least 3 attempts.
    fn success_rate(&self, approach: Approach, confidence: f64) -> Option<f64> {
        if self.total_executions < 10 {
            return None;
        }
        let (successes, attempts) = *self.bands.get(&(approach, Self::band(confidence)))?;
        if attempts < 3 {
            return None;
        }
        Some(successes as f64 / attempts as f64)
    }
}

#[derive(Clone, Debug)]
pub struct RoutingDecision {
    pub approach: Approach,
    pub reasoning: String,
}

pub fn decide(input: &RoutingInput, history: &HistoricalStats) -> RoutingDecision {
    if let Some(preferred) = input.user_preference {
        return RoutingDecision {
            approach: preferred,
            reasoning: "user_preference set".to_string(),
        };
    }

    let dc = input.dom_confidence;
    let threshold = input.confidence_threshold;

    let mut approach = if dc >= threshold {
        Approach::Dom
    } else if input.forms_count > 0 && dc >= 0.7 * threshold {
        Approach::Dom
    } else if input.page_complexity == PageComplexity::Complex && dc >= 0.35 {
        Approach::AiAssist
    } else if dc < 0.3 {
        Approach::Vision
    } else {
        Approach::AiAssist
    };
    let mut reasoning = format!("base rule selected {approach}");

    let task_type = infer_task_type(&input.task_description, &input.action_type);
    match task_type {
        TaskType::SimpleInteraction if dc >= 0.5 => {
            approach = Approach::Dom;
            reasoning = "simple_interaction with sufficient confidence".to_string();
        }
        TaskType::FormInteraction if dc >= 0.6 => {
            approach = Approach::Dom;
            reasoning = "form_interaction with sufficient confidence".to_string();
        }
        TaskType::FormInteraction if (0.3..0.6).contains(&dc) && input.ai_assist_enabled => {
            approach = Approach::AiAssist;
            reasoning = "form_interaction with moderate confidence".to_string();
        }
        TaskType::ComplexNavigation if input.ai_assist_enabled && dc >= 0.4 => {
            approach = Approach::AiAssist;
            reasoning = "complex_navigation delegated to AI-Assist".to_string();
        }
        TaskType::ComplexNavigation if input.vision_enabled => {
            approach = Approach::Vision;
            reasoning = "complex_navigation delegated to Vision".to_string();
        }
        TaskType::ContentExtraction if dc >= 0.5 => {
            approach = Approach::Dom;
            reasoning = "content_extraction with sufficient confidence".to_string();
        }
        _ => {}
    }

    for candidate in [Approach::Dom, Approach::AiAssist, Approach::Vision] {
        if let Some(rate) = history.success_rate(candidate, dc) {
            if rate > 0.8 {
                approach = candidate;
                reasoning =
                    format!("Historical {candidate} success rate {rate:.2} at this confidence band");
                break;
            }
        }
    }

    if approach == Approach::Vision {
        let score = edge_case_score(input, task_type);
        if score < 0.5 {
            approach = if input.ai_assist_enabled {
                Approach::AiAssist
            } else {
                Approach::Dom
            };
            reasoning = format!("vision cost optimization downgraded to {approach} (edge score {score:.2})");
        }
    }

    if dc >= 0.8 {
        approach = Approach::Dom;
        reasoning = "dom_confidence >= 0.8 always prefers DOM".to_string();
    }

    if approach == Approach::Dom && !input.dom_enabled {
        approach = if input.ai_assist_enabled {
            Approach::AiAssist
        } else if input.vision_enabled {
            Approach::Vision
        } else {
            Approach::Dom
        };
        reasoning = format!("dom_analysis disabled, rerouted to {approach}");
    }

    tracing::debug!(target: "routing", %approach, dom_confidence = dc, %reasoning, "approach decided");
    RoutingDecision { approach, reasoning }
}

/// Edge-case score ∈ [0,1] used to decide whether Vision is worth its cost.
pub fn edge_case_score(input: &RoutingInput, task_type: TaskType) -> f64 {
    let mut score = match input.page_complexity {
        PageComplexity::Simple => 0.1,
        PageComplexity::Moderate => 0.2,
        PageComplexity::Complex => 0.3,
    };

    score += if input.dom_confidence < 0.2 {
        0.3
    } else if input.dom_confidence < 0.4 {
        0.2
    } else {
        0.1
    };

    score += match task_type {
        TaskType::ComplexNavigation => 0.3,
        TaskType::FormInteraction | TaskType::ContentExtraction => 0.2,
        _ => 0.1,
    };

    if input.element_count > 20 {
        score += 0.1;
    } else if input.element_count > 10 {
        score += 0.05;
    }

    let distinct_failures: std::collections::HashSet<_> = input.previous_failures.iter().collect();
    if distinct_failures.len() >= 2 {
        score += 0.2;
    } else if distinct_failures.len() == 1 {
        score += 0.1;
    }

    let task_lower = input.task_description.to_lowercase();
    let keyword_hits = EDGE_KEYWORDS.iter().filter(|k| task_lower.contains(*k)).count();
    score += (keyword_hits as f64 * 0.05).min(0.15);

    score.min(1.0)
}
