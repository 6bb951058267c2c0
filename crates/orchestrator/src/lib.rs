//! Orchestrator (C11): composes the Browser/DOM Analyzer (C1/C2), Routing
//! Decider (C9), the three approach executors (C3/C5/C6) each wrapped in
//! the Retry Engine (C8), and Interactive Recovery (C10) into the
//! end-to-end automation pipeline described in spec.md §4.11.
//!
//! Each approach is a value implementing the single `ApproachExecutor`
//! contract (spec.md §9's "dynamic polymorphism -> tagged variant +
//! interface"); the Orchestrator dispatches by `Approach` tag and never
//! depends on the concrete DOM/AI-Assist/Vision crates directly — those are
//! composed in by constructor injection, the same way `browser-manager`
//! takes a `BrowserDriver` rather than owning one.

use async_trait::async_trait;
use dom_analyzer::PageInspector;
use interactive_recovery::{RecoveryOutcome, UserCallback};
use parking_lot::Mutex;
use retry_engine::{RetryConfig, RetryHistory};
use routing_decider::{HistoricalStats, RoutingInput};
use soulbrowser_core_types::{
    Approach, ActionRequest, ActionResult, ActionType, DecisionContext, ErrorCategory,
    PageComplexity,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

const HISTORY_CAPACITY: usize = 100;

/// Contract satisfied by each approach (DOM, AI-Assist, Vision). All three
/// concrete approaches share this single shape so the Orchestrator can
/// dispatch by `Approach` tag without knowing which one it's calling.
#[async_trait]
pub trait ApproachExecutor: Send + Sync {
    async fn execute(&self, request: &ActionRequest, show_browser: bool) -> ActionResult;
    /// Three-state-style availability check; approaches that are always
    /// available (e.g. DOM) simply return `true`.
    fn is_enabled(&self) -> bool {
        true
    }
}

pub struct ApproachExecutors {
    pub dom: Arc<dyn ApproachExecutor>,
    pub ai_assist: Arc<dyn ApproachExecutor>,
    pub vision: Arc<dyn ApproachExecutor>,
}

impl ApproachExecutors {
    fn get(&self, approach: Approach) -> &Arc<dyn ApproachExecutor> {
        match approach {
            Approach::Dom => &self.dom,
            Approach::AiAssist => &self.ai_assist,
            Approach::Vision => &self.vision,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub enable_dom_analysis: bool,
    pub enable_ai_assist: bool,
    pub enable_vision: bool,
    pub interactive_recovery_enabled: bool,
    pub retry: RetryConfig,
    /// Minimum self-reported confidence an AI-Assist result must clear to be
    /// accepted as a success (spec.md §6's `ai_confidence_threshold`).
    pub ai_confidence_threshold: f64,
    /// Same gate for Vision (spec.md §6's `vision_confidence_threshold`).
    pub vision_confidence_threshold: f64,
    /// Request-scoped deadline per spec.md §5 ("Cancellation is propagated
    /// by a request-scoped deadline"). Bounds the whole `execute()` call,
    /// independent of the Retry Engine's per-attempt timeout.
    pub total_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enable_dom_analysis: true,
            enable_ai_assist: true,
            enable_vision: true,
            interactive_recovery_enabled: true,
            retry: RetryConfig::default(),
            ai_confidence_threshold: 0.7,
            vision_confidence_threshold: 0.5,
            total_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionRecord {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub url: String,
    pub task_description: String,
    pub action_type: ActionType,
    pub approach: Option<Approach>,
    pub success: bool,
    pub confidence: f64,
    pub execution_time_secs: f64,
    pub reasoning: String,
    pub error: Option<String>,
    pub recovery: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ApproachUsage {
    pub attempts: u64,
    pub successes: u64,
}

impl ApproachUsage {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AnalyticsSnapshot {
    pub total_executions: usize,
    pub approach_usage: HashMap<Approach, ApproachUsage>,
    pub recovery_by_action_type: HashMap<ActionType, u64>,
    pub error_category_distribution: HashMap<ErrorCategory, u64>,
}

struct HistoryBuffer {
    records: VecDeque<ExecutionRecord>,
}

impl HistoryBuffer {
    fn new() -> Self {
        Self { records: VecDeque::with_capacity(HISTORY_CAPACITY) }
    }

    fn push(&mut self, record: ExecutionRecord) {
        if self.records.len() >= HISTORY_CAPACITY {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }
}

pub struct Orchestrator {
    dom_inspector: Arc<dyn PageInspector>,
    approaches: ApproachExecutors,
    config: Mutex<OrchestratorConfig>,
    history: Mutex<HistoryBuffer>,
    routing_history: Mutex<HistoricalStats>,
    retry_history: RetryHistory,
    user_callback: Mutex<Option<Arc<dyn UserCallback>>>,
}

impl Orchestrator {
    pub fn new(
        dom_inspector: Arc<dyn PageInspector>,
        approaches: ApproachExecutors,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            dom_inspector,
            approaches,
            config: Mutex::new(config),
            history: Mutex::new(HistoryBuffer::new()),
            routing_history: Mutex::new(HistoricalStats::default()),
            retry_history: RetryHistory::new(),
            user_callback: Mutex::new(None),
        }
    }

    pub fn set_user_callback(&self, callback: Arc<dyn UserCallback>) {
        *self.user_callback.lock() = Some(callback);
    }

    pub fn enable_interactive_mode(&self, enabled: bool) {
        self.config.lock().interactive_recovery_enabled = enabled;
    }

    pub fn clear_history(&self) {
        self.history.lock().records.clear();
    }

    /// Forces `approach`, bypassing the Routing Decider (C9) entirely.
    pub async fn execute_with_approach(&self, approach: Approach, request: &ActionRequest) -> ActionResult {
        let mut forced = request.clone();
        forced.force_approach = Some(approach);
        self.execute(&forced).await
    }

    /// End-to-end flow per spec.md §4.11, bounded by the request-scoped
    /// deadline from spec.md §5. A suspension anywhere in the chain (DOM
    /// analysis, an approach executor, a retry delay, a user-callback await)
    /// that overruns `total_timeout` aborts the whole request rather than
    /// leaving it to the per-attempt timeouts alone.
    pub async fn execute(&self, request: &ActionRequest) -> ActionResult {
        let start = Instant::now();
        let total_timeout = self.config.lock().total_timeout;

        match tokio::time::timeout(total_timeout, self.execute_inner(request, start)).await {
            Ok(result) => result,
            Err(_) => {
                let mut result = ActionResult::failure(
                    None,
                    format!("total timeout of {:.0}s exceeded", total_timeout.as_secs_f64()),
                );
                result.execution_time_secs = start.elapsed().as_secs_f64();
                self.record(request, &result, None, "total timeout exceeded".to_string(), None, start);
                result
            }
        }
    }

    async fn execute_inner(&self, request: &ActionRequest, start: Instant) -> ActionResult {
        let analysis = match dom_analyzer::analyze_page(self.dom_inspector.as_ref(), &request.url).await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(target: "orchestrator", url = %request.url, error = %e, "dom analysis failed");
                let result = ActionResult::failure(None, format!("dom analysis failed: {e}"));
                self.record(request, &result, None, "dom analysis failed".to_string(), None, start);
                return result;
            }
        };

        let decision_context = DecisionContext {
            dom_confidence: analysis.analysis_confidence,
            page_complexity: PageComplexity::bucket(
                analysis.interactive_elements.len(),
                analysis.forms.len(),
            ),
            element_count: analysis.interactive_elements.len(),
            forms_count: analysis.forms.len(),
            previous_failures: Vec::new(),
            user_preference: request.user_preference,
        };

        let (mut result, mut approach, mut reasoning) = self
            .route_and_run(request, &decision_context, Vec::new())
            .await;

        let mut recovery_note = None;
        if !result.success && self.config.lock().interactive_recovery_enabled {
            let (recovered, recovered_approach, recovered_reasoning, note) = self
                .recover(request, &decision_context, result.clone(), approach)
                .await;
            result = recovered;
            approach = recovered_approach;
            reasoning = recovered_reasoning;
            recovery_note = note;
        }

        result.execution_time_secs = start.elapsed().as_secs_f64();
        self.record(request, &result, approach, reasoning, recovery_note, start);
        result
    }

    /// Runs the Routing Decider (C9) (unless `force_approach` is set) then
    /// executes the chosen approach wrapped in the Retry Engine (C8).
    async fn route_and_run(
        &self,
        request: &ActionRequest,
        decision_context: &DecisionContext,
        previous_failures: Vec<Approach>,
    ) -> (ActionResult, Option<Approach>, String) {
        let approach = if let Some(forced) = request.force_approach {
            forced
        } else {
            let (enable_dom_analysis, enable_ai_assist, enable_vision) = {
                let config = self.config.lock();
                (config.enable_dom_analysis, config.enable_ai_assist, config.enable_vision)
            };
            let routing_input = RoutingInput {
                task_description: request.task_description.clone(),
                action_type: format!("{:?}", request.action_type).to_lowercase(),
                dom_confidence: decision_context.dom_confidence,
                confidence_threshold: request.confidence_threshold,
                page_complexity: decision_context.page_complexity,
                element_count: decision_context.element_count,
                forms_count: decision_context.forms_count,
                previous_failures: previous_failures.clone(),
                user_preference: decision_context.user_preference,
                dom_enabled: enable_dom_analysis,
                ai_assist_enabled: enable_ai_assist && self.approaches.ai_assist.is_enabled(),
                vision_enabled: enable_vision && self.approaches.vision.is_enabled(),
            };
            let decision = routing_decider::decide(&routing_input, &self.routing_history.lock());
            // The routing decider is a pure function of DOM confidence/task type; it has
            // no notion of "already tried". During recovery reroutes, force progress to
            // the next untried approach rather than handing the same failed one back.
            let (approach, reasoning) = if previous_failures.contains(&decision.approach) {
                match [Approach::Dom, Approach::AiAssist, Approach::Vision]
                    .into_iter()
                    .find(|a| !previous_failures.contains(a))
                {
                    Some(next) => (
                        next,
                        format!("{} overridden: {} already tried during recovery", decision.reasoning, decision.approach),
                    ),
                    None => (decision.approach, decision.reasoning),
                }
            } else {
                (decision.approach, decision.reasoning)
            };
            return self.run_approach(approach, request, reasoning, decision_context.dom_confidence).await;
        };

        self.run_approach(approach, request, "force_approach set".to_string(), decision_context.dom_confidence)
            .await
    }

    async fn run_approach(
        &self,
        approach: Approach,
        request: &ActionRequest,
        reasoning: String,
        dom_confidence: f64,
    ) -> (ActionResult, Option<Approach>, String) {
        let executor = self.approaches.get(approach).clone();
        let show_browser = request.show_browser;
        let request = request.clone();
        let retry_config = self.config.lock().retry.clone();

        let mut result = retry_engine::run(
            |_attempt| {
                let executor = executor.clone();
                let request = request.clone();
                async move { executor.execute(&request, show_browser).await }
            },
            &retry_config,
            &self.retry_history,
            HashMap::new(),
        )
        .await;

        result = self.apply_confidence_gate(approach, result);

        self.routing_history.lock().record(approach, dom_confidence, result.success);
        (result, Some(approach), reasoning)
    }

    /// Downgrades an otherwise-successful AI-Assist/Vision result to a
    /// failure when its self-reported confidence falls below the
    /// configured per-approach floor (spec.md §6's `ai_confidence_threshold`
    /// / `vision_confidence_threshold`). DOM already gates on
    /// `request.confidence_threshold` inside the DOM Action Executor (C3)
    /// itself, so it is left alone here.
    fn apply_confidence_gate(&self, approach: Approach, result: ActionResult) -> ActionResult {
        if !result.success {
            return result;
        }
        let floor = match approach {
            Approach::AiAssist => self.config.lock().ai_confidence_threshold,
            Approach::Vision => self.config.lock().vision_confidence_threshold,
            Approach::Dom => return result,
        };
        if result.confidence < floor {
            let mut downgraded = ActionResult::failure(
                Some(approach),
                format!(
                    "{approach} result confidence {:.2} below configured floor {:.2}",
                    result.confidence, floor
                ),
            );
            downgraded.confidence = result.confidence;
            downgraded.recommendation = Some("retry or fall back to a different approach".to_string());
            return downgraded;
        }
        result
    }

    /// Invokes Interactive Recovery (C10) and dispatches the chosen action
    /// per spec.md §4.10.
    async fn recover(
        &self,
        request: &ActionRequest,
        decision_context: &DecisionContext,
        failed_result: ActionResult,
        failed_approach: Option<Approach>,
    ) -> (ActionResult, Option<Approach>, String, Option<String>) {
        let mut tried = failed_approach.into_iter().collect::<Vec<_>>();
        let message = failed_result.error_message.clone().unwrap_or_else(|| "unknown error".to_string());
        let error = error_classifier::classify(&message, failed_approach, HashMap::new());

        let context = interactive_recovery::build_context(error, failed_result.clone(), tried.clone(), None);
        let callback = self.user_callback.lock().clone();
        let outcome = interactive_recovery::resolve(&context, callback.as_deref()).await;

        match outcome {
            RecoveryOutcome::RetrySameApproach => {
                let approach = tried.last().copied();
                if let Some(approach) = approach {
                    let (result, _, reasoning) = self
                        .run_approach(approach, request, "retry_same".to_string(), decision_context.dom_confidence)
                        .await;
                    (result, Some(approach), reasoning, Some("retry_same".to_string()))
                } else {
                    (failed_result, failed_approach, "no approach to retry".to_string(), Some("retry_same".to_string()))
                }
            }
            RecoveryOutcome::RerouteExcluding(excluded) => {
                tried = excluded;
                let mut last = failed_result;
                let mut last_approach = failed_approach;
                let mut last_reasoning = "recovery: try_different".to_string();
                loop {
                    let remaining_exists = [Approach::Dom, Approach::AiAssist, Approach::Vision]
                        .into_iter()
                        .any(|a| !tried.contains(&a));
                    if !remaining_exists {
                        break;
                    }
                    let (result, approach, reasoning) =
                        self.route_and_run(request, decision_context, tried.clone()).await;
                    let recovered_from = last_approach
                        .map(|a| format!("{a}"))
                        .unwrap_or_else(|| "dom_analysis".to_string());
                    last_reasoning = format!("Recovered from {recovered_from} failure: {reasoning}");
                    if result.success || approach.is_none() {
                        last = result;
                        last_approach = approach;
                        break;
                    }
                    if let Some(a) = approach {
                        tried.push(a);
                    }
                    last = result;
                    last_approach = approach;
                }
                let mut result = last;
                if result.success {
                    result.recommendation = Some(last_reasoning.clone());
                }
                (result, last_approach, last_reasoning, Some("try_different".to_string()))
            }
            RecoveryOutcome::TaskNeedsModification { additional_input } => {
                let mut result = ActionResult::failure(failed_approach, "task must be modified before retrying");
                result.result_data.insert(
                    "additional_input".to_string(),
                    additional_input.unwrap_or_default(),
                );
                (result, failed_approach, "recovery: modify_task".to_string(), Some("modify_task".to_string()))
            }
            RecoveryOutcome::RetryWithVisibleBrowser => {
                let approach = failed_approach.unwrap_or(Approach::Dom);
                let mut visible_request = request.clone();
                visible_request.show_browser = true;
                let (result, _, reasoning) = self
                    .run_approach(
                        approach,
                        &visible_request,
                        "recovery: show_browser".to_string(),
                        decision_context.dom_confidence,
                    )
                    .await;
                (result, Some(approach), reasoning, Some("show_browser".to_string()))
            }
            RecoveryOutcome::ManualSuccess => {
                let mut result_data = HashMap::new();
                result_data.insert("manual".to_string(), "true".to_string());
                let result = ActionResult {
                    success: true,
                    approach_used: failed_approach,
                    confidence: 1.0,
                    execution_time_secs: 0.0,
                    result_data,
                    error_message: None,
                    recommendation: None,
                };
                (result, failed_approach, "recovery: manual".to_string(), Some("manual".to_string()))
            }
            RecoveryOutcome::Aborted => {
                let mut result = ActionResult::failure(failed_approach, "aborted by recovery policy");
                result.result_data.insert("aborted".to_string(), "true".to_string());
                (result, failed_approach, "recovery: abort".to_string(), Some("abort".to_string()))
            }
        }
    }

    fn record(
        &self,
        request: &ActionRequest,
        result: &ActionResult,
        approach: Option<Approach>,
        reasoning: String,
        recovery: Option<String>,
        start: Instant,
    ) {
        let record = ExecutionRecord {
            timestamp: chrono::Utc::now(),
            url: request.url.clone(),
            task_description: request.task_description.clone(),
            action_type: request.action_type,
            approach,
            success: result.success,
            confidence: result.confidence,
            execution_time_secs: start.elapsed().as_secs_f64(),
            reasoning,
            error: result.error_message.clone(),
            recovery,
        };
        self.history.lock().push(record);
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        let history = self.history.lock();
        let mut snapshot = AnalyticsSnapshot {
            total_executions: history.records.len(),
            ..Default::default()
        };

        for record in history.records.iter() {
            if let Some(approach) = record.approach {
                let usage = snapshot.approach_usage.entry(approach).or_default();
                usage.attempts += 1;
                if record.success {
                    usage.successes += 1;
                }
            }
            if record.recovery.is_some() {
                *snapshot.recovery_by_action_type.entry(record.action_type).or_insert(0) += 1;
            }
            if let Some(message) = &record.error {
                let category = error_classifier::classify(message, record.approach, HashMap::new()).category;
                *snapshot.error_category_distribution.entry(category).or_insert(0) += 1;
            }
        }

        snapshot
    }

    pub fn history_snapshot(&self) -> Vec<ExecutionRecord> {
        self.history.lock().records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_analyzer::RawCandidate;
    use interactive_recovery::RecoveryContext;
    use soulbrowser_core_types::{FormInfo, RecoveryAction};
    use std::collections::VecDeque;

    fn candidate(tag: &str, text: &str, attrs: &[(&str, &str)]) -> RawCandidate {
        RawCandidate {
            tag: tag.to_string(),
            text: text.to_string(),
            attributes: attrs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            xpath: format!("//{tag}"),
            selector: format!("#{text}"),
        }
    }

    struct EmptyInspector;

    #[async_trait]
    impl PageInspector for EmptyInspector {
        async fn title(&self) -> Result<String, dom_analyzer::DomAnalyzerError> {
            Ok(String::new())
        }
        async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn forms(&self) -> Result<Vec<FormInfo>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn content_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
    }

    /// 12 fully-scored interactive elements, one form, five nav links: scores
    /// `analysis_confidence` to 1.0, so every test using it exercises the
    /// `dc >= 0.8` "always prefer DOM" rule deterministically.
    struct HighConfidenceInspector;

    #[async_trait]
    impl PageInspector for HighConfidenceInspector {
        async fn title(&self) -> Result<String, dom_analyzer::DomAnalyzerError> {
            Ok("Example".to_string())
        }
        async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok((0..12)
                .map(|i| candidate("button", &format!("Action{i}"), &[("id", "x"), ("aria-label", "y")]))
                .collect())
        }
        async fn forms(&self) -> Result<Vec<FormInfo>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![FormInfo { method: "POST".into(), action: "/submit".into(), fields: vec!["a".into()] }])
        }
        async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok((0..5).map(|i| candidate("a", &format!("Nav{i}"), &[("id", "n")])).collect())
        }
        async fn content_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
    }

    struct FailingInspector;

    #[async_trait]
    impl PageInspector for FailingInspector {
        async fn title(&self) -> Result<String, dom_analyzer::DomAnalyzerError> {
            Err(dom_analyzer::DomAnalyzerError::Inspector("boom".to_string()))
        }
        async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn forms(&self) -> Result<Vec<FormInfo>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
        async fn content_candidates(&self) -> Result<Vec<RawCandidate>, dom_analyzer::DomAnalyzerError> {
            Ok(vec![])
        }
    }

    /// Reports a fixed, pre-scripted outcome sequence, falling back to
    /// failure once exhausted.
    struct ScriptedApproach {
        tag: Approach,
        outcomes: Mutex<VecDeque<bool>>,
    }

    impl ScriptedApproach {
        fn new(tag: Approach, outcomes: Vec<bool>) -> Self {
            Self { tag, outcomes: Mutex::new(outcomes.into()) }
        }
    }

    #[async_trait]
    impl ApproachExecutor for ScriptedApproach {
        async fn execute(&self, _request: &ActionRequest, _show_browser: bool) -> ActionResult {
            let success = self.outcomes.lock().pop_front().unwrap_or(false);
            if success {
                ActionResult {
                    success: true,
                    approach_used: Some(self.tag),
                    confidence: 0.9,
                    execution_time_secs: 0.0,
                    result_data: HashMap::new(),
                    error_message: None,
                    recommendation: None,
                }
            } else {
                ActionResult::failure(Some(self.tag), "element not found: scripted failure")
            }
        }
    }

    struct AlwaysAbort;

    #[async_trait]
    impl UserCallback for AlwaysAbort {
        async fn choose(&self, _context: &RecoveryContext) -> Option<(RecoveryAction, Option<String>)> {
            Some((RecoveryAction::Abort, None))
        }
    }

    fn zero_retry_config() -> OrchestratorConfig {
        OrchestratorConfig {
            retry: RetryConfig { max_retries: 0, ..RetryConfig::default() },
            ..OrchestratorConfig::default()
        }
    }

    fn sample_request() -> ActionRequest {
        ActionRequest {
            url: "https://example.com".to_string(),
            task_description: "do the thing".to_string(),
            action_type: ActionType::Automation,
            target_description: "widget".to_string(),
            action_data: HashMap::new(),
            confidence_threshold: 0.7,
            show_browser: false,
            force_approach: None,
            user_preference: None,
        }
    }

    fn all_approaches_scripted(
        dom: Vec<bool>,
        ai_assist: Vec<bool>,
        vision: Vec<bool>,
    ) -> ApproachExecutors {
        ApproachExecutors {
            dom: Arc::new(ScriptedApproach::new(Approach::Dom, dom)),
            ai_assist: Arc::new(ScriptedApproach::new(Approach::AiAssist, ai_assist)),
            vision: Arc::new(ScriptedApproach::new(Approach::Vision, vision)),
        }
    }

    #[tokio::test]
    async fn high_confidence_page_routes_to_dom_and_succeeds() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![true], vec![true], vec![true]),
            zero_retry_config(),
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(result.success);
        assert_eq!(result.approach_used, Some(Approach::Dom));
        assert_eq!(orchestrator.history_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn dom_analysis_failure_short_circuits_before_routing() {
        let orchestrator = Orchestrator::new(
            Arc::new(FailingInspector),
            all_approaches_scripted(vec![true], vec![true], vec![true]),
            zero_retry_config(),
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("dom analysis failed"));
        let history = orchestrator.history_snapshot();
        assert_eq!(history.len(), 1);
        assert!(history[0].approach.is_none());
    }

    #[tokio::test]
    async fn recovery_reroutes_to_the_next_untried_approach_on_failure() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![false], vec![true], vec![true]),
            zero_retry_config(),
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(result.success);
        assert_eq!(result.approach_used, Some(Approach::AiAssist));
        let history = orchestrator.history_snapshot();
        assert_eq!(history[0].recovery.as_deref(), Some("try_different"));
    }

    #[tokio::test]
    async fn recovery_exhausts_every_approach_and_reports_the_final_failure() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![false], vec![false], vec![false]),
            zero_retry_config(),
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(!result.success);
        // all three approaches were exhausted, the last one tried was Vision
        assert_eq!(result.approach_used, Some(Approach::Vision));
    }

    #[tokio::test]
    async fn recovery_honors_a_callback_that_chooses_to_abort() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![false], vec![true], vec![true]),
            zero_retry_config(),
        );
        orchestrator.set_user_callback(Arc::new(AlwaysAbort));
        let result = orchestrator.execute(&sample_request()).await;
        assert!(!result.success);
        assert_eq!(result.result_data.get("aborted").map(String::as_str), Some("true"));
    }

    #[tokio::test]
    async fn execute_with_approach_bypasses_routing() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![true], vec![true], vec![true]),
            zero_retry_config(),
        );
        // dc=1.0 would normally force Dom; force_approach must override that.
        let result = orchestrator.execute_with_approach(Approach::Vision, &sample_request()).await;
        assert!(result.success);
        assert_eq!(result.approach_used, Some(Approach::Vision));
    }

    #[tokio::test]
    async fn analytics_aggregates_approach_usage_and_error_categories() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![true, false], vec![true], vec![true]),
            OrchestratorConfig { interactive_recovery_enabled: false, ..zero_retry_config() },
        );
        orchestrator.execute(&sample_request()).await;
        orchestrator.execute(&sample_request()).await;

        let snapshot = orchestrator.analytics();
        assert_eq!(snapshot.total_executions, 2);
        let dom_usage = snapshot.approach_usage.get(&Approach::Dom).unwrap();
        assert_eq!(dom_usage.attempts, 2);
        assert_eq!(dom_usage.successes, 1);
        assert!(!snapshot.error_category_distribution.is_empty());
    }

    #[tokio::test]
    async fn clear_history_empties_the_buffer() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![true], vec![true], vec![true]),
            zero_retry_config(),
        );
        orchestrator.execute(&sample_request()).await;
        assert_eq!(orchestrator.history_snapshot().len(), 1);
        orchestrator.clear_history();
        assert!(orchestrator.history_snapshot().is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded_at_capacity() {
        let total_runs = HISTORY_CAPACITY + 5;
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            all_approaches_scripted(vec![true; total_runs], vec![true], vec![true]),
            zero_retry_config(),
        );
        for _ in 0..total_runs {
            orchestrator.execute(&sample_request()).await;
        }
        assert_eq!(orchestrator.history_snapshot().len(), HISTORY_CAPACITY);
    }

    #[tokio::test]
    async fn low_confidence_empty_page_routes_away_from_dom() {
        let orchestrator = Orchestrator::new(
            Arc::new(EmptyInspector),
            all_approaches_scripted(vec![true], vec![true], vec![true]),
            zero_retry_config(),
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(result.success);
        assert_ne!(result.approach_used, Some(Approach::Dom));
    }

    struct SlowApproach {
        tag: Approach,
        delay: Duration,
    }

    #[async_trait]
    impl ApproachExecutor for SlowApproach {
        async fn execute(&self, _request: &ActionRequest, _show_browser: bool) -> ActionResult {
            tokio::time::sleep(self.delay).await;
            ActionResult {
                success: true,
                approach_used: Some(self.tag),
                confidence: 0.9,
                execution_time_secs: 0.0,
                result_data: HashMap::new(),
                error_message: None,
                recommendation: None,
            }
        }
    }

    #[tokio::test]
    async fn request_scoped_deadline_aborts_a_request_that_runs_too_long() {
        let orchestrator = Orchestrator::new(
            Arc::new(HighConfidenceInspector),
            ApproachExecutors {
                dom: Arc::new(SlowApproach { tag: Approach::Dom, delay: Duration::from_millis(50) }),
                ai_assist: Arc::new(ScriptedApproach::new(Approach::AiAssist, vec![true])),
                vision: Arc::new(ScriptedApproach::new(Approach::Vision, vec![true])),
            },
            OrchestratorConfig { total_timeout: Duration::from_millis(5), ..zero_retry_config() },
        );
        let result = orchestrator.execute(&sample_request()).await;
        assert!(!result.success);
        assert!(result.error_message.unwrap().contains("total timeout"));
        assert_eq!(orchestrator.history_snapshot().len(), 1);
    }
}
