//! Wires the orchestration crates (C1-C11) into one runnable `Orchestrator`.
//!
//! The Browser Driver, the AI-Assist execution backend, and the Vision
//! Agent are external collaborators per spec.md §6 — this module supplies
//! the narrowest possible stand-ins for them (a page inspector that reports
//! an empty, zero-confidence page; an actuator and vision agent that report
//! "not configured") so the binary links and the routing/retry/recovery
//! layers are exercisable end to end without a live browser. A deployment
//! wires a real `dom_analyzer::PageInspector` / `dom_action_executor::
//! ElementActuator` / `vision_executor::VisionAgent` in their place, backed
//! by a page obtained from a `browser_manager::BrowserManager` holding the
//! actual browser/context/page lifecycle.

use async_trait::async_trait;
use dom_analyzer::{DomAnalyzerError, PageInspector, RawCandidate};
use dom_action_executor::{DomActionError, ElementActuator};
use soulbrowser_core_types::{ActionRequest, ActionResult, ActionType, FormInfo};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use vision_executor::{Configured, VisionAgent, VisionExecutorError};

use crate::config::AppConfig;

/// Reports an empty page (no interactive elements, no forms) until a real
/// browser driver is wired in. `analysis_confidence` is therefore always 0,
/// which routes every request straight to Vision or AI-Assist per the
/// Routing Decider's base rules — a safe default absent a live DOM.
pub struct EmptyPageInspector;

#[async_trait]
impl PageInspector for EmptyPageInspector {
    async fn title(&self) -> Result<String, DomAnalyzerError> {
        Ok(String::new())
    }
    async fn interactive_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
        Ok(Vec::new())
    }
    async fn forms(&self) -> Result<Vec<FormInfo>, DomAnalyzerError> {
        Ok(Vec::new())
    }
    async fn navigation_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
        Ok(Vec::new())
    }
    async fn content_candidates(&self) -> Result<Vec<RawCandidate>, DomAnalyzerError> {
        Ok(Vec::new())
    }
}

pub struct NotConfiguredActuator;

#[async_trait]
impl ElementActuator for NotConfiguredActuator {
    async fn click(&self, _selector: &str) -> Result<(), DomActionError> {
        Err(DomActionError::Actuator("no browser driver configured".to_string()))
    }
    async fn fill(&self, _selector: &str, _text: &str) -> Result<(), DomActionError> {
        Err(DomActionError::Actuator("no browser driver configured".to_string()))
    }
    async fn select_option(&self, _selector: &str, _option: &str) -> Result<(), DomActionError> {
        Err(DomActionError::Actuator("no browser driver configured".to_string()))
    }
    async fn wait_quiescent(&self, _timeout: Duration) -> Result<(), DomActionError> {
        Ok(())
    }
}

pub struct NotConfiguredVisionAgent;

#[async_trait]
impl VisionAgent for NotConfiguredVisionAgent {
    async fn browse_and_find(
        &self,
        _task: &str,
        _url: &str,
        _max_steps: u32,
        _headless: bool,
    ) -> Result<String, VisionExecutorError> {
        Err(VisionExecutorError::Agent("no vision agent configured".to_string()))
    }
}

struct DomApproach {
    inspector: Arc<dyn PageInspector>,
    actuator: Arc<dyn ElementActuator>,
}

#[async_trait]
impl orchestrator::ApproachExecutor for DomApproach {
    async fn execute(&self, request: &ActionRequest, _show_browser: bool) -> ActionResult {
        dom_action_executor::execute(
            self.inspector.as_ref(),
            self.actuator.as_ref(),
            &request.url,
            request.action_type,
            &request.target_description,
            &request.action_data,
            request.confidence_threshold,
            Duration::from_secs(30),
        )
        .await
    }
}

struct AiAssistApproach {
    cache: Arc<pattern_cache::PatternCache>,
    executor: Arc<dyn ai_action_synth::ActionExecutor>,
    availability: ai_action_synth::Availability,
}

#[async_trait]
impl orchestrator::ApproachExecutor for AiAssistApproach {
    async fn execute(&self, request: &ActionRequest, _show_browser: bool) -> ActionResult {
        ai_action_synth::synthesize_and_execute(
            &self.cache,
            self.executor.as_ref(),
            self.availability,
            &request.task_description,
            request.action_type,
            &request.target_description,
            &request.action_data,
            Duration::from_secs(60),
        )
        .await
    }

    fn is_enabled(&self) -> bool {
        self.availability == ai_action_synth::Availability::Available
    }
}

struct VisionApproach {
    agent: Arc<dyn VisionAgent>,
    configured: Configured,
}

#[async_trait]
impl orchestrator::ApproachExecutor for VisionApproach {
    async fn execute(&self, request: &ActionRequest, show_browser: bool) -> ActionResult {
        vision_executor::execute(
            self.agent.as_ref(),
            self.configured,
            &request.task_description,
            &request.url,
            20,
            !show_browser,
        )
        .await
    }

    fn is_enabled(&self) -> bool {
        self.configured == Configured::Yes
    }
}

/// Builds an `Orchestrator` wired with the stand-ins above, configured
/// per `AppConfig`.
pub fn build_orchestrator(config: &AppConfig) -> orchestrator::Orchestrator {
    let inspector: Arc<dyn PageInspector> = Arc::new(EmptyPageInspector);
    let actuator: Arc<dyn ElementActuator> = Arc::new(NotConfiguredActuator);
    let vision_agent: Arc<dyn VisionAgent> = Arc::new(NotConfiguredVisionAgent);

    let approaches = orchestrator::ApproachExecutors {
        dom: Arc::new(DomApproach { inspector: inspector.clone(), actuator }),
        ai_assist: Arc::new(AiAssistApproach {
            cache: Arc::new(pattern_cache::PatternCache::new()),
            executor: Arc::new(ai_action_synth::StubActionExecutor),
            availability: ai_action_synth::Availability::NotConfigured,
        }),
        vision: Arc::new(VisionApproach { agent: vision_agent, configured: Configured::No }),
    };

    orchestrator::Orchestrator::new(inspector, approaches, config.to_orchestrator_config())
}

/// Builds an `ActionRequest` from CLI input, falling back to
/// `AppConfig::dom_confidence_threshold`/`preferred_approach` (spec.md §6)
/// when the caller doesn't override them on the command line.
pub fn build_request(
    config: &AppConfig,
    url: String,
    task_description: String,
    action_type: ActionType,
    target_description: String,
    action_data: HashMap<String, String>,
    confidence_threshold: Option<f64>,
    show_browser: bool,
    force_approach: Option<soulbrowser_core_types::Approach>,
) -> ActionRequest {
    ActionRequest {
        url,
        task_description,
        action_type,
        target_description,
        action_data,
        confidence_threshold: confidence_threshold.unwrap_or(config.dom_confidence_threshold),
        show_browser: show_browser || config.show_browser,
        force_approach,
        user_preference: config.preferred_approach(),
    }
}
