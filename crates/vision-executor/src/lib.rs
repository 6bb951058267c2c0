//! Vision Executor (C6): wraps an external autonomous visual browsing agent
//! and parses its free-form textual report into an `ActionResult`.
//!
//! The report grammar is intentionally a small ordered set of
//! substring/prefix rules per spec.md §4.6 — spec.md's own open question
//! notes the grammar is loose, so this implementation does not attempt to
//! generalize past the stated tokens.

use async_trait::async_trait;
use soulbrowser_core_types::{ActionResult, Approach};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VisionExecutorError {
    #[error("vision agent error: {0}")]
    Agent(String),
}

/// Contract satisfied by the external autonomous visual browsing agent per
/// spec.md §6: `browse_and_find(task, url, max_steps, headless) ->
/// free-form text report`.
#[async_trait]
pub trait VisionAgent: Send + Sync {
    async fn browse_and_find(
        &self,
        task: &str,
        url: &str,
        max_steps: u32,
        headless: bool,
    ) -> Result<String, VisionExecutorError>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Configured {
    Yes,
    No,
}

/// Parses the agent's free-form report per spec.md §4.6's ordered rules,
/// first match wins.
pub fn parse_report(report: &str) -> ActionResult {
    let mut result_data = HashMap::new();

    if report.contains("requires vision capabilities") {
        result_data.insert("bedrock_mode".to_string(), "true".to_string());
        return ActionResult {
            success: false,
            approach_used: Some(Approach::Vision),
            confidence: 0.0,
            execution_time_secs: 0.0,
            result_data,
            error_message: Some("requires vision capabilities".to_string()),
            recommendation: Some("enable a vision-capable model before retrying".to_string()),
        };
    }

    if report.contains('✅') || report.contains("Task Completed Successfully") {
        return ActionResult {
            success: true,
            approach_used: Some(Approach::Vision),
            confidence: 0.8,
            execution_time_secs: 0.0,
            result_data,
            error_message: None,
            recommendation: None,
        };
    }

    if report.contains('⚠') || report.contains("Partially Completed") {
        result_data.insert("partial_success".to_string(), "true".to_string());
        return ActionResult {
            success: false,
            approach_used: Some(Approach::Vision),
            confidence: 0.4,
            execution_time_secs: 0.0,
            result_data,
            error_message: Some("partially completed".to_string()),
            recommendation: Some("review the partial result and retry the remaining steps".to_string()),
        };
    }

    if report.contains('❌') || report.contains("Task Failed") {
        let issue = report
            .lines()
            .find(|line| line.trim_start().starts_with("Issue:"))
            .map(|line| line.trim_start().trim_start_matches("Issue:").trim().to_string());
        return ActionResult {
            success: false,
            approach_used: Some(Approach::Vision),
            confidence: 0.1,
            execution_time_secs: 0.0,
            result_data,
            error_message: Some(issue.unwrap_or_else(|| "task failed".to_string())),
            recommendation: Some("try a different approach".to_string()),
        };
    }

    // Fallthrough: unrecognized grammar, treat conservatively as a failure.
    ActionResult {
        success: false,
        approach_used: Some(Approach::Vision),
        confidence: 0.2,
        execution_time_secs: 0.0,
        result_data,
        error_message: Some(format!("unrecognized vision agent report: {report}")),
        recommendation: Some("inspect the raw agent report".to_string()),
    }
}

/// Runs the vision agent for `task`/`url` and parses its report. If the
/// agent is not configured, every call fails with a clear recommendation
/// instead of invoking `agent`.
pub async fn execute(
    agent: &dyn VisionAgent,
    configured: Configured,
    task: &str,
    url: &str,
    max_steps: u32,
    headless: bool,
) -> ActionResult {
    if configured == Configured::No {
        let mut result = ActionResult::failure(
            Some(Approach::Vision),
            "autonomous vision agent is not configured",
        );
        result.recommendation = Some("configure the vision agent before use".to_string());
        return result;
    }

    match agent.browse_and_find(task, url, max_steps, headless).await {
        Ok(report) => {
            tracing::debug!(target: "vision_executor", %report, "parsed vision agent report");
            parse_report(&report)
        }
        Err(e) => ActionResult::failure(Some(Approach::Vision), e.to_string()),
    }
}
