//! HTTP surface (spec.md §6.y, ambient): exposes the orchestrator over
//! `axum` for out-of-process callers, the same role the teacher crate's own
//! server module plays in front of its `action-flow` engine.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use soulbrowser_core_types::{ActionRequest, ActionType, Approach};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::AppConfig;
use crate::metrics;

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub url: String,
    pub task_description: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub target_description: String,
    #[serde(default)]
    pub action_data: HashMap<String, String>,
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub show_browser: bool,
    pub force_approach: Option<Approach>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<orchestrator::Orchestrator>,
    config: Arc<AppConfig>,
}

pub async fn serve(
    orchestrator: Arc<orchestrator::Orchestrator>,
    config: Arc<AppConfig>,
    port: u16,
) -> anyhow::Result<()> {
    let state = AppState { orchestrator, config };
    let app = Router::new()
        .route("/v1/execute", post(execute))
        .route("/v1/analytics", get(analytics))
        .route("/v1/history", get(history))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_route))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], port).into();
    tracing::info!(%addr, "http surface listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn execute(State(state): State<AppState>, Json(body): Json<ExecuteRequest>) -> Response {
    let request = ActionRequest {
        url: body.url,
        task_description: body.task_description,
        action_type: body.action_type,
        target_description: body.target_description,
        action_data: body.action_data,
        confidence_threshold: body
            .confidence_threshold
            .unwrap_or(state.config.dom_confidence_threshold),
        show_browser: body.show_browser || state.config.show_browser,
        force_approach: body.force_approach,
        user_preference: state.config.preferred_approach(),
    };
    let result = state.orchestrator.execute(&request).await;
    metrics::observe_execution(
        result.approach_used.map(|a| a.as_str()).unwrap_or("none"),
        result.success,
        result.execution_time_secs,
    );
    (StatusCode::OK, Json(result)).into_response()
}

async fn analytics(State(state): State<AppState>) -> Response {
    let snapshot = state.orchestrator.analytics();
    let body = serde_json::json!({
        "total_executions": snapshot.total_executions,
        "approach_usage": snapshot
            .approach_usage
            .into_iter()
            .map(|(approach, usage)| (approach.as_str().to_string(), serde_json::json!({
                "attempts": usage.attempts,
                "successes": usage.successes,
                "success_rate": usage.success_rate(),
            })))
            .collect::<HashMap<_, _>>(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

async fn history(State(state): State<AppState>) -> Response {
    let records: Vec<_> = state
        .orchestrator
        .history_snapshot()
        .into_iter()
        .map(|r| {
            serde_json::json!({
                "timestamp": r.timestamp.to_rfc3339(),
                "url": r.url,
                "task_description": r.task_description,
                "approach": r.approach.map(|a| a.as_str()),
                "success": r.success,
                "confidence": r.confidence,
                "execution_time_secs": r.execution_time_secs,
                "error": r.error,
                "recovery": r.recovery,
            })
        })
        .collect();
    (StatusCode::OK, Json(records)).into_response()
}

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_route() -> Response {
    match metrics::render_metrics() {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => {
            error!(?err, "failed to render metrics for http surface");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { error: err.to_string() })).into_response()
        }
    }
}
