//! Prometheus metrics surface, spawned as a side-channel HTTP server the
//! same way the teacher crate's `metrics::spawn_metrics_server` does for its
//! own execution-step histograms.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{histogram_opts, Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();
static EXECUTION_LATENCY: OnceCell<HistogramVec> = OnceCell::new();
static APPROACH_OUTCOMES: OnceCell<IntCounterVec> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();

        let latency = HistogramVec::new(
            histogram_opts!(
                "soulbrowser_execution_seconds",
                "End-to-end ActionRequest execution time by approach and outcome",
                vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
            ),
            &["approach", "outcome"],
        )
        .expect("create execution latency histogram");
        if let Err(err) = registry.register(Box::new(latency.clone())) {
            error!(?err, "failed to register execution latency histogram");
        }
        let _ = EXECUTION_LATENCY.set(latency);

        let outcomes = IntCounterVec::new(
            Opts::new(
                "soulbrowser_approach_outcomes_total",
                "Terminal ActionResults by approach and success/failure",
            ),
            &["approach", "outcome"],
        )
        .expect("create approach outcomes counter");
        if let Err(err) = registry.register(Box::new(outcomes.clone())) {
            error!(?err, "failed to register approach outcome counter");
        }
        let _ = APPROACH_OUTCOMES.set(outcomes);
    });
}

/// Records one terminal `ActionResult` against the execution-latency
/// histogram and outcome counter.
pub fn observe_execution(approach: &str, success: bool, execution_time_secs: f64) {
    register_metrics();
    let outcome = if success { "success" } else { "failure" };
    if let Some(histogram) = EXECUTION_LATENCY.get() {
        histogram.with_label_values(&[approach, outcome]).observe(execution_time_secs);
    }
    if let Some(counter) = APPROACH_OUTCOMES.get() {
        counter.with_label_values(&[approach, outcome]).inc();
    }
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

/// Spawns the `/metrics` HTTP endpoint. `port == 0` disables it.
pub fn spawn_metrics_server(port: u16) -> Option<JoinHandle<()>> {
    if port == 0 {
        return None;
    }

    register_metrics();
    let registry = Arc::new(global_registry().clone());
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry);

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(%addr, "metrics server listening");
    Some(tokio::spawn(async move {
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app.into_make_service()).await {
                    error!(?err, "metrics server exited with error");
                }
            }
            Err(err) => error!(?err, "failed to bind metrics listener"),
        }
    }))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    match render_metrics() {
        Ok(body) => ([(axum::http::header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())], body)
            .into_response(),
        Err(err) => {
            error!(?err, "failed to render prometheus metrics");
            let _ = &registry;
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}

/// Renders the global registry in Prometheus text exposition format. Shared
/// by the standalone metrics server and the `/metrics` route on the
/// orchestrator's own HTTP surface.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    register_metrics();
    let encoder = TextEncoder::new();
    let metric_families = global_registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
