//! CLI entrypoint: parses arguments, initializes logging and metrics, loads
//! configuration, and dispatches to the orchestrator / credential store /
//! session store / HTTP surface.

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::commands::{Cli, Command, CredentialsCommand, SessionsCommand};
use crate::errors::{AppError, AppResult};
use crate::{config as app_config, http, metrics, runtime};

pub async fn run() -> AppResult<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    let config = app_config::load(cli.config.as_ref())?;
    let _metrics_handle = metrics::spawn_metrics_server(config.metrics_port);

    match cli.command {
        Command::Run {
            url,
            task,
            action,
            target,
            data,
            confidence_threshold,
            show_browser,
            force_approach,
        } => {
            let orchestrator = runtime::build_orchestrator(&config);
            let request = runtime::build_request(
                &config,
                url,
                task,
                action.into(),
                target,
                super::commands::data_map(data),
                confidence_threshold,
                show_browser,
                force_approach.map(Into::into),
            );
            let result = orchestrator.execute(&request).await;
            metrics::observe_execution(
                result.approach_used.map(|a| a.as_str()).unwrap_or("none"),
                result.success,
                result.execution_time_secs,
            );
            println!("{}", serde_json::to_string_pretty(&SerializableResult::from(result))?);
        }
        Command::Analytics => {
            let orchestrator = runtime::build_orchestrator(&config);
            let snapshot = orchestrator.analytics();
            println!("executions recorded: {}", snapshot.total_executions);
            for (approach, usage) in snapshot.approach_usage {
                println!(
                    "  {approach}: {} attempts, {:.1}% success",
                    usage.attempts,
                    usage.success_rate() * 100.0
                );
            }
        }
        Command::History => {
            let orchestrator = runtime::build_orchestrator(&config);
            for record in orchestrator.history_snapshot() {
                println!(
                    "{} {} success={} confidence={:.2}",
                    record.timestamp, record.url, record.success, record.confidence
                );
            }
        }
        Command::Credentials { action } => run_credentials(action)?,
        Command::Sessions { action } => run_sessions(action)?,
        Command::Serve { port } => {
            let orchestrator = std::sync::Arc::new(runtime::build_orchestrator(&config));
            http::serve(orchestrator, std::sync::Arc::new(config), port)
                .await
                .map_err(AppError::Other)?;
        }
        Command::Info => {
            println!("soulbrowser {}", env!("CARGO_PKG_VERSION"));
            println!("Build date: {}", env!("BUILD_DATE"));
            println!("Git commit: {}", env!("GIT_HASH"));
            println!("Git branch: {}", env!("GIT_BRANCH"));
        }
    }

    Ok(())
}

fn run_credentials(action: CredentialsCommand) -> AppResult<()> {
    let store = credential_store::CredentialStore::open_default()?;
    match action {
        CredentialsCommand::Save { domain, username, password } => {
            store.save_credential(&domain, &username, &password)?;
            println!("saved credential for {domain}");
        }
        CredentialsCommand::List => {
            for site in store.list_stored_sites()? {
                println!("{} ({})", site.domain, site.username);
            }
        }
        CredentialsCommand::Delete { domain } => {
            if store.delete_credential(&domain)? {
                println!("deleted credential for {domain}");
            } else {
                println!("no credential stored for {domain}");
            }
        }
        CredentialsCommand::Clear => {
            store.clear_all_credentials()?;
            println!("cleared all stored credentials");
        }
    }
    Ok(())
}

fn run_sessions(action: SessionsCommand) -> AppResult<()> {
    let store = session_store::SessionStore::open_default()?;
    match action {
        SessionsCommand::List => {
            for summary in store.list_sessions()? {
                println!("{} valid={} expires_at={}", summary.domain, summary.is_valid, summary.expires_at);
            }
        }
        SessionsCommand::Clear { domain } => match domain {
            Some(domain) => {
                store.clear_session(&domain)?;
                println!("cleared session for {domain}");
            }
            None => {
                store.clear_all_sessions()?;
                println!("cleared all sessions");
            }
        },
        SessionsCommand::Cleanup => {
            let removed = store.cleanup_expired_sessions()?;
            println!("removed {removed} expired session(s)");
        }
    }
    Ok(())
}

/// Initializes stdout + daily-rotating-file tracing output. The returned
/// guard flushes the non-blocking file writer on drop; callers must hold it
/// for the process lifetime.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    let file_appender = tracing_appender::rolling::daily("logs", "soulbrowser.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().with_target(true).with_ansi(false).with_writer(non_blocking);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    guard
}

/// `ActionResult` plus its enum fields rendered as serializable strings,
/// since `Approach` derives `serde` but JSON output reads better keyed by
/// its `as_str()` form than by the derived variant name.
#[derive(serde::Serialize)]
struct SerializableResult {
    success: bool,
    approach_used: Option<&'static str>,
    confidence: f64,
    execution_time_secs: f64,
    result_data: std::collections::HashMap<String, String>,
    error_message: Option<String>,
    recommendation: Option<String>,
}

impl From<soulbrowser_core_types::ActionResult> for SerializableResult {
    fn from(r: soulbrowser_core_types::ActionResult) -> Self {
        Self {
            success: r.success,
            approach_used: r.approach_used.map(|a| a.as_str()),
            confidence: r.confidence,
            execution_time_secs: r.execution_time_secs,
            result_data: r.result_data,
            error_message: r.error_message,
            recommendation: r.recommendation,
        }
    }
}
