//! `clap`-derived CLI surface: one subcommand per entry point named in
//! spec.md §6 ("Exposed orchestrator surface" / CLI front-end contract).

use clap::{Parser, Subcommand, ValueEnum};
use soulbrowser_core_types::{ActionType, Approach};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "soulbrowser", version, about = "Browser automation orchestration engine")]
pub struct Cli {
    /// Path to an explicit config file; defaults to ./soulbrowser.toml or
    /// ~/.soulbrowser/config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Executes one ActionRequest through the orchestrator.
    Run {
        #[arg(long)]
        url: String,
        #[arg(long)]
        task: String,
        #[arg(long, value_enum)]
        action: CliActionType,
        #[arg(long, default_value = "")]
        target: String,
        /// key=value pairs, repeatable, feeding ActionRequest.action_data.
        #[arg(long = "data", value_parser = parse_key_val)]
        data: Vec<(String, String)>,
        #[arg(long)]
        confidence_threshold: Option<f64>,
        #[arg(long)]
        show_browser: bool,
        #[arg(long, value_enum)]
        force_approach: Option<CliApproach>,
    },
    /// Prints the orchestrator's aggregated analytics snapshot as JSON.
    Analytics,
    /// Prints the bounded execution history as JSON.
    History,
    /// Manages the encrypted credential vault.
    Credentials {
        #[command(subcommand)]
        action: CredentialsCommand,
    },
    /// Manages domain-keyed sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
    /// Starts the HTTP surface (POST /v1/execute, GET /v1/analytics, ...).
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Prints version, build date and git commit.
    Info,
}

#[derive(Subcommand, Debug)]
pub enum CredentialsCommand {
    Save { domain: String, username: String, password: String },
    List,
    Delete { domain: String },
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SessionsCommand {
    List,
    Clear { domain: Option<String> },
    Cleanup,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliActionType {
    Click,
    Type,
    Select,
    Clear,
    Extract,
    Submit,
    Automation,
}

impl From<CliActionType> for ActionType {
    fn from(value: CliActionType) -> Self {
        match value {
            CliActionType::Click => ActionType::Click,
            CliActionType::Type => ActionType::Type,
            CliActionType::Select => ActionType::Select,
            CliActionType::Clear => ActionType::Clear,
            CliActionType::Extract => ActionType::Extract,
            CliActionType::Submit => ActionType::Submit,
            CliActionType::Automation => ActionType::Automation,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CliApproach {
    Dom,
    AiAssist,
    Vision,
}

impl From<CliApproach> for Approach {
    fn from(value: CliApproach) -> Self {
        match value {
            CliApproach::Dom => Approach::Dom,
            CliApproach::AiAssist => Approach::AiAssist,
            CliApproach::Vision => Approach::Vision,
        }
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((key.to_string(), value.to_string()))
}

pub fn data_map(pairs: Vec<(String, String)>) -> HashMap<String, String> {
    pairs.into_iter().collect()
}
