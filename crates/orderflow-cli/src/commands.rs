//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use orderflow::ScenarioKind;
use std::path::PathBuf;

/// Orderflow: run the CRM order flow scenarios against a live CRM
#[derive(Parser, Debug)]
#[command(name = "orderflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Suite configuration file [default: orderflow.yaml]
    #[arg(short, long, global = true, env = "ORDERFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scenario in Chromium
    Run(RunArgs),

    /// Validate configuration and credentials without launching a browser
    CheckConfig,

    /// Show recorded runs
    Records(RecordsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Scenario to run
    #[arg(short, long, value_enum, default_value = "complete")]
    pub scenario: ScenarioArg,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Record file, overriding the configured one
    #[arg(long)]
    pub records: Option<PathBuf>,
}

/// Arguments for the records command
#[derive(Parser, Debug)]
pub struct RecordsArgs {
    /// Record file, overriding the configured one
    #[arg(long)]
    pub records: Option<PathBuf>,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Scenario argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScenarioArg {
    /// Sign in through order creation, job and report
    #[default]
    Complete,
    /// Sign in and reach the opportunities list
    Auth,
    /// Sign in with an unknown username
    InvalidUsername,
    /// Sign in with a wrong password
    InvalidPassword,
    /// Submit the sign-in form empty
    EmptyCredentials,
    /// Search for an opportunity that does not exist
    NoResults,
}

impl From<ScenarioArg> for ScenarioKind {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Complete => Self::Complete,
            ScenarioArg::Auth => Self::Auth,
            ScenarioArg::InvalidUsername => Self::InvalidUsername,
            ScenarioArg::InvalidPassword => Self::InvalidPassword,
            ScenarioArg::EmptyCredentials => Self::EmptyCredentials,
            ScenarioArg::NoResults => Self::NoResults,
        }
    }
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Automatic detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}
