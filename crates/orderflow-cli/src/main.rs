//! Orderflow CLI entry point
//!
//! Usage:
//!   orderflow run                      # Complete order flow, headless
//!   orderflow run --scenario auth      # Sign-in only
//!   orderflow check-config             # Validate config and credentials
//!   orderflow records                  # Show recorded runs

use clap::Parser;
use orderflow_cli::{
    handlers, init_logging, Cli, CliConfig, CliResult, ColorArg, Commands, Reporter, Verbosity,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_logging(&config);

    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to read .env file");
        }
    }

    match cli.color {
        ColorArg::Always => console::set_colors_enabled(true),
        ColorArg::Never => console::set_colors_enabled(false),
        ColorArg::Auto => {}
    }

    let reporter = Reporter::new(config.verbosity.is_quiet());
    match cli.command {
        Commands::Run(args) => handlers::run_scenario(&config, &args, &reporter),
        Commands::CheckConfig => handlers::check_config(&config, &reporter),
        Commands::Records(args) => handlers::list_records(&config, &args, &reporter),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet))
        .with_json_logs(cli.json_logs)
        .with_config_path(cli.config.clone())
}
