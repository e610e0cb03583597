//! Orderflow CLI library
//!
//! Command-line interface for running the CRM order flow scenarios.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Error types are self-documenting

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{Cli, ColorArg, Commands, RecordsArgs, RunArgs, ScenarioArg};
pub use config::{init_logging, CliConfig, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{format_record, format_report, Reporter};
