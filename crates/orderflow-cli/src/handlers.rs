//! Subcommand handlers

use std::path::{Path, PathBuf};

use orderflow::config::DEFAULT_CONFIG_PATH;
use orderflow::{Credentials, JsonFileStore, RecordStore, SuiteConfig};
use tracing::{info, warn};

use crate::commands::{RecordsArgs, RunArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::{format_record, Reporter};

/// Load the suite configuration.
///
/// An explicitly named file must exist. When none is named the default
/// file is read if present, otherwise built-in defaults apply.
pub fn load_suite_config(path: Option<&Path>) -> CliResult<SuiteConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config(format!(
                    "configuration file not found: {}",
                    path.display()
                )));
            }
            info!(path = %path.display(), "loading configuration");
            Ok(SuiteConfig::load(path)?)
        }
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                info!(path = DEFAULT_CONFIG_PATH, "loading configuration");
                Ok(SuiteConfig::load(default)?)
            } else {
                warn!(
                    path = DEFAULT_CONFIG_PATH,
                    "no configuration file found, using defaults"
                );
                Ok(SuiteConfig::default())
            }
        }
    }
}

fn records_store(override_path: Option<&PathBuf>, suite: &SuiteConfig) -> JsonFileStore {
    override_path.map_or_else(
        || JsonFileStore::new(suite.records_path()),
        |path| JsonFileStore::new(path.clone()),
    )
}

/// Validate configuration and credentials
pub fn check_config(config: &CliConfig, reporter: &Reporter) -> CliResult<()> {
    let suite = load_suite_config(config.config_path.as_deref())?;
    suite.validate()?;
    let credentials = Credentials::from_env()?;

    reporter.print_always("Configuration OK");
    reporter.print(&format!("  CRM:          {}", credentials.url));
    reporter.print(&format!("  user:         {}", credentials.username));
    reporter.print(&format!(
        "  opportunity:  {} ({})",
        suite.scenario.opportunity_number, suite.scenario.opportunity_title
    ));
    reporter.print(&format!(
        "  attempts:     {} (popup delay {}ms)",
        suite.retry.max_attempts, suite.retry.popup_delay_ms
    ));
    reporter.print(&format!("  records:      {}", suite.records_path()));
    Ok(())
}

/// Print stored run records
pub fn list_records(config: &CliConfig, args: &RecordsArgs, reporter: &Reporter) -> CliResult<()> {
    let suite = load_suite_config(config.config_path.as_deref())?;
    let store = records_store(args.records.as_ref(), &suite);
    let records = store.load()?;

    if args.json {
        reporter.print_always(&serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        reporter.print_always(&format!("No run records in {}", store.path().display()));
        return Ok(());
    }
    for record in &records {
        reporter.print_always(format_record(record).trim_end());
    }
    Ok(())
}

/// Run one scenario in Chromium
pub fn run_scenario(config: &CliConfig, args: &RunArgs, reporter: &Reporter) -> CliResult<()> {
    let mut suite = load_suite_config(config.config_path.as_deref())?;
    let credentials = Credentials::from_env()?;

    if args.headed {
        suite.browser = suite.browser.clone().with_headless(false);
    }
    if args.no_sandbox {
        suite.browser = suite.browser.clone().with_no_sandbox();
    }
    let store = records_store(args.records.as_ref(), &suite);
    let kind = orderflow::ScenarioKind::from(args.scenario);

    execute(kind, &credentials, &suite, &store, reporter)
}

#[cfg(feature = "browser")]
fn execute(
    kind: orderflow::ScenarioKind,
    credentials: &Credentials,
    suite: &SuiteConfig,
    store: &JsonFileStore,
    reporter: &Reporter,
) -> CliResult<()> {
    use orderflow::Browser;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async {
        info!(scenario = %kind, headless = suite.browser.headless, "launching browser");
        let browser = Browser::launch(&suite.browser).await?;
        let outcome = match browser.new_page().await {
            Ok(page) => orderflow::scenarios::run(kind, &page, credentials, suite, store).await,
            Err(e) => Err(e),
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "failed to close browser");
        }
        outcome
    })?;

    reporter.print(crate::output::format_report(&report).trim_end());
    match report.error {
        None => Ok(()),
        Some(e) => Err(CliError::scenario_failed(report.name, e.to_string())),
    }
}

#[cfg(not(feature = "browser"))]
fn execute(
    _kind: orderflow::ScenarioKind,
    _credentials: &Credentials,
    _suite: &SuiteConfig,
    _store: &JsonFileStore,
    _reporter: &Reporter,
) -> CliResult<()> {
    Err(CliError::FeatureDisabled { feature: "browser" })
}
