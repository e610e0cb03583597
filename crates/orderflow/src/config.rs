//! Suite configuration.
//!
//! Credentials come from the environment and are checked before any
//! navigation. Everything else lives in a YAML file with defaults for
//! every field, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::result::{FlowError, FlowResult};
use crate::retry::{Recovery, RetryPolicy};
use crate::store::DEFAULT_RECORDS_PATH;

/// CRM base URL
pub const ENV_URL: &str = "PWG_CRM_URL";
/// Login user
pub const ENV_USERNAME: &str = "PWG_CRM_USERNAME";
/// Login password
pub const ENV_PASSWORD: &str = "PWG_CRM_PASSWORD";

/// Default config file name
pub const DEFAULT_CONFIG_PATH: &str = "orderflow.yaml";

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Login credentials for the CRM
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// CRM base URL
    pub url: String,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing or empty variable
    pub fn from_env() -> FlowResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming every missing or empty variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FlowResult<Self> {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let url = read(ENV_URL);
        let username = read(ENV_USERNAME);
        let password = read(ENV_PASSWORD);

        match (url, username, password) {
            (Some(url), Some(username), Some(password)) => Ok(Self {
                url,
                username,
                password,
            }),
            (url, username, password) => {
                let missing: Vec<&str> = [
                    (ENV_URL, url.is_none()),
                    (ENV_USERNAME, username.is_none()),
                    (ENV_PASSWORD, password.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(FlowError::configuration(format!(
                    "missing required environment variables: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

// =============================================================================
// SUITE CONFIG
// =============================================================================

/// Business data the scenarios are driven against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioData {
    /// Opportunity to search for and order against
    pub opportunity_number: String,
    /// Expected opportunity title
    pub opportunity_title: String,
    /// Direct URL of the opportunity record
    pub opportunity_url: String,
    /// Order creation URL in the order system
    pub order_creation_url: String,
    /// Order id shown in the print dialog
    pub order_system_id: String,
    /// Event date range expected in the report
    pub event_dates: String,
    /// Venue expected in the report
    pub venue: String,
    /// Opportunity number that must return no results
    pub no_results_number: String,
}

impl Default for ScenarioData {
    fn default() -> Self {
        Self {
            opportunity_number: String::new(),
            opportunity_title: String::new(),
            opportunity_url: String::new(),
            order_creation_url: String::new(),
            order_system_id: String::new(),
            event_dates: String::new(),
            venue: String::new(),
            no_results_number: "OP99999999".to_string(),
        }
    }
}

/// Timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Page navigation
    pub navigation_ms: u64,
    /// Readiness gates after navigation
    pub ready_ms: u64,
    /// Ordinary element waits
    pub element_ms: u64,
    /// Record forms and their fields
    pub form_ms: u64,
    /// Global search box
    pub search_ms: u64,
    /// Report rendering and dashboard landmarks
    pub report_ms: u64,
    /// Popup window per attempt
    pub popup_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            ready_ms: 15_000,
            element_ms: 10_000,
            form_ms: 20_000,
            search_ms: 60_000,
            report_ms: 30_000,
            popup_ms: 30_000,
        }
    }
}

#[cfg(test)]
impl Timeouts {
    /// Every timeout set to `ms`
    pub(crate) const fn uniform(ms: u64) -> Self {
        Self {
            navigation_ms: ms,
            ready_ms: ms,
            element_ms: ms,
            form_ms: ms,
            search_ms: ms,
            report_ms: ms,
            popup_ms: ms,
        }
    }
}

/// Retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Attempts for retry-governed actions
    pub max_attempts: u32,
    /// Pause between popup attempts
    pub popup_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            popup_delay_ms: 1000,
        }
    }
}

impl RetrySettings {
    /// Policy for retry-governed navigation: reload between attempts
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_attempts` is out of range
    pub fn navigation_policy(&self) -> FlowResult<RetryPolicy> {
        Ok(RetryPolicy::new(self.max_attempts)?.with_recovery(Recovery::reload()))
    }

    /// Policy for popup acquisition: pause between attempts
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `max_attempts` is out of range
    pub fn popup_policy(&self) -> FlowResult<RetryPolicy> {
        Ok(RetryPolicy::new(self.max_attempts)?
            .with_delay(Duration::from_millis(self.popup_delay_ms)))
    }
}

/// Browser launch configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run without a window
    pub headless: bool,
    /// Chromium sandbox (disable in containers)
    pub sandbox: bool,
    /// Path to the chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

impl BrowserConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Disable the sandbox
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

/// Complete suite configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Business data
    pub scenario: ScenarioData,
    /// Timeouts
    pub timeouts: Timeouts,
    /// Retry settings
    pub retry: RetrySettings,
    /// Run record file
    pub records_path: Option<String>,
    /// Browser launch options
    pub browser: BrowserConfig,
}

impl SuiteConfig {
    /// Parse YAML text
    ///
    /// # Errors
    ///
    /// Returns a YAML error for malformed input
    pub fn from_yaml_str(yaml: &str) -> FlowResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an I/O or YAML error
    pub fn load(path: impl AsRef<Path>) -> FlowResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Record file, falling back to the default location
    #[must_use]
    pub fn records_path(&self) -> &str {
        self.records_path.as_deref().unwrap_or(DEFAULT_RECORDS_PATH)
    }

    /// Check values the scenarios rely on
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing every problem found
    pub fn validate(&self) -> FlowResult<()> {
        let mut problems = Vec::new();
        if let Err(e) = RetryPolicy::new(self.retry.max_attempts) {
            problems.push(e.to_string());
        }
        let data = &self.scenario;
        for (field, value) in [
            ("scenario.opportunity_number", &data.opportunity_number),
            ("scenario.opportunity_title", &data.opportunity_title),
            ("scenario.opportunity_url", &data.opportunity_url),
            ("scenario.order_creation_url", &data.order_creation_url),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{field} is required"));
            }
        }
        let t = &self.timeouts;
        if [
            t.navigation_ms,
            t.ready_ms,
            t.element_ms,
            t.form_ms,
            t.search_ms,
            t.report_ms,
            t.popup_ms,
        ]
            .contains(&0)
        {
            problems.push("timeouts must be non-zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FlowError::configuration(problems.join("; ")))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod credentials_tests {
        use super::*;

        fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |name| map.get(name).cloned()
        }

        #[test]
        fn test_all_present() {
            let creds = Credentials::from_lookup(lookup(&[
                (ENV_URL, "https://crm.example.com"),
                (ENV_USERNAME, "qa@example.com"),
                (ENV_PASSWORD, "secret"),
            ]))
            .unwrap();
            assert_eq!(creds.username, "qa@example.com");
        }

        #[test]
        fn test_lists_every_missing_name() {
            let err = Credentials::from_lookup(lookup(&[(ENV_URL, "https://crm.example.com")]))
                .unwrap_err()
                .to_string();
            assert!(err.contains(ENV_USERNAME));
            assert!(err.contains(ENV_PASSWORD));
            assert!(!err.contains(ENV_URL));
        }

        #[test]
        fn test_empty_counts_as_missing() {
            let err = Credentials::from_lookup(lookup(&[
                (ENV_URL, "https://crm.example.com"),
                (ENV_USERNAME, "  "),
                (ENV_PASSWORD, "secret"),
            ]))
            .unwrap_err();
            assert!(matches!(err, FlowError::Configuration { .. }));
        }

        #[test]
        fn test_debug_redacts_password() {
            let creds = Credentials {
                url: "u".into(),
                username: "n".into(),
                password: "hunter2".into(),
            };
            assert!(!format!("{creds:?}").contains("hunter2"));
        }
    }

    mod suite_tests {
        use super::*;

        const SAMPLE: &str = r#"
scenario:
  opportunity_number: OP15296451
  opportunity_title: JBS Automation POC For Jan
  opportunity_url: https://crm.example.com/main.aspx?etn=opportunity
  order_creation_url: https://orders.example.com/#/orderNew/1145
  order_system_id: "1145"
timeouts:
  popup_ms: 45000
retry:
  max_attempts: 4
"#;

        #[test]
        fn test_empty_yields_defaults() {
            let config = SuiteConfig::from_yaml_str("").unwrap();
            assert_eq!(config, SuiteConfig::default());
            assert_eq!(config.timeouts.navigation_ms, 30_000);
            assert_eq!(config.retry.max_attempts, 3);
            assert_eq!(config.records_path(), DEFAULT_RECORDS_PATH);
        }

        #[test]
        fn test_partial_document_keeps_defaults() {
            let config = SuiteConfig::from_yaml_str(SAMPLE).unwrap();
            assert_eq!(config.timeouts.popup_ms, 45_000);
            assert_eq!(config.timeouts.ready_ms, 15_000);
            assert_eq!(config.retry.popup_delay_ms, 1000);
            assert_eq!(config.scenario.no_results_number, "OP99999999");
            config.validate().unwrap();
        }

        #[test]
        fn test_validate_reports_problems() {
            let mut config = SuiteConfig::default();
            config.retry.max_attempts = 9;
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains("max attempts"));
            assert!(err.contains("scenario.opportunity_number"));
        }

        #[test]
        fn test_demo_config_is_valid() {
            let config =
                SuiteConfig::from_yaml_str(include_str!("../../../demos/orderflow.yaml")).unwrap();
            config.validate().unwrap();
            assert_eq!(config.timeouts, Timeouts::default());
            assert_eq!(config.retry, RetrySettings::default());
            assert_eq!(config.browser, BrowserConfig::default());
            assert_eq!(config.records_path(), DEFAULT_RECORDS_PATH);
        }

        #[test]
        fn test_malformed_yaml_is_error() {
            assert!(matches!(
                SuiteConfig::from_yaml_str("timeouts: [1, 2"),
                Err(FlowError::Yaml(_))
            ));
        }

        #[test]
        fn test_policies_from_settings() {
            let settings = RetrySettings::default();
            let nav = settings.navigation_policy().unwrap();
            assert_eq!(nav.recovery(), Recovery::reload());
            let popup = settings.popup_policy().unwrap();
            assert_eq!(popup.delay(), Duration::from_secs(1));
            assert_eq!(popup.recovery(), Recovery::None);
        }
    }
}
