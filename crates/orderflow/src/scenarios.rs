//! Business scenarios.
//!
//! Each scenario drives a primary page through a [`Scenario`] and returns
//! its [`ScenarioReport`]. Only [`complete_order_flow`] persists a record;
//! the sign-in and search checks report through their step log.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::{Credentials, SuiteConfig, Timeouts};
use crate::driver::PageDriver;
use crate::flow::{release, Scenario, ScenarioReport};
use crate::locator::Presence;
use crate::pages::login::{EMPTY_USERNAME_ERROR, UNKNOWN_USERNAME_ERROR, WRONG_PASSWORD_ERROR};
use crate::pages::{Category, JobPage, LoginPage, OpportunityPage, OrderPage, ReportPage};
use crate::popup::AcquireOptions;
use crate::result::{FlowError, FlowResult};
use crate::retry::RetryPolicy;
use crate::state::ScenarioState;
use crate::store::RecordStore;
use crate::wait::settle;

/// Username that does not exist in the directory
pub const UNKNOWN_USERNAME: &str = "nonexistent@psav.com";

/// Password that never matches
pub const WRONG_PASSWORD: &str = "WrongPassword123";

/// Pause after a search that is expected to find nothing
const NO_RESULTS_SETTLE_MS: u64 = 3000;

/// Runnable scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Opportunity to generated report
    Complete,
    /// Sign in and reach the dashboard
    Auth,
    /// Unknown username is rejected
    InvalidUsername,
    /// Wrong password is rejected
    InvalidPassword,
    /// Empty username is rejected
    EmptyCredentials,
    /// Unknown opportunity number finds nothing
    NoResults,
}

impl ScenarioKind {
    /// Every scenario
    pub const ALL: [Self; 6] = [
        Self::Complete,
        Self::Auth,
        Self::InvalidUsername,
        Self::InvalidPassword,
        Self::EmptyCredentials,
        Self::NoResults,
    ];

    /// Command-line name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Auth => "auth",
            Self::InvalidUsername => "invalid-username",
            Self::InvalidPassword => "invalid-password",
            Self::EmptyCredentials => "empty-credentials",
            Self::NoResults => "no-results",
        }
    }

    /// Name used in logs and reports
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Complete => "complete order flow",
            Self::Auth => "authenticate",
            Self::InvalidUsername => "invalid username",
            Self::InvalidPassword => "invalid password",
            Self::EmptyCredentials => "empty credentials",
            Self::NoResults => "search with no results",
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| FlowError::configuration(format!("unknown scenario {s:?}")))
    }
}

/// Run `kind` on `page`
///
/// # Errors
///
/// Returns configuration errors raised before the first step, or a
/// persistence failure of the complete flow's record
pub async fn run<P: PageDriver>(
    kind: ScenarioKind,
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
    store: &dyn RecordStore,
) -> FlowResult<ScenarioReport> {
    match kind {
        ScenarioKind::Complete => complete_order_flow(page, credentials, config, store).await,
        ScenarioKind::Auth => Ok(authenticate(page, credentials, config).await),
        ScenarioKind::InvalidUsername => Ok(invalid_username(page, credentials, config).await),
        ScenarioKind::InvalidPassword => Ok(invalid_password(page, credentials, config).await),
        ScenarioKind::EmptyCredentials => Ok(empty_credentials(page, credentials, config).await),
        ScenarioKind::NoResults => Ok(search_no_results(page, credentials, config).await),
    }
}

fn begin(kind: ScenarioKind, config: &SuiteConfig) -> Scenario {
    Scenario::new(
        kind.title(),
        ScenarioState::start(config.scenario.opportunity_number.as_str()),
    )
}

/// Sign in and wait for the dashboard landmarks
async fn sign_in_steps<P: PageDriver>(
    flow: &mut Scenario,
    page: &P,
    credentials: &Credentials,
    timeouts: &Timeouts,
) -> FlowResult<()> {
    let login = LoginPage::new(page, timeouts);
    flow.mandatory("sign in", login.sign_in(credentials)).await?;
    flow.best_effort("loading cleared", login.wait_for_loading_cleared()).await;
    flow.best_effort("goals heading", login.wait_for_goals_heading()).await;
    flow.mandatory("opportunities navigation", login.wait_for_navigation()).await
}

/// Sign in and land on the dashboard
pub async fn authenticate<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> ScenarioReport {
    let mut flow = begin(ScenarioKind::Auth, config);
    let result = sign_in_steps(&mut flow, page, credentials, &config.timeouts).await;
    flow.finish(result)
}

/// An unknown username is rejected with the directory's message
pub async fn invalid_username<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> ScenarioReport {
    let mut flow = begin(ScenarioKind::InvalidUsername, config);
    let login = LoginPage::new(page, &config.timeouts);
    let result = async {
        flow.mandatory("open sign-in", login.open(&credentials.url)).await?;
        flow.mandatory("submit unknown username", login.submit_username(UNKNOWN_USERNAME)).await?;
        flow.mandatory("unknown username rejected", login.expect_error(UNKNOWN_USERNAME_ERROR))
            .await
    }
    .await;
    flow.finish(result)
}

/// A wrong password is rejected after a valid username
pub async fn invalid_password<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> ScenarioReport {
    let mut flow = begin(ScenarioKind::InvalidPassword, config);
    let login = LoginPage::new(page, &config.timeouts);
    let result = async {
        flow.mandatory("open sign-in", login.open(&credentials.url)).await?;
        flow.mandatory("submit username", login.submit_username(&credentials.username)).await?;
        flow.mandatory("submit wrong password", login.submit_password(WRONG_PASSWORD)).await?;
        flow.mandatory("wrong password rejected", login.expect_error(WRONG_PASSWORD_ERROR)).await
    }
    .await;
    flow.finish(result)
}

/// Next with no username asks for a valid address
pub async fn empty_credentials<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> ScenarioReport {
    let mut flow = begin(ScenarioKind::EmptyCredentials, config);
    let login = LoginPage::new(page, &config.timeouts);
    let result = async {
        flow.mandatory("open sign-in", login.open(&credentials.url)).await?;
        flow.mandatory("submit empty username", login.submit_empty_username()).await?;
        flow.mandatory("empty username rejected", login.expect_error(EMPTY_USERNAME_ERROR)).await
    }
    .await;
    flow.finish(result)
}

/// Searching an unknown opportunity number does not show the configured one
pub async fn search_no_results<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> ScenarioReport {
    let mut flow = begin(ScenarioKind::NoResults, config);
    let result = no_results_steps(&mut flow, page, credentials, config).await;
    flow.finish(result)
}

async fn no_results_steps<P: PageDriver>(
    flow: &mut Scenario,
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
) -> FlowResult<()> {
    let data = &config.scenario;
    sign_in_steps(flow, page, credentials, &config.timeouts).await?;

    let opportunity = OpportunityPage::new(page, &config.timeouts);
    flow.mandatory("open opportunities", opportunity.open_list()).await?;
    flow.mandatory("search unknown number", opportunity.search(&data.no_results_number)).await?;
    flow.mandatory("opportunity absent", async {
        settle(NO_RESULTS_SETTLE_MS).await;
        match opportunity.find_result(&data.opportunity_title).await {
            Presence::NotFound => {
                info!(query = %data.no_results_number, "no matching opportunity shown");
                Ok(())
            }
            Presence::Found(_) => Err(FlowError::assertion(format!(
                "{:?} shown when searching {}",
                data.opportunity_title, data.no_results_number
            ))),
        }
    }).await
}

/// Opportunity to order, job and generated report.
///
/// The run record is persisted whether the flow completes or halts, and
/// the order popup is closed on every path.
///
/// # Errors
///
/// Returns a configuration error before any navigation, or the store's
/// error if the record cannot be persisted
pub async fn complete_order_flow<P: PageDriver>(
    page: &P,
    credentials: &Credentials,
    config: &SuiteConfig,
    store: &dyn RecordStore,
) -> FlowResult<ScenarioReport> {
    config.validate()?;
    let policies = Policies {
        navigation: config.retry.navigation_policy()?,
        popup: config.retry.popup_policy()?,
    };

    let mut flow = begin(ScenarioKind::Complete, config);
    flow.state_mut().record_title(&config.scenario.opportunity_title);

    let mut popup = None;
    let result =
        order_flow_steps(&mut flow, page, &mut popup, credentials, config, &policies).await;
    if let Some(popup) = popup {
        release(&popup, "order popup").await;
    }

    let report = flow.finish(result);
    report.persist(store)?;
    info!(
        status = %report.state.status,
        order_number = %report.state.order_number,
        job_number = %report.state.job_number,
        "run record saved"
    );
    Ok(report)
}

struct Policies {
    navigation: RetryPolicy,
    popup: RetryPolicy,
}

async fn order_flow_steps<P: PageDriver>(
    flow: &mut Scenario,
    page: &P,
    popup: &mut Option<P>,
    credentials: &Credentials,
    config: &SuiteConfig,
    policies: &Policies,
) -> FlowResult<()> {
    let data = &config.scenario;
    let t = &config.timeouts;
    sign_in_steps(flow, page, credentials, t).await?;

    let opportunity = OpportunityPage::new(page, t);
    flow.mandatory("open opportunities", opportunity.open_list()).await?;
    flow.mandatory("search opportunity", opportunity.search(&data.opportunity_number)).await?;
    flow.best_effort("search results", opportunity.wait_for_results()).await;
    flow.mandatory("open opportunity details", opportunity.open_details(&data.opportunity_url))
        .await?;
    if let Some(summary) = flow.best_effort("read summary", opportunity.read_summary()).await {
        info!(
            event = %summary.event_name,
            start = %summary.start_date,
            end = %summary.end_date,
            revenue = %summary.est_revenue,
            venue = %summary.venue,
            "opportunity summary"
        );
    }

    let frame = flow.mandatory("open orders tab", opportunity.open_orders()).await?;
    if let Some(rows) = flow
        .best_effort("existing orders", opportunity.existing_orders(&frame)).await
    {
        info!(rows = rows.len(), "existing orders listed");
    }
    let acquire = AcquireOptions::new().with_timeout(t.popup_ms);
    let acquired = flow
        .mandatory(
            "open order popup",
            opportunity.open_new_order(&frame, &acquire, &policies.popup),
        )
        .await?;
    let order_page: &P = popup.insert(acquired);

    let order = OrderPage::new(order_page, t);
    flow.mandatory(
        "open order creation",
        order.open_creation(&data.order_creation_url, &policies.navigation),
    )
    .await?;
    let order_number = flow.mandatory("create order", order.create()).await?;
    flow.state_mut().record_order_number(&order_number);
    flow.mandatory(
        "validate order details",
        order.validate_details(&data.opportunity_number, &data.opportunity_title),
    )
    .await?;

    let job = JobPage::new(order_page, t);
    flow.mandatory("insert job", job.insert_new_job()).await?;
    for category in Category::ALL {
        let step = format!("add {category} items");
        if category == Category::AvEquipment {
            flow.mandatory(&step, job.add_items(category)).await?;
        } else {
            flow.best_effort(&step, job.add_items(category)).await;
        }
    }
    flow.mandatory("save job", job.save()).await?;
    let job_number = flow.mandatory("read job number", job.read_job_number()).await?;
    flow.state_mut().record_job_number(&job_number);

    let report = ReportPage::new(order_page, t);
    let print_id = if data.order_system_id.is_empty() {
        order_number.as_str()
    } else {
        data.order_system_id.as_str()
    };
    flow.mandatory("open print dialog", report.open_print_dialog(print_id)).await?;
    flow.mandatory("generate report", report.generate_preview()).await?;
    let expected = [
        data.opportunity_title.as_str(),
        data.event_dates.as_str(),
        data.venue.as_str(),
    ];
    flow.mandatory("verify report content", report.verify_contains(&expected)).await?;
    if let Some(findings) = flow.best_effort("report findings", report.findings()).await {
        if !findings.has_full_pricing() {
            warn!(found = ?findings.pricing_sections, "report lists only some pricing sections");
        }
    }
    report.probe_parameters().await;
    Ok(())
}
