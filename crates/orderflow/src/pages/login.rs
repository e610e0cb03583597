//! CRM sign-in.

use tracing::info;

use super::PageObject;
use crate::config::{Credentials, Timeouts};
use crate::driver::PageDriver;
use crate::locator::{Locator, Selector};
use crate::result::FlowResult;
use crate::url::UrlPattern;
use crate::wait::{wait_for, LoadState, NavigationOptions, WaitCondition, WaitOptions};

/// Landing URL after a completed sign-in
pub const DASHBOARD_URL_PATTERN: &str = r"main\.aspx.*dashboard";

/// Shown when the username does not exist
pub const UNKNOWN_USERNAME_ERROR: &str =
    "This username may be incorrect. Make sure you typed it correctly. Otherwise, contact your admin.";

/// Shown when the password is wrong
pub const WRONG_PASSWORD_ERROR: &str =
    "Your account or password is incorrect. If you don't remember your password, reset it now.";

/// Shown when Next is pressed with no username
pub const EMPTY_USERNAME_ERROR: &str = "Enter a valid email address, phone number, or Skype name.";

/// Sign-in page and dashboard landing
#[derive(Debug)]
pub struct LoginPage<'a, P> {
    page: &'a P,
    timeouts: &'a Timeouts,
}

impl<'a, P: PageDriver> LoginPage<'a, P> {
    /// Drive sign-in on `page`
    #[must_use]
    pub const fn new(page: &'a P, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    #[must_use]
    pub fn username_input() -> Locator {
        Locator::role("textbox", "username@psav.com")
    }

    #[must_use]
    pub fn username_field() -> Locator {
        Locator::css(r#"input[name="loginfmt"]"#)
    }

    #[must_use]
    pub fn password_input() -> Locator {
        Locator::role("textbox", "Enter the password for s-tst-")
    }

    #[must_use]
    pub fn password_field() -> Locator {
        Locator::css(r#"input[name="passwd"]"#)
    }

    #[must_use]
    pub fn next_button() -> Locator {
        Locator::role("button", "Next")
    }

    #[must_use]
    pub fn sign_in_button() -> Locator {
        Locator::role("button", "Sign in")
    }

    /// "No" on the stay-signed-in prompt
    #[must_use]
    pub fn stay_signed_in_no() -> Locator {
        Locator::role("button", "No")
    }

    #[must_use]
    pub fn loading_alert() -> Locator {
        Locator::new(Selector::role("alert", "Loading...")).first()
    }

    #[must_use]
    pub fn goals_heading() -> Locator {
        Locator::role("heading", "My Goals and Pace").first()
    }

    /// Left navigation entry for opportunities
    #[must_use]
    pub fn opportunities_nav() -> Locator {
        Locator::text("Opportunities").first()
    }

    fn element(&self, locator: Locator) -> Locator {
        locator.with_timeout(self.timeouts.element_ms)
    }

    /// Open the sign-in page
    ///
    /// # Errors
    ///
    /// Returns the navigation failure
    pub async fn open(&self, url: &str) -> FlowResult<()> {
        let options = NavigationOptions::new()
            .with_wait_until(LoadState::DomContentLoaded)
            .with_timeout(self.timeouts.navigation_ms);
        self.page.goto(url, &options).await?;
        super::ensure_ready(self.page, self).await?;
        Ok(())
    }

    /// Enter `username` and press Next
    ///
    /// # Errors
    ///
    /// Returns the first element or driver failure
    pub async fn submit_username(&self, username: &str) -> FlowResult<()> {
        self.element(Self::username_input()).fill(self.page, username).await?;
        self.element(Self::next_button()).click(self.page).await
    }

    /// Press Next without entering a username
    ///
    /// # Errors
    ///
    /// Returns the driver failure
    pub async fn submit_empty_username(&self) -> FlowResult<()> {
        self.element(Self::next_button()).click(self.page).await
    }

    /// Enter `password` and press Sign in
    ///
    /// # Errors
    ///
    /// Returns the first element or driver failure
    pub async fn submit_password(&self, password: &str) -> FlowResult<()> {
        wait_for(
            self.page,
            &Self::password_field().visible(),
            &WaitOptions::within(self.timeouts.element_ms),
        )
        .await?;
        self.element(Self::password_input()).fill(self.page, password).await?;
        self.element(Self::sign_in_button()).click(self.page).await
    }

    /// Full sign-in up to the dashboard URL
    ///
    /// # Errors
    ///
    /// Returns the first failing interaction or the URL wait timeout
    pub async fn sign_in(&self, credentials: &Credentials) -> FlowResult<()> {
        info!(url = %credentials.url, user = %credentials.username, "signing in");
        self.open(&credentials.url).await?;
        self.submit_username(&credentials.username).await?;
        self.submit_password(&credentials.password).await?;
        self.element(Self::stay_signed_in_no()).click(self.page).await?;
        wait_for(
            self.page,
            &WaitCondition::UrlMatches(UrlPattern::regex(DASHBOARD_URL_PATTERN)),
            &WaitOptions::within(self.timeouts.navigation_ms),
        )
        .await?;
        Ok(())
    }

    /// Wait for the dashboard loading alert to go away
    ///
    /// # Errors
    ///
    /// Returns `ConditionTimedOut` if it stays attached
    pub async fn wait_for_loading_cleared(&self) -> FlowResult<()> {
        wait_for(
            self.page,
            &Self::loading_alert().detached(),
            &WaitOptions::within(self.timeouts.report_ms),
        )
        .await
        .map(drop)
    }

    /// Wait for the dashboard goals heading
    ///
    /// # Errors
    ///
    /// Returns `ConditionTimedOut` if it never shows
    pub async fn wait_for_goals_heading(&self) -> FlowResult<()> {
        wait_for(
            self.page,
            &Self::goals_heading().visible(),
            &WaitOptions::within(self.timeouts.report_ms),
        )
        .await
        .map(drop)
    }

    /// Wait for the opportunities navigation entry
    ///
    /// # Errors
    ///
    /// Returns `ConditionTimedOut` if it never shows
    pub async fn wait_for_navigation(&self) -> FlowResult<()> {
        wait_for(
            self.page,
            &Self::opportunities_nav().visible(),
            &WaitOptions::within(self.timeouts.report_ms),
        )
        .await
        .map(drop)
    }

    /// Wait for `message` to be shown
    ///
    /// # Errors
    ///
    /// Returns `ConditionTimedOut` if it never shows
    pub async fn expect_error(&self, message: &str) -> FlowResult<()> {
        wait_for(
            self.page,
            &Locator::text(message).visible(),
            &WaitOptions::within(self.timeouts.element_ms),
        )
        .await
        .map(drop)
    }
}

impl<P: PageDriver> PageObject for LoginPage<'_, P> {
    fn page_name(&self) -> &'static str {
        "login"
    }

    fn ready_condition(&self) -> WaitCondition {
        Self::username_field().visible()
    }

    fn ready_timeout_ms(&self) -> u64 {
        self.timeouts.navigation_ms
    }
}
