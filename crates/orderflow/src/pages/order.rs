//! Order creation in the order system popup.

use tracing::info;

use super::PageObject;
use crate::config::Timeouts;
use crate::driver::PageDriver;
use crate::locator::{Locator, Selector};
use crate::result::FlowResult;
use crate::retry::{open_with_retry, RetryPolicy};
use crate::url::{order_number_from_url, UrlPattern};
use crate::wait::{wait_for, LoadState, NavigationOptions, WaitCondition, WaitOptions};

/// URL shape of a created order
pub const ORDER_URL_GLOB: &str = "**/order/**";

/// Order creation and order details
#[derive(Debug)]
pub struct OrderPage<'a, P> {
    page: &'a P,
    timeouts: &'a Timeouts,
}

impl<'a, P: PageDriver> OrderPage<'a, P> {
    #[must_use]
    pub const fn new(page: &'a P, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    #[must_use]
    pub fn create_order_button() -> Locator {
        Locator::role("button", "Create Order")
    }

    #[must_use]
    pub fn accounts_contacts() -> Locator {
        Locator::css("#accounts-contacts")
    }

    /// `text` inside the common order/job header
    #[must_use]
    pub fn order_header_text(text: &str) -> Locator {
        Locator::text(text).within(Selector::css("#orderJobCommon"))
    }

    /// Open the order creation form, reloading between failed attempts
    ///
    /// # Errors
    ///
    /// Returns `ActionFailed` once attempts are exhausted
    pub async fn open_creation(&self, url: &str, policy: &RetryPolicy) -> FlowResult<()> {
        let navigation = NavigationOptions::new()
            .with_wait_until(LoadState::NetworkIdle)
            .with_timeout(self.timeouts.navigation_ms);
        open_with_retry(
            self.page,
            url,
            &navigation,
            &self.ready_condition(),
            &WaitOptions::within(self.ready_timeout_ms()),
            policy,
        )
        .await?;
        info!("order creation form loaded");
        Ok(())
    }

    /// Create the order and capture its number from the URL.
    ///
    /// An order URL without a number yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns the click failure or a wait timeout
    pub async fn create(&self) -> FlowResult<String> {
        Self::create_order_button()
            .with_timeout(self.timeouts.ready_ms)
            .click(self.page)
            .await?;
        wait_for(
            self.page,
            &WaitCondition::UrlMatches(UrlPattern::glob(ORDER_URL_GLOB)),
            &WaitOptions::within(self.timeouts.navigation_ms),
        )
        .await?;
        wait_for(
            self.page,
            &Self::accounts_contacts().visible(),
            &WaitOptions::within(self.timeouts.form_ms),
        )
        .await?;

        let url = self.page.url().await?;
        let order_number = order_number_from_url(&url);
        info!(%url, order_number, "order created");
        Ok(order_number)
    }

    /// Check the order shows the opportunity number and title
    ///
    /// # Errors
    ///
    /// Returns the first wait that times out
    pub async fn validate_details(&self, opportunity_number: &str, title: &str) -> FlowResult<()> {
        let section = Self::accounts_contacts();
        wait_for(
            self.page,
            &section.visible(),
            &WaitOptions::within(self.timeouts.navigation_ms),
        )
        .await?;
        wait_for(
            self.page,
            &Locator::text(opportunity_number).visible(),
            &WaitOptions::within(self.timeouts.form_ms),
        )
        .await?;

        let element = WaitOptions::within(self.timeouts.element_ms);
        wait_for(self.page, &section.contains_text(opportunity_number), &element).await?;
        wait_for(self.page, &section.contains_text(title), &element).await?;
        wait_for(self.page, &Self::order_header_text(title).visible(), &element).await?;
        info!(opportunity_number, title, "order details validated");
        Ok(())
    }
}

impl<P: PageDriver> PageObject for OrderPage<'_, P> {
    fn page_name(&self) -> &'static str {
        "order"
    }

    fn ready_condition(&self) -> WaitCondition {
        Self::create_order_button().visible()
    }

    fn ready_timeout_ms(&self) -> u64 {
        self.timeouts.ready_ms
    }
}
