//! Opportunity list, search, details and the embedded Orders frame.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::PageObject;
use crate::config::Timeouts;
use crate::driver::PageDriver;
use crate::locator::{Locator, Presence, Selector, Target};
use crate::popup::{acquire_frame, acquire_popup, AcquireOptions, FrameScope};
use crate::result::{FlowError, FlowResult};
use crate::retry::RetryPolicy;
use crate::wait::{wait_for, NavigationOptions, WaitCondition, WaitOptions};

/// Iframe hosting the order system inside the opportunity form
pub const ORDERS_FRAME: &str = r#"iframe[title*="Orders"]"#;

/// Value recorded for an optional field that is not shown
pub const NOT_AVAILABLE: &str = "N/A";

/// Number of body lines kept when the orders frame has no rows
const BODY_LINES_FALLBACK: usize = 10;

/// Fields read from the opportunity summary tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub event_name: String,
    pub start_date: String,
    pub end_date: String,
    pub est_revenue: String,
    pub end_user_account: String,
    pub end_user_contact: String,
    pub venue: String,
}

/// Opportunities area of the CRM
#[derive(Debug)]
pub struct OpportunityPage<'a, P> {
    page: &'a P,
    timeouts: &'a Timeouts,
}

impl<'a, P: PageDriver> OpportunityPage<'a, P> {
    #[must_use]
    pub const fn new(page: &'a P, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    #[must_use]
    pub fn opportunities_link() -> Locator {
        Locator::text_exact("Opportunities")
    }

    /// Global search box across the CRM's UI skins
    #[must_use]
    pub fn search_box() -> Locator {
        Locator::any_of([
            Selector::css(r#"input[aria-label="Search"]"#),
            Selector::css(r#"input[data-id="searchBox"]"#),
            Selector::css("input.ms-crm-SearchBox-Input"),
            Selector::css("input#crmTopBarSearchBox"),
            Selector::css(r#"input[placeholder*="Search"]"#),
            Selector::css(r#"input[aria-label="Search this view"]"#),
            Selector::css(r#"[data-id="globalSearchText"]"#),
        ])
    }

    #[must_use]
    pub fn search_results() -> Locator {
        Locator::any_of([
            Selector::text("Search Result"),
            Selector::test_id("search-result"),
            Selector::css(".search-results-container"),
        ])
    }

    #[must_use]
    pub fn form_tabs() -> Locator {
        Locator::role("tablist", "Opportunity Form")
    }

    #[must_use]
    pub fn summary_tab() -> Locator {
        Locator::role("tab", "Summary")
    }

    #[must_use]
    pub fn orders_tab() -> Locator {
        Locator::role("tab", "Orders")
    }

    /// Summary textbox labelled `label`
    #[must_use]
    pub fn summary_field(label: &str) -> Locator {
        Locator::role("textbox", label)
    }

    /// First link in the list labelled `label`
    #[must_use]
    pub fn optional_field(label: &str) -> Locator {
        Locator::new(Selector::any_role("link"))
            .within(Selector::role("list", label))
            .first()
    }

    /// "Add new Order" inside the orders frame, across its renderings
    #[must_use]
    pub fn add_order_button(frame: &FrameScope) -> Locator {
        frame.locator(Target::Fallback(vec![
            Selector::css(r#"img[title*="Add new Order"]"#),
            Selector::css(r#"img[alt*="Add new Order"]"#),
            Selector::css_with_text("button", "Add new Order"),
            Selector::css_with_text("a", "Add new Order"),
            Selector::css(r#"[role="img"][title*="Add"]"#),
            Selector::role("img", "Add new Order"),
        ]))
    }

    fn element(&self, locator: Locator) -> Locator {
        locator.with_timeout(self.timeouts.element_ms)
    }

    /// Open the opportunities list
    ///
    /// # Errors
    ///
    /// Returns the click failure
    pub async fn open_list(&self) -> FlowResult<()> {
        self.element(Self::opportunities_link().first())
            .click(self.page)
            .await?;
        info!("opportunities list opened");
        Ok(())
    }

    /// Wait for the global search box, logging visible inputs if it never shows
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` listing every skin tried
    pub async fn wait_for_search_box(&self) -> FlowResult<()> {
        let search = Self::search_box();
        match wait_for(
            self.page,
            &search.visible(),
            &WaitOptions::within(self.timeouts.search_ms),
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(_) => {
                self.log_visible_inputs().await;
                Err(FlowError::ElementNotFound {
                    attempted: search.descriptors(),
                })
            }
        }
    }

    async fn log_visible_inputs(&self) {
        let inputs = Locator::css("input");
        let count = inputs.count(self.page).await.unwrap_or(0);
        for index in 0..count {
            let input = inputs.clone().nth(index).with_timeout(0);
            let Ok(element) = input.resolve(self.page).await else {
                continue;
            };
            if !self.page.is_visible(&element).await.unwrap_or(false) {
                continue;
            }
            let mut description = String::new();
            for name in ["aria-label", "placeholder", "id"] {
                if let Ok(Some(value)) = self.page.attribute(&element, name).await {
                    if !value.is_empty() {
                        description = value;
                        break;
                    }
                }
            }
            warn!(input = %description, "visible input");
        }
        warn!("global search box not found");
    }

    /// Search for `query` from the global search box
    ///
    /// # Errors
    ///
    /// Returns the first missing element or driver failure
    pub async fn search(&self, query: &str) -> FlowResult<()> {
        self.wait_for_search_box().await?;
        let search = Self::search_box().with_timeout(self.timeouts.search_ms);
        search.fill(self.page, query).await?;
        search.press(self.page, "Enter").await?;
        info!(query, "search submitted");
        Ok(())
    }

    /// Wait for a search results container
    ///
    /// # Errors
    ///
    /// Returns `ConditionTimedOut` if no results container shows
    pub async fn wait_for_results(&self) -> FlowResult<()> {
        wait_for(
            self.page,
            &Self::search_results().visible(),
            &WaitOptions::within(self.timeouts.navigation_ms),
        )
        .await
        .map(drop)
    }

    /// Check once whether `text` is shown
    pub async fn find_result(&self, text: &str) -> Presence {
        Locator::text(text).probe(self.page).await
    }

    /// Navigate to an opportunity record
    ///
    /// # Errors
    ///
    /// Returns the navigation failure or the form readiness timeout
    pub async fn open_details(&self, url: &str) -> FlowResult<()> {
        let options = NavigationOptions::new().with_timeout(self.timeouts.navigation_ms);
        self.page.goto(url, &options).await?;
        super::ensure_ready(self.page, self).await?;
        info!("opportunity details opened");
        Ok(())
    }

    /// Read the summary tab
    ///
    /// # Errors
    ///
    /// Returns the first summary field that never shows
    pub async fn read_summary(&self) -> FlowResult<OpportunitySummary> {
        self.element(Self::summary_tab()).click(self.page).await?;

        let labels = [
            "Event Name",
            "Date of Event Start Date",
            "Date of Event End Date",
            "Est. Revenue",
        ];
        let form = WaitOptions::within(self.timeouts.form_ms);
        for label in labels {
            wait_for(self.page, &Self::summary_field(label).visible(), &form).await?;
        }
        let mut values = Vec::with_capacity(labels.len());
        for label in labels {
            values.push(Self::summary_field(label).inner_text(self.page).await?);
        }
        let [event_name, start_date, end_date, est_revenue]: [String; 4] = values
            .try_into()
            .map_err(|_| FlowError::driver("summary fields changed while reading"))?;

        Ok(OpportunitySummary {
            event_name,
            start_date,
            end_date,
            est_revenue,
            end_user_account: self.optional_text("End User Account").await,
            end_user_contact: self.optional_text("End User Contact").await,
            venue: self.optional_text("Venue").await,
        })
    }

    async fn optional_text(&self, label: &str) -> String {
        let field = Self::optional_field(label).with_timeout(0);
        match field.probe(self.page).await {
            Presence::Found(_) => field
                .inner_text(self.page)
                .await
                .map(|text| text.trim().to_string())
                .unwrap_or_else(|_| NOT_AVAILABLE.to_string()),
            Presence::NotFound => NOT_AVAILABLE.to_string(),
        }
    }

    /// Open the Orders tab and acquire its iframe
    ///
    /// # Errors
    ///
    /// Returns the click failure or the frame wait timeout
    pub async fn open_orders(&self) -> FlowResult<FrameScope> {
        self.element(Self::orders_tab()).click(self.page).await?;
        let frame = acquire_frame(
            self.page,
            Selector::css(ORDERS_FRAME),
            &WaitOptions::within(self.timeouts.search_ms),
        )
        .await?;
        info!("orders frame ready");
        Ok(frame)
    }

    /// Rows listed in the orders frame
    ///
    /// # Errors
    ///
    /// Returns the driver failure reading the frame body
    pub async fn existing_orders(&self, frame: &FrameScope) -> FlowResult<Vec<String>> {
        let rows = frame.locator(Selector::any_role("row"));
        let texts = rows.all_inner_texts(self.page).await.unwrap_or_default();
        if !texts.is_empty() {
            return Ok(texts);
        }
        let grid_rows = frame.locator(Selector::css(r#"[role="grid"] [role="row"]"#));
        let texts = grid_rows.all_inner_texts(self.page).await.unwrap_or_default();
        if !texts.is_empty() {
            return Ok(texts);
        }
        let body = frame
            .locator(Selector::css("body"))
            .with_timeout(self.timeouts.element_ms)
            .inner_text(self.page)
            .await?;
        Ok(body
            .lines()
            .take(BODY_LINES_FALLBACK)
            .map(str::to_string)
            .collect())
    }

    /// Click "Add new Order" and acquire the order popup it opens
    ///
    /// # Errors
    ///
    /// Returns `ActionFailed` once popup attempts are exhausted
    pub async fn open_new_order(
        &self,
        frame: &FrameScope,
        options: &AcquireOptions,
        policy: &RetryPolicy,
    ) -> FlowResult<P> {
        let button = self.element(Self::add_order_button(frame));
        acquire_popup(
            self.page,
            "open order popup",
            || button.click(self.page),
            options,
            policy,
        )
        .await
    }
}

impl<P: PageDriver> PageObject for OpportunityPage<'_, P> {
    fn page_name(&self) -> &'static str {
        "opportunity"
    }

    fn ready_condition(&self) -> WaitCondition {
        Self::form_tabs().visible()
    }

    fn ready_timeout_ms(&self) -> u64 {
        self.timeouts.form_ms
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage, Reaction};

    type Opp<'a> = OpportunityPage<'a, MockPage>;

    fn timeouts() -> Timeouts {
        Timeouts::uniform(50)
    }

    mod search_tests {
        use super::*;

        #[tokio::test]
        async fn test_search_uses_any_skin() {
            let page = MockPage::default();
            let skin = Selector::css(r#"input[data-id="searchBox"]"#);
            page.insert(MockElement::new(skin.clone()));
            let t = timeouts();

            Opp::new(&page, &t).search("OP15296451").await.unwrap();

            assert_eq!(page.value_of(&skin).as_deref(), Some("OP15296451"));
            assert_eq!(page.count_events("press:"), 1);
        }

        #[tokio::test]
        async fn test_missing_search_box_lists_skins() {
            let page = MockPage::default();
            page.insert(MockElement::new(Selector::css("input")).with_attribute("id", "other"));
            let t = timeouts();

            let err = Opp::new(&page, &t).wait_for_search_box().await.unwrap_err();
            match err {
                FlowError::ElementNotFound { attempted } => assert_eq!(attempted.len(), 7),
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_absent_result_is_not_found() {
            let page = MockPage::default();
            let t = timeouts();
            let opp = Opp::new(&page, &t);
            assert_eq!(opp.find_result("JBS Automation").await, Presence::NotFound);

            page.insert(MockElement::new(Selector::text("JBS Automation")));
            assert!(opp.find_result("JBS Automation").await.is_found());
        }
    }

    mod details_tests {
        use super::*;

        #[tokio::test]
        async fn test_summary_defaults_optional_fields() {
            let page = MockPage::default();
            page.insert(MockElement::for_locator(&Opp::summary_tab()));
            for (label, value) in [
                ("Event Name", "JBS Automation POC For Jan"),
                ("Date of Event Start Date", "1/20/2026"),
                ("Date of Event End Date", "1/30/2026"),
                ("Est. Revenue", "$12,000.00"),
            ] {
                page.insert(MockElement::for_locator(&Opp::summary_field(label)).with_text(value));
            }
            page.insert(
                MockElement::for_locator(&Opp::optional_field("Venue"))
                    .with_text(" Hilton Dallas/Park Cities "),
            );
            let t = timeouts();

            let summary = Opp::new(&page, &t).read_summary().await.unwrap();

            assert_eq!(summary.event_name, "JBS Automation POC For Jan");
            assert_eq!(summary.venue, "Hilton Dallas/Park Cities");
            assert_eq!(summary.end_user_account, NOT_AVAILABLE);
            assert_eq!(summary.end_user_contact, NOT_AVAILABLE);
        }

        #[tokio::test]
        async fn test_open_details_waits_for_form() {
            let page = MockPage::default();
            let t = timeouts();
            let opp = Opp::new(&page, &t);
            assert!(opp.open_details("https://crm.example.com/opp").await.is_err());

            page.insert(MockElement::for_locator(&Opp::form_tabs()));
            opp.open_details("https://crm.example.com/opp").await.unwrap();
            assert_eq!(page.current_url(), "https://crm.example.com/opp");
        }
    }

    mod orders_tests {
        use super::*;

        fn with_orders_frame() -> MockPage {
            let page = MockPage::default();
            page.insert(MockElement::for_locator(&Opp::orders_tab()));
            page.insert(MockElement::new(Selector::css(ORDERS_FRAME)));
            page
        }

        #[tokio::test]
        async fn test_existing_orders_falls_back_to_body_lines() {
            let page = with_orders_frame();
            let t = timeouts();
            let opp = Opp::new(&page, &t);
            let frame = opp.open_orders().await.unwrap();
            let body = (1..=12).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
            page.insert(
                MockElement::new(Selector::css("body"))
                    .in_frame(Selector::css(ORDERS_FRAME))
                    .with_text(body),
            );

            let rows = opp.existing_orders(&frame).await.unwrap();
            assert_eq!(rows.len(), 10);
            assert_eq!(rows[0], "line 1");
        }

        #[tokio::test]
        async fn test_existing_orders_prefers_rows() {
            let page = with_orders_frame();
            let t = timeouts();
            let opp = Opp::new(&page, &t);
            let frame = opp.open_orders().await.unwrap();
            for text in ["Order 1", "Order 2"] {
                page.insert(
                    MockElement::new(Selector::any_role("row"))
                        .in_frame(Selector::css(ORDERS_FRAME))
                        .with_text(text),
                );
            }
            assert_eq!(
                opp.existing_orders(&frame).await.unwrap(),
                vec!["Order 1".to_string(), "Order 2".to_string()]
            );
        }

        #[tokio::test]
        async fn test_add_order_opens_popup() {
            let page = with_orders_frame();
            let t = timeouts();
            let opp = Opp::new(&page, &t);
            let frame = opp.open_orders().await.unwrap();
            let button = Opp::add_order_button(&frame);
            page.insert(MockElement::for_locator(&button));
            let popup = MockPage::new("https://orders.example.com/#/orderNew/1145");
            page.on_click(
                Selector::css(r#"img[title*="Add new Order"]"#),
                vec![Reaction::OpenPopup(popup)],
            );

            let acquired = opp
                .open_new_order(
                    &frame,
                    &AcquireOptions::new().with_timeout(20),
                    &RetryPolicy::default(),
                )
                .await
                .unwrap();
            assert!(acquired.current_url().contains("orderNew"));
        }
    }
}
