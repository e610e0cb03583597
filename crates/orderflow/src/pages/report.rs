//! Print dialog and generated report preview.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::info;

use crate::config::Timeouts;
use crate::driver::PageDriver;
use crate::locator::{Locator, Presence};
use crate::result::{FlowError, FlowResult};
use crate::wait::{wait_for, WaitOptions};

/// Pricing sections a generated estimate normally lists
pub const PRICING_SECTIONS: [&str; 3] = ["Total Estimate", "Equipment Rental", "Labor"];

/// Amount followed by the total estimate label
pub const PRICING_LINE_PATTERN: &str = r"(?i)\$[\d,]+\.?\d*.*Total.*Estimate";

/// Brand names that may head the report
pub const BRANDS: [&str; 2] = ["PSAV", "Encore"];

/// Report type labels
pub const REPORT_TYPES: [&str; 2] = ["Estimate", "Quote"];

fn pricing_line() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(PRICING_LINE_PATTERN).ok())
        .as_ref()
}

/// What a report text contains beyond the mandatory strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFindings {
    /// Pricing sections present
    pub pricing_sections: Vec<String>,
    /// Whether a priced total estimate line is present
    pub priced_total: bool,
    /// Brand shown, if any
    pub brand: Option<String>,
    /// Report type shown, if any
    pub report_type: Option<String>,
}

impl ReportFindings {
    /// Scan report text
    #[must_use]
    pub fn scan(text: &str) -> Self {
        let first_of = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|c| text.contains(**c))
                .map(|c| (*c).to_string())
        };
        Self {
            pricing_sections: PRICING_SECTIONS
                .iter()
                .filter(|s| text.contains(**s))
                .map(|s| (*s).to_string())
                .collect(),
            priced_total: pricing_line().is_some_and(|re| re.is_match(text)),
            brand: first_of(&BRANDS),
            report_type: first_of(&REPORT_TYPES),
        }
    }

    /// Whether every pricing section is present
    #[must_use]
    pub fn has_full_pricing(&self) -> bool {
        self.pricing_sections.len() == PRICING_SECTIONS.len()
    }
}

/// Print flow of an order
#[derive(Debug)]
pub struct ReportPage<'a, P> {
    page: &'a P,
    timeouts: &'a Timeouts,
}

impl<'a, P: PageDriver> ReportPage<'a, P> {
    #[must_use]
    pub const fn new(page: &'a P, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    #[must_use]
    pub fn print_button() -> Locator {
        Locator::role("button", "Print")
    }

    #[must_use]
    pub fn preview_tab() -> Locator {
        Locator::role("tab", "Report Preview")
    }

    #[must_use]
    pub fn preview_button() -> Locator {
        Locator::title("Preview Report")
    }

    #[must_use]
    pub fn parameters_tab() -> Locator {
        Locator::role("tab", "Parameters")
    }

    /// First rendered report page
    #[must_use]
    pub fn report_body() -> Locator {
        Locator::css("#page_0")
    }

    fn element(&self) -> WaitOptions {
        WaitOptions::within(self.timeouts.element_ms)
    }

    /// Open the print dialog for order `order_id`
    ///
    /// # Errors
    ///
    /// Returns a wait timeout if the dialog never shows the order
    pub async fn open_print_dialog(&self, order_id: &str) -> FlowResult<()> {
        let print = Self::print_button().with_timeout(self.timeouts.element_ms);
        wait_for(self.page, &print.visible(), &self.element()).await?;
        print.click(self.page).await?;
        wait_for(self.page, &Locator::text(order_id).visible(), &self.element()).await?;
        info!(order_id, "print dialog open");
        Ok(())
    }

    /// Generate the preview and wait for its first page
    ///
    /// # Errors
    ///
    /// Returns a wait timeout if the report never renders
    pub async fn generate_preview(&self) -> FlowResult<()> {
        let tab = Self::preview_tab().with_timeout(self.timeouts.element_ms);
        tab.click(self.page).await?;
        wait_for(self.page, &tab.visible(), &self.element()).await?;

        let preview = Self::preview_button().with_timeout(self.timeouts.element_ms);
        wait_for(self.page, &preview.visible(), &self.element()).await?;
        preview.click(self.page).await?;

        let report = Self::report_body();
        let rendering = WaitOptions::within(self.timeouts.report_ms);
        wait_for(self.page, &report.attached(), &rendering).await?;
        wait_for(self.page, &report.visible(), &rendering).await?;
        info!("report generated");
        Ok(())
    }

    /// Rendered report text
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if no report page is shown
    pub async fn text(&self) -> FlowResult<String> {
        Self::report_body()
            .with_timeout(self.timeouts.element_ms)
            .inner_text(self.page)
            .await
    }

    /// Check the report contains every string in `expected`
    ///
    /// # Errors
    ///
    /// Returns an assertion error naming every missing string
    pub async fn verify_contains(&self, expected: &[&str]) -> FlowResult<()> {
        let text = self.text().await?;
        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|s| !s.is_empty() && !text.contains(s))
            .collect();
        if !missing.is_empty() {
            return Err(FlowError::assertion(format!(
                "report is missing: {}",
                missing.join(", ")
            )));
        }
        info!(checked = expected.len(), "report content verified");
        Ok(())
    }

    /// Pricing and branding findings
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if no report page is shown
    pub async fn findings(&self) -> FlowResult<ReportFindings> {
        let findings = ReportFindings::scan(&self.text().await?);
        info!(
            pricing = ?findings.pricing_sections,
            priced_total = findings.priced_total,
            brand = ?findings.brand,
            report_type = ?findings.report_type,
            "report findings"
        );
        Ok(findings)
    }

    /// Whether the report exposes a Parameters tab
    pub async fn probe_parameters(&self) -> Presence {
        let presence = Self::parameters_tab().probe(self.page).await;
        if presence.is_found() {
            info!("parameters tab available");
        } else {
            info!("parameters tab not available in this report");
        }
        presence
    }
}
