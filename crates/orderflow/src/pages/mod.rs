//! Page objects.
//!
//! Each page object borrows the page it drives and the suite timeouts.
//! Locators are exposed as associated functions so tests and diagnostics
//! can name the exact target a step waits on.

pub mod job;
pub mod login;
pub mod opportunity;
pub mod order;
pub mod report;

pub use job::{Category, JobPage, Pick};
pub use login::LoginPage;
pub use opportunity::{OpportunitySummary, OpportunityPage};
pub use order::OrderPage;
pub use report::{ReportFindings, ReportPage};

use std::time::Duration;
use tracing::debug;

use crate::driver::PageDriver;
use crate::result::FlowResult;
use crate::wait::{wait_for, WaitCondition, WaitOptions};

/// A page with a known readiness condition
pub trait PageObject {
    /// Name used in logs
    fn page_name(&self) -> &'static str;

    /// Condition that holds once the page can be interacted with
    fn ready_condition(&self) -> WaitCondition;

    /// How long to wait for `ready_condition`
    fn ready_timeout_ms(&self) -> u64 {
        30_000
    }
}

/// Wait until `object` reports ready on `page`
///
/// # Errors
///
/// Returns `ConditionTimedOut` if the page never becomes ready
pub async fn ensure_ready<P, O>(page: &P, object: &O) -> FlowResult<Duration>
where
    P: PageDriver,
    O: PageObject + Sync,
{
    let condition = object.ready_condition();
    let elapsed = wait_for(page, &condition, &WaitOptions::within(object.ready_timeout_ms())).await?;
    debug!(page = object.page_name(), elapsed_ms = elapsed.as_millis(), "page ready");
    Ok(elapsed)
}
