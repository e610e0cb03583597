//! Popup and frame acquisition.
//!
//! An acquisition attempt is one full cycle:
//!
//! ```text
//! Armed ──► Triggered ──► Awaiting ──► Acquired
//!                            │
//!                            └──► Failed (AcquisitionFailed)
//! ```
//!
//! The listener is registered on the parent before the trigger runs, so a
//! popup opened synchronously by the click cannot be missed. Failed
//! attempts are governed by a [`RetryPolicy`]: its recovery runs against
//! the parent, then the listener is re-armed and the trigger re-run.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::PageDriver;
use crate::locator::{Locator, Selector, Target};
use crate::result::{FlowError, FlowResult};
use crate::retry::{execute_on, RetryPolicy};
use crate::url::UrlPattern;
use crate::wait::{wait_for, LoadState, WaitCondition, WaitOptions};

/// Default acquisition window per attempt (30 seconds)
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Options for popup acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Window for a matching popup to appear, per attempt
    pub timeout_ms: u64,
    /// Popup URL filter
    pub matching: UrlPattern,
    /// Load state the popup must reach
    pub ready: LoadState,
    /// Timeout for the popup to reach `ready`
    pub ready_timeout_ms: u64,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            matching: UrlPattern::Any,
            ready: LoadState::DomContentLoaded,
            ready_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }
}

impl AcquireOptions {
    /// Create acquisition options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-attempt window
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Only accept popups whose URL matches `pattern`
    #[must_use]
    pub fn with_matching(mut self, pattern: UrlPattern) -> Self {
        self.matching = pattern;
        self
    }

    /// Set the load state the popup must reach
    #[must_use]
    pub const fn with_ready(mut self, state: LoadState) -> Self {
        self.ready = state;
        self
    }

    /// Per-attempt window as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// One arm, trigger, await cycle.
///
/// Every popup delivered during the attempt other than the one returned
/// is closed before the attempt ends.
async fn acquire_once<P, TF>(parent: &P, fired: TF, options: &AcquireOptions) -> FlowResult<P>
where
    P: PageDriver,
    TF: Future<Output = FlowResult<()>>,
{
    let mut listener = parent.arm_popups().await?;
    debug!("popup listener armed");
    if let Err(e) = fired.await {
        listener.close_pending().await;
        return Err(e);
    }
    debug!(window_ms = options.timeout_ms, "trigger fired, awaiting popup");

    let found = listener
        .next_matching(&options.matching, options.timeout())
        .await;
    let stray = listener.close_pending().await;
    if stray > 0 {
        warn!(stray, "closed popups left over from this attempt");
    }
    let popup = found.ok_or(FlowError::AcquisitionFailed {
        ms: options.timeout_ms,
    })?;

    let ready = WaitCondition::LoadState(options.ready);
    if let Err(e) = wait_for(&popup, &ready, &WaitOptions::within(options.ready_timeout_ms)).await {
        if let Err(close) = popup.close().await {
            warn!(error = %close, "failed to close unready popup");
        }
        return Err(e);
    }
    Ok(popup)
}

/// Acquire the popup opened by `trigger`, retrying under `policy`.
///
/// `trigger` is called once per attempt; its future is polled only after
/// the listener is armed. Ownership of the returned popup passes to the
/// caller, which must close it.
///
/// # Errors
///
/// Returns `ActionFailed` once attempts are exhausted; the cause is
/// `AcquisitionFailed` when no popup appeared in the last window
pub async fn acquire_popup<P, T, TF>(
    parent: &P,
    label: &str,
    mut trigger: T,
    options: &AcquireOptions,
    policy: &RetryPolicy,
) -> FlowResult<P>
where
    P: PageDriver,
    T: FnMut() -> TF,
    TF: Future<Output = FlowResult<()>>,
{
    let popup = execute_on(parent, policy, label, |attempt| {
        info!(action = label, attempt, max = policy.max_attempts(), "opening popup");
        acquire_once(parent, trigger(), options)
    })
    .await?;
    info!(action = label, "popup acquired");
    Ok(popup)
}

// =============================================================================
// FRAMES
// =============================================================================

/// Handle to an embedded frame whose locators resolve inside it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameScope {
    frame: Selector,
}

impl FrameScope {
    /// The iframe selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.frame
    }

    /// Locator for `target` inside this frame
    #[must_use]
    pub fn locator(&self, target: impl Into<Target>) -> Locator {
        Locator::new(target).in_frame(self.frame.clone())
    }

    /// Scope an existing locator to this frame
    #[must_use]
    pub fn scope(&self, locator: Locator) -> Locator {
        locator.in_frame(self.frame.clone())
    }
}

/// Wait for the iframe matched by `frame` to be attached, then visible
///
/// # Errors
///
/// Returns `ConditionTimedOut` if either wait elapses
pub async fn acquire_frame<P: PageDriver>(
    page: &P,
    frame: Selector,
    options: &WaitOptions,
) -> FlowResult<FrameScope> {
    let iframe = Locator::new(frame.clone());
    wait_for(page, &iframe.attached(), options).await?;
    wait_for(page, &iframe.visible(), options).await?;
    debug!(%frame, "frame acquired");
    Ok(FrameScope { frame })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage, Reaction};
    use crate::retry::Recovery;

    const ORDERS_FRAME: &str = r#"iframe[title*="Orders"]"#;

    fn add_order() -> Locator {
        Locator::role("img", "Add new Order")
            .in_frame(Selector::css(ORDERS_FRAME))
            .with_timeout(50)
    }

    fn parent_with_trigger() -> MockPage {
        let page = MockPage::new("https://crm.example.com/main.aspx");
        page.insert(MockElement::for_locator(&add_order()));
        page
    }

    fn options() -> AcquireOptions {
        AcquireOptions::new().with_timeout(20)
    }

    #[tokio::test]
    async fn test_arms_before_trigger() {
        let parent = parent_with_trigger();
        let popup = MockPage::new("https://orders.example.com/#/orderNew");
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![Reaction::OpenPopup(popup)],
        );

        let trigger = add_order();
        acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        let events = parent.events();
        let armed = events.iter().position(|e| e == "arm_popups").unwrap();
        let clicked = events.iter().position(|e| e.starts_with("click:")).unwrap();
        assert!(armed < clicked);
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let parent = parent_with_trigger();
        let popup = MockPage::new("https://orders.example.com/#/orderNew");
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![Reaction::OpenPopup(popup.clone())],
        );

        let trigger = add_order();
        let acquired = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(acquired.current_url(), popup.current_url());
        assert_eq!(parent.count_events("arm_popups"), 1);
        assert_eq!(parent.count_events("click:"), 1);
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let parent = parent_with_trigger();
        let selector = Selector::role("img", "Add new Order");
        parent.on_click(selector.clone(), vec![]);
        parent.on_click(selector.clone(), vec![]);
        parent.on_click(
            selector,
            vec![Reaction::OpenPopup(MockPage::new("https://orders.example.com"))],
        );

        let trigger = add_order();
        let result = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &RetryPolicy::new(3).unwrap(),
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(parent.count_events("arm_popups"), 3);
        assert_eq!(parent.count_events("click:"), 3);
    }

    #[tokio::test]
    async fn test_recovery_runs_between_failed_attempts() {
        let parent = parent_with_trigger();
        let selector = Selector::role("img", "Add new Order");
        parent.on_click(selector.clone(), vec![]);
        parent.on_click(selector.clone(), vec![]);
        parent.on_click(
            selector,
            vec![Reaction::OpenPopup(MockPage::new("https://orders.example.com"))],
        );

        let trigger = add_order();
        let policy = RetryPolicy::new(3).unwrap().with_recovery(Recovery::reload());
        acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(parent.count_events("reload"), 2);
        let events = parent.events();
        let first_reload = events.iter().position(|e| e == "reload").unwrap();
        let second_arm = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == "arm_popups")
            .nth(1)
            .map(|(i, _)| i)
            .unwrap();
        assert!(first_reload < second_arm);
    }

    #[tokio::test]
    async fn test_no_recovery_on_first_attempt_success() {
        let parent = parent_with_trigger();
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![Reaction::OpenPopup(MockPage::new("https://orders.example.com"))],
        );

        let trigger = add_order();
        let policy = RetryPolicy::new(3).unwrap().with_recovery(Recovery::reload());
        acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &policy,
        )
        .await
        .unwrap();

        assert_eq!(parent.count_events("reload"), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts_and_cause() {
        let parent = parent_with_trigger();
        let trigger = add_order();

        let err = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &RetryPolicy::new(3).unwrap(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.attempts(), Some(3));
        assert!(matches!(
            err.root_cause(),
            FlowError::AcquisitionFailed { ms: 20 }
        ));
    }

    #[tokio::test]
    async fn test_unrelated_popup_is_skipped() {
        let parent = parent_with_trigger();
        let unrelated = MockPage::new("https://ads.example.com");
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![Reaction::OpenPopup(unrelated.clone())],
        );
        let trigger = add_order();

        let err = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options().with_matching(UrlPattern::Contains("orders".into())),
            &RetryPolicy::new(1).unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err.root_cause(), FlowError::AcquisitionFailed { .. }));
        assert!(unrelated.is_closed());
    }

    #[tokio::test]
    async fn test_extra_popups_from_one_attempt_are_closed() {
        let parent = parent_with_trigger();
        let wanted = MockPage::new("https://orders.example.com/#/orderNew");
        let duplicate = MockPage::new("https://orders.example.com/#/orderNew?dup");
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![
                Reaction::OpenPopup(wanted.clone()),
                Reaction::OpenPopup(duplicate.clone()),
            ],
        );
        let trigger = add_order();

        let acquired = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &options(),
            &RetryPolicy::new(1).unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(acquired.current_url(), wanted.current_url());
        assert!(!wanted.is_closed());
        assert!(duplicate.is_closed());
    }

    #[tokio::test]
    async fn test_unready_popup_is_closed() {
        let parent = parent_with_trigger();
        let popup = MockPage::new("https://orders.example.com");
        popup.set_load_state(LoadState::DomContentLoaded);
        parent.on_click(
            Selector::role("img", "Add new Order"),
            vec![Reaction::OpenPopup(popup.clone())],
        );
        let trigger = add_order();
        let mut opts = options().with_ready(LoadState::NetworkIdle);
        opts.ready_timeout_ms = 10;

        let result = acquire_popup(
            &parent,
            "open order popup",
            || trigger.click(&parent),
            &opts,
            &RetryPolicy::new(1).unwrap(),
        )
        .await;
        assert!(result.is_err());
        assert!(popup.is_closed());
    }

    #[tokio::test]
    async fn test_frame_acquisition_waits_for_visible_iframe() {
        let page = MockPage::new("about:blank");
        page.insert(MockElement::new(Selector::css(ORDERS_FRAME)).hidden());

        let pending = acquire_frame(&page, Selector::css(ORDERS_FRAME), &WaitOptions::within(20)).await;
        assert!(matches!(pending, Err(FlowError::ConditionTimedOut { .. })));

        page.set_visible(&Selector::css(ORDERS_FRAME), true);
        let frame = acquire_frame(&page, Selector::css(ORDERS_FRAME), &WaitOptions::within(20))
            .await
            .unwrap();
        let inner = frame.locator(Selector::role("img", "Add new Order"));
        assert_eq!(inner.scope().frame.as_ref(), Some(&Selector::css(ORDERS_FRAME)));
    }
}
