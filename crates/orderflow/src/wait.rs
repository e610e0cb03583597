//! Wait Primitive
//!
//! Blocks a flow until a named condition holds or its deadline elapses.
//!
//! Conditions are re-checked by polling. Each sleep is clamped to the time
//! remaining, so a timed-out wait returns no later than one poll interval
//! past its deadline.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::driver::PageDriver;
use crate::locator::Locator;
use crate::result::{FlowError, FlowResult};
use crate::url::UrlPattern;

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (30 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Network idle threshold (500ms without requests)
pub const NETWORK_IDLE_THRESHOLD_MS: u64 = 500;

// =============================================================================
// LOAD STATE
// =============================================================================

/// Page load states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// `DOMContentLoaded` has fired
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    /// The `load` event has fired
    #[default]
    Load,
    /// No network activity for 500ms after load
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

impl LoadState {
    /// Get the JavaScript event name for this load state
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::NetworkIdle => "networkidle",
        }
    }

    /// Ordering of states as a document progresses
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::DomContentLoaded => 1,
            Self::Load => 2,
            Self::NetworkIdle => 3,
        }
    }

    /// Whether a document in `self` has also passed through `other`
    #[must_use]
    pub const fn includes(&self, other: Self) -> bool {
        self.rank() >= other.rank()
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.event_name())
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait options with the given timeout and the default poll interval
    #[must_use]
    pub const fn within(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// =============================================================================
// NAVIGATION OPTIONS
// =============================================================================

/// Options for navigation and reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Load state to wait for
    pub wait_until: LoadState,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            wait_until: LoadState::Load,
        }
    }
}

impl NavigationOptions {
    /// Create new navigation options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set load state
    #[must_use]
    pub const fn with_wait_until(mut self, state: LoadState) -> Self {
        self.wait_until = state;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// WAIT CONDITIONS
// =============================================================================

/// A condition a flow can block on
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// Element attached and visible
    Visible(Locator),
    /// Element hidden or detached
    Hidden(Locator),
    /// Element present in the document
    Attached(Locator),
    /// Element absent from the document
    Detached(Locator),
    /// Current URL matches a pattern
    UrlMatches(UrlPattern),
    /// Document reached a load state
    LoadState(LoadState),
    /// No network activity for the idle threshold
    NetworkIdle,
    /// Element text contains a substring
    TextContains(Locator, String),
    /// JavaScript expression evaluates truthy
    Custom {
        /// Human-readable description for diagnostics
        description: String,
        /// Expression evaluated in the page
        script: String,
    },
}

impl WaitCondition {
    /// Create a custom predicate condition
    #[must_use]
    pub fn custom(description: impl Into<String>, script: impl Into<String>) -> Self {
        Self::Custom {
            description: description.into(),
            script: script.into(),
        }
    }

    /// Check the condition once against the live page.
    ///
    /// Driver errors count as "not yet": a page mid-navigation often
    /// rejects queries that succeed a moment later.
    pub async fn check<P: PageDriver>(&self, page: &P) -> bool {
        match self {
            Self::Visible(locator) => locator.visible_now(page).await.is_some(),
            Self::Hidden(locator) => locator.visible_now(page).await.is_none(),
            Self::Attached(locator) => locator.attached_now(page).await.is_some(),
            Self::Detached(locator) => locator.attached_now(page).await.is_none(),
            Self::UrlMatches(pattern) => page
                .url()
                .await
                .map(|url| pattern.matches(&url))
                .unwrap_or(false),
            Self::LoadState(state) => page.reached(*state).await.unwrap_or(false),
            Self::NetworkIdle => page.reached(LoadState::NetworkIdle).await.unwrap_or(false),
            Self::TextContains(locator, text) => locator
                .text_now(page)
                .await
                .is_some_and(|content| content.contains(text.as_str())),
            Self::Custom { script, .. } => page.evaluate_predicate(script).await.unwrap_or(false),
        }
    }
}

impl std::fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Visible(locator) => write!(f, "{locator} to be visible"),
            Self::Hidden(locator) => write!(f, "{locator} to be hidden"),
            Self::Attached(locator) => write!(f, "{locator} to be attached"),
            Self::Detached(locator) => write!(f, "{locator} to be detached"),
            Self::UrlMatches(pattern) => write!(f, "URL matching {pattern}"),
            Self::LoadState(state) => write!(f, "load state {state}"),
            Self::NetworkIdle => write!(f, "network idle"),
            Self::TextContains(locator, text) => write!(f, "{locator} to contain {text:?}"),
            Self::Custom { description, .. } => write!(f, "{description}"),
        }
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Terminal outcome of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held
    Satisfied {
        /// Time spent waiting
        elapsed: Duration,
    },
    /// The deadline elapsed first
    TimedOut {
        /// Time spent waiting
        elapsed: Duration,
    },
}

impl WaitOutcome {
    /// Whether the condition held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied { .. })
    }

    /// Time spent waiting
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Satisfied { elapsed } | Self::TimedOut { elapsed } => *elapsed,
        }
    }
}

// =============================================================================
// POLLING
// =============================================================================

/// Poll `probe` until it yields a value or the deadline elapses
pub async fn poll_for<T, F, Fut>(options: &WaitOptions, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + options.timeout();
    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        tokio::time::sleep(options.poll_interval().min(deadline - now)).await;
    }
}

/// Wait for `condition`, returning the outcome rather than an error
pub async fn wait<P: PageDriver>(
    page: &P,
    condition: &WaitCondition,
    options: &WaitOptions,
) -> WaitOutcome {
    let start = Instant::now();
    let held = poll_for(options, || async { condition.check(page).await.then_some(()) }).await;
    let elapsed = start.elapsed();
    if held.is_some() {
        debug!(%condition, elapsed_ms = elapsed.as_millis(), "condition satisfied");
        WaitOutcome::Satisfied { elapsed }
    } else {
        debug!(%condition, timeout_ms = options.timeout_ms, "condition timed out");
        WaitOutcome::TimedOut { elapsed }
    }
}

/// Wait for `condition`, failing with [`FlowError::ConditionTimedOut`]
///
/// # Errors
///
/// Returns `ConditionTimedOut` if the deadline elapses first
pub async fn wait_for<P: PageDriver>(
    page: &P,
    condition: &WaitCondition,
    options: &WaitOptions,
) -> FlowResult<Duration> {
    match wait(page, condition, options).await {
        WaitOutcome::Satisfied { elapsed } => Ok(elapsed),
        WaitOutcome::TimedOut { .. } => Err(FlowError::ConditionTimedOut {
            condition: condition.to_string(),
            ms: options.timeout_ms,
        }),
    }
}

/// Pause for a fixed duration (prefer a condition where one exists)
pub async fn settle(duration_ms: u64) {
    tokio::time::sleep(Duration::from_millis(duration_ms)).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};
    use crate::locator::Selector;

    mod load_state_tests {
        use super::*;

        #[test]
        fn test_load_state_event_names() {
            assert_eq!(LoadState::Load.event_name(), "load");
            assert_eq!(LoadState::DomContentLoaded.event_name(), "DOMContentLoaded");
            assert_eq!(LoadState::NetworkIdle.event_name(), "networkidle");
        }

        #[test]
        fn test_later_states_include_earlier() {
            assert!(LoadState::NetworkIdle.includes(LoadState::DomContentLoaded));
            assert!(LoadState::Load.includes(LoadState::Load));
            assert!(!LoadState::DomContentLoaded.includes(LoadState::NetworkIdle));
        }

        #[test]
        fn test_load_state_serde_names() {
            let json = serde_json::to_string(&LoadState::NetworkIdle).unwrap();
            assert_eq!(json, "\"networkidle\"");
            let back: LoadState = serde_json::from_str("\"domcontentloaded\"").unwrap();
            assert_eq!(back, LoadState::DomContentLoaded);
        }
    }

    mod options_tests {
        use super::*;

        #[test]
        fn test_wait_options_builder() {
            let opts = WaitOptions::new().with_timeout(15_000).with_poll_interval(100);
            assert_eq!(opts.timeout(), Duration::from_secs(15));
            assert_eq!(opts.poll_interval(), Duration::from_millis(100));
        }

        #[test]
        fn test_navigation_options_builder() {
            let opts = NavigationOptions::new()
                .with_timeout(20_000)
                .with_wait_until(LoadState::NetworkIdle);
            assert_eq!(opts.timeout_ms, 20_000);
            assert_eq!(opts.wait_until, LoadState::NetworkIdle);
        }
    }

    mod polling_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_timeout_within_one_poll_interval() {
            let page = MockPage::new("https://crm.example.com");
            let condition = WaitCondition::Visible(Locator::css("#never"));
            let options = WaitOptions::within(1_000).with_poll_interval(100);

            let outcome = wait(&page, &condition, &options).await;

            assert!(!outcome.is_satisfied());
            assert!(outcome.elapsed() >= Duration::from_millis(1_000));
            assert!(outcome.elapsed() <= Duration::from_millis(1_100));
        }

        #[tokio::test(start_paused = true)]
        async fn test_satisfied_when_element_appears() {
            let page = MockPage::new("https://crm.example.com");
            page.insert(MockElement::new(Selector::css("#jobDatePanel")).hidden());
            let later = page.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                later.set_visible(&Selector::css("#jobDatePanel"), true);
            });

            let condition = WaitCondition::Visible(Locator::css("#jobDatePanel"));
            let outcome = wait(&page, &condition, &WaitOptions::within(10_000)).await;

            assert!(outcome.is_satisfied());
            assert!(outcome.elapsed() >= Duration::from_millis(300));
        }

        #[tokio::test]
        async fn test_wait_for_maps_timeout_to_error() {
            let page = MockPage::new("https://crm.example.com");
            let condition = WaitCondition::UrlMatches(UrlPattern::glob("**/order/**"));
            let err = wait_for(&page, &condition, &WaitOptions::within(20))
                .await
                .unwrap_err();
            match err {
                FlowError::ConditionTimedOut { condition, ms } => {
                    assert_eq!(ms, 20);
                    assert!(condition.contains("**/order/**"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_zero_timeout_checks_once() {
            let page = MockPage::new("https://crm.example.com/main.aspx?pagetype=dashboard");
            let condition = WaitCondition::UrlMatches(UrlPattern::regex(r"main\.aspx.*dashboard"));
            assert!(wait(&page, &condition, &WaitOptions::within(0)).await.is_satisfied());
        }
    }

    mod condition_tests {
        use super::*;

        #[tokio::test]
        async fn test_negative_conditions() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::role("alert", "Loading...")).hidden());
            let loading = Locator::role("alert", "Loading...");

            assert!(WaitCondition::Hidden(loading.clone()).check(&page).await);
            assert!(!WaitCondition::Detached(loading.clone()).check(&page).await);

            page.remove(&Selector::role("alert", "Loading..."));
            assert!(WaitCondition::Detached(loading).check(&page).await);
        }

        #[tokio::test]
        async fn test_text_contains() {
            let page = MockPage::new("about:blank");
            page.insert(
                MockElement::new(Selector::css("#accounts-contacts"))
                    .with_text("Opportunity OP100 Spring Gala"),
            );
            let section = Locator::css("#accounts-contacts");
            assert!(
                WaitCondition::TextContains(section.clone(), "OP100".into())
                    .check(&page)
                    .await
            );
            assert!(!WaitCondition::TextContains(section, "OP999".into()).check(&page).await);
        }

        #[tokio::test]
        async fn test_custom_predicate_and_load_state() {
            let page = MockPage::new("about:blank");
            page.set_predicate("grid.length > 100", true);
            page.set_load_state(LoadState::DomContentLoaded);

            assert!(WaitCondition::custom("grid populated", "grid.length > 100").check(&page).await);
            assert!(WaitCondition::LoadState(LoadState::DomContentLoaded).check(&page).await);
            assert!(!WaitCondition::NetworkIdle.check(&page).await);
        }

        #[test]
        fn test_condition_descriptions() {
            let cond = WaitCondition::custom("job grid populated", "true");
            assert_eq!(cond.to_string(), "job grid populated");
            assert_eq!(WaitCondition::NetworkIdle.to_string(), "network idle");
            let visible = WaitCondition::Visible(Locator::css("#page_0"));
            assert_eq!(visible.to_string(), "css=#page_0 to be visible");
        }
    }
}
