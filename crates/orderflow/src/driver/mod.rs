//! Page drivers.
//!
//! [`PageDriver`] is the seam between the flow protocol and a live page.
//! Every element operation takes an [`ElementRef`] description which the
//! driver re-resolves against the current document, so nothing here holds
//! a handle that can go stale across re-renders.
//!
//! - [`MockPage`]: scriptable in-memory page for protocol tests
//! - `ChromiumPage`: real CDP page (requires the `browser` feature)

mod mock;

#[cfg(feature = "browser")]
mod chromium;

pub use mock::{MockElement, MockPage, Operation, Reaction};

#[cfg(feature = "browser")]
pub use chromium::{Browser, ChromiumPage};

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::locator::{ElementRef, Scope, Selector};
use crate::result::FlowResult;
use crate::url::UrlPattern;
use crate::wait::{LoadState, NavigationOptions};

/// Number of clicks delivered by a click operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickCount {
    /// Single click
    Single,
    /// Double click
    Double,
}

/// Operations a page must support to be driven by a flow
#[async_trait]
pub trait PageDriver: Send + Sync + Sized + 'static {
    /// Navigate to `url`, settling on `options.wait_until` within the timeout
    async fn goto(&self, url: &str, options: &NavigationOptions) -> FlowResult<()>;

    /// Reload the current document
    async fn reload(&self, options: &NavigationOptions) -> FlowResult<()>;

    /// Current URL
    async fn url(&self) -> FlowResult<String>;

    /// Whether the document has reached `state`
    async fn reached(&self, state: LoadState) -> FlowResult<bool>;

    /// Number of elements matching `selector` inside `scope`
    async fn count(&self, scope: &Scope, selector: &Selector) -> FlowResult<usize>;

    /// Whether the described element is attached and visible
    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool>;

    /// Click the described element
    async fn click(&self, element: &ElementRef, clicks: ClickCount) -> FlowResult<()>;

    /// Replace the value of the described input
    async fn fill(&self, element: &ElementRef, value: &str) -> FlowResult<()>;

    /// Press a key (e.g. `Enter`, `ArrowDown`) with the element focused
    async fn press(&self, element: &ElementRef, key: &str) -> FlowResult<()>;

    /// Rendered text of the described element
    async fn inner_text(&self, element: &ElementRef) -> FlowResult<String>;

    /// Attribute value of the described element
    async fn attribute(&self, element: &ElementRef, name: &str) -> FlowResult<Option<String>>;

    /// Evaluate a JavaScript expression and coerce the result to a boolean
    async fn evaluate_predicate(&self, script: &str) -> FlowResult<bool>;

    /// Start listening for pages opened by this page.
    ///
    /// Only popups opened after this call returns are delivered.
    async fn arm_popups(&self) -> FlowResult<PopupListener<Self>>;

    /// Close this page
    async fn close(&self) -> FlowResult<()>;
}

/// A page opened by another page
#[derive(Debug)]
pub struct Popup<P> {
    /// URL the popup was opened with
    pub url: String,
    /// The popup page
    pub page: P,
}

/// Receiver for popups opened after arming
#[derive(Debug)]
pub struct PopupListener<P> {
    receiver: mpsc::UnboundedReceiver<Popup<P>>,
}

impl<P> PopupListener<P> {
    /// Wrap a popup channel
    #[must_use]
    pub const fn new(receiver: mpsc::UnboundedReceiver<Popup<P>>) -> Self {
        Self { receiver }
    }
}

impl<P: PageDriver> PopupListener<P> {
    /// Wait up to `window` for a popup whose URL matches `pattern`.
    ///
    /// Non-matching popups are closed and skipped.
    pub async fn next_matching(&mut self, pattern: &UrlPattern, window: Duration) -> Option<P> {
        let deadline = Instant::now() + window;
        loop {
            let popup = tokio::time::timeout_at(deadline, self.receiver.recv())
                .await
                .ok()??;
            if pattern.matches(&popup.url) {
                return Some(popup.page);
            }
            debug!(url = %popup.url, expected = %pattern, "closing unrelated popup");
            discard(popup).await;
        }
    }

    /// Close every popup already delivered but not taken
    pub async fn close_pending(&mut self) -> usize {
        let mut closed = 0;
        while let Ok(popup) = self.receiver.try_recv() {
            debug!(url = %popup.url, "closing stray popup");
            discard(popup).await;
            closed += 1;
        }
        closed
    }
}

async fn discard<P: PageDriver>(popup: Popup<P>) {
    if let Err(e) = popup.page.close().await {
        warn!(url = %popup.url, error = %e, "failed to close popup");
    }
}
