//! Chromium page driven over CDP.
//!
//! Element operations evaluate the [`QUERY_HELPERS`] query for an
//! [`ElementRef`] on every call, so no remote object handle outlives a
//! single operation. Popups are discovered from browser-level
//! `Target.targetCreated` events whose opener is this page.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::target::{EventTargetCreated, TargetId};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{ClickCount, PageDriver, Popup, PopupListener};
use crate::config::BrowserConfig;
use crate::locator::{ElementRef, Scope, Selector, QUERY_HELPERS};
use crate::result::{FlowError, FlowResult};
use crate::wait::{
    wait_for, LoadState, NavigationOptions, WaitCondition, WaitOptions, NETWORK_IDLE_THRESHOLD_MS,
};

/// How long a newly created popup target may take to attach
const POPUP_ATTACH_TIMEOUT_MS: u64 = 5000;

/// Poll interval while a popup target attaches
const POPUP_ATTACH_POLL_MS: u64 = 50;

fn driver_error(e: impl std::fmt::Display) -> FlowError {
    FlowError::driver(e.to_string())
}

/// Launched Chromium instance
#[derive(Debug)]
pub struct Browser {
    inner: Arc<Mutex<CdpBrowser>>,
    handle: JoinHandle<()>,
}

impl Browser {
    /// Launch Chromium with `config`
    ///
    /// # Errors
    ///
    /// Returns a driver error if the browser cannot be started
    pub async fn launch(config: &BrowserConfig) -> FlowResult<Self> {
        let mut builder = CdpConfig::builder().window_size(config.viewport_width, config.viewport_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(FlowError::driver)?;

        let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(driver_error)?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!(headless = config.headless, sandbox = config.sandbox, "browser launched");

        Ok(Self {
            inner: Arc::new(Mutex::new(browser)),
            handle,
        })
    }

    /// Open a blank page
    ///
    /// # Errors
    ///
    /// Returns a driver error if the page cannot be created
    pub async fn new_page(&self) -> FlowResult<ChromiumPage> {
        let page = self
            .inner
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(driver_error)?;
        Ok(ChromiumPage {
            page,
            browser: Arc::clone(&self.inner),
        })
    }

    /// Close the browser
    ///
    /// # Errors
    ///
    /// Returns a driver error if the browser does not shut down cleanly
    pub async fn close(self) -> FlowResult<()> {
        let result = self.inner.lock().await.close().await.map(drop);
        self.handle.abort();
        result.map_err(driver_error)?;
        info!("browser closed");
        Ok(())
    }
}

/// Result shape of element scripts
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Outcome<T> {
    found: bool,
    #[serde(default)]
    value: Option<T>,
}

/// A Chromium page
#[derive(Debug, Clone)]
pub struct ChromiumPage {
    page: CdpPage,
    browser: Arc<Mutex<CdpBrowser>>,
}

impl ChromiumPage {
    async fn eval<T: DeserializeOwned>(&self, script: String) -> FlowResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(driver_error)?
            .into_value()
            .map_err(driver_error)
    }

    /// Run `body` against the described element; `body` sees it as `el`
    async fn on_element<T: DeserializeOwned>(
        &self,
        element: &ElementRef,
        body: &str,
    ) -> FlowResult<Option<T>> {
        let script = format!(
            "(() => {{ {QUERY_HELPERS}\nconst el = {}; if (!el) return {{ found: false }}; {body} }})()",
            element.to_js()
        );
        let outcome: Outcome<T> = self.eval(script).await?;
        if outcome.found {
            Ok(outcome.value)
        } else {
            Err(FlowError::ElementNotFound {
                attempted: vec![element.to_string()],
            })
        }
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: &Key) -> FlowResult<()> {
        let mut params = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .key(key.key.clone())
            .code(key.code.clone())
            .windows_virtual_key_code(key.virtual_code);
        if kind == DispatchKeyEventType::KeyDown {
            if let Some(text) = &key.text {
                params = params.text(text.clone());
            }
        }
        let params = params.build().map_err(FlowError::driver)?;
        self.page.execute(params).await.map_err(driver_error)?;
        Ok(())
    }
}

/// A key as CDP expects it
#[derive(Debug)]
struct Key {
    key: String,
    code: String,
    virtual_code: i64,
    text: Option<String>,
}

impl Key {
    fn named(name: &str) -> Self {
        let (virtual_code, text) = match name {
            "Enter" => (13, Some("\r")),
            "Tab" => (9, None),
            "Escape" => (27, None),
            "Backspace" => (8, None),
            "ArrowUp" => (38, None),
            "ArrowDown" => (40, None),
            "ArrowLeft" => (37, None),
            "ArrowRight" => (39, None),
            _ => {
                let upper = name.chars().next().map_or(0, |c| i64::from(u32::from(c.to_ascii_uppercase())));
                return Self {
                    key: name.to_string(),
                    code: format!("Key{}", name.to_ascii_uppercase()),
                    virtual_code: upper,
                    text: Some(name.to_string()),
                };
            }
        };
        Self {
            key: name.to_string(),
            code: name.to_string(),
            virtual_code,
            text: text.map(str::to_string),
        }
    }
}

/// Whether the document has reached a load state
fn reached_script(state: LoadState) -> String {
    match state {
        LoadState::DomContentLoaded => "document.readyState !== 'loading'".to_string(),
        LoadState::Load => "document.readyState === 'complete'".to_string(),
        LoadState::NetworkIdle => format!(
            "(() => {{ if (document.readyState !== 'complete') return false; \
             const ends = performance.getEntriesByType('resource').map(e => e.responseEnd); \
             const last = ends.length ? Math.max(...ends) : 0; \
             return performance.now() - last >= {NETWORK_IDLE_THRESHOLD_MS}; }})()"
        ),
    }
}

const CLICK_BODY: &str = "el.scrollIntoView({ block: 'center', inline: 'center' }); \
    el.click(); return { found: true, value: true };";

const DBLCLICK_BODY: &str = "el.scrollIntoView({ block: 'center', inline: 'center' }); \
    el.click(); el.click(); \
    el.dispatchEvent(new MouseEvent('dblclick', { bubbles: true, cancelable: true, detail: 2, view: el.ownerDocument.defaultView })); \
    return { found: true, value: true };";

const TEXT_BODY: &str = "const field = ['INPUT', 'TEXTAREA', 'SELECT'].includes(el.tagName); \
    return { found: true, value: field ? el.value : (el.innerText || el.textContent || '') };";

async fn attached_page(browser: &Mutex<CdpBrowser>, target: &TargetId) -> Option<CdpPage> {
    let deadline = Instant::now() + Duration::from_millis(POPUP_ATTACH_TIMEOUT_MS);
    while Instant::now() < deadline {
        if let Ok(pages) = browser.lock().await.pages().await {
            if let Some(page) = pages.into_iter().find(|p| p.target_id() == target) {
                return Some(page);
            }
        }
        tokio::time::sleep(Duration::from_millis(POPUP_ATTACH_POLL_MS)).await;
    }
    None
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn goto(&self, url: &str, options: &NavigationOptions) -> FlowResult<()> {
        let navigation_error = |message: String| FlowError::Navigation {
            url: url.to_string(),
            message,
        };
        tokio::time::timeout(options.timeout(), self.page.goto(url))
            .await
            .map_err(|_| navigation_error(format!("no response within {}ms", options.timeout_ms)))?
            .map_err(|e| navigation_error(e.to_string()))?;
        wait_for(
            self,
            &WaitCondition::LoadState(options.wait_until),
            &WaitOptions::within(options.timeout_ms),
        )
        .await
        .map_err(|e| navigation_error(e.to_string()))?;
        debug!(url, wait_until = %options.wait_until, "navigated");
        Ok(())
    }

    async fn reload(&self, options: &NavigationOptions) -> FlowResult<()> {
        tokio::time::timeout(options.timeout(), self.page.reload())
            .await
            .map_err(|_| FlowError::driver(format!("reload exceeded {}ms", options.timeout_ms)))?
            .map_err(driver_error)?;
        wait_for(
            self,
            &WaitCondition::LoadState(options.wait_until),
            &WaitOptions::within(options.timeout_ms),
        )
        .await?;
        Ok(())
    }

    async fn url(&self) -> FlowResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(driver_error)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn reached(&self, state: LoadState) -> FlowResult<bool> {
        self.eval(reached_script(state)).await
    }

    async fn count(&self, scope: &Scope, selector: &Selector) -> FlowResult<usize> {
        let script = format!(
            "(() => {{ {QUERY_HELPERS}\nreturn ({}).length; }})()",
            scope.query_js(selector)
        );
        self.eval(script).await
    }

    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool> {
        match self
            .on_element::<bool>(element, "return { found: true, value: __of.visible(el) };")
            .await
        {
            Ok(visible) => Ok(visible.unwrap_or(false)),
            Err(FlowError::ElementNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn click(&self, element: &ElementRef, clicks: ClickCount) -> FlowResult<()> {
        let body = match clicks {
            ClickCount::Single => CLICK_BODY,
            ClickCount::Double => DBLCLICK_BODY,
        };
        self.on_element::<bool>(element, body).await.map(drop)
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> FlowResult<()> {
        let value = serde_json::Value::String(value.to_string());
        let body = format!(
            "el.focus(); \
             const proto = Object.getPrototypeOf(el); \
             const desc = proto && Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (desc && desc.set) {{ desc.set.call(el, {value}); }} else if ('value' in el) {{ el.value = {value}; }} else {{ el.textContent = {value}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return {{ found: true, value: true }};"
        );
        self.on_element::<bool>(element, &body).await.map(drop)
    }

    async fn press(&self, element: &ElementRef, key: &str) -> FlowResult<()> {
        self.on_element::<bool>(element, "el.focus(); return { found: true, value: true };")
            .await?;
        let key = Key::named(key);
        self.dispatch_key(DispatchKeyEventType::KeyDown, &key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, &key).await
    }

    async fn inner_text(&self, element: &ElementRef) -> FlowResult<String> {
        Ok(self
            .on_element::<String>(element, TEXT_BODY)
            .await?
            .unwrap_or_default())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> FlowResult<Option<String>> {
        let name = serde_json::Value::String(name.to_string());
        self.on_element::<String>(
            element,
            &format!("return {{ found: true, value: el.getAttribute({name}) }};"),
        )
        .await
    }

    async fn evaluate_predicate(&self, script: &str) -> FlowResult<bool> {
        self.eval(format!("!!({script})")).await
    }

    async fn arm_popups(&self) -> FlowResult<PopupListener<Self>> {
        let mut events = self
            .browser
            .lock()
            .await
            .event_listener::<EventTargetCreated>()
            .await
            .map_err(driver_error)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let opener = self.page.target_id().clone();
        let browser = Arc::clone(&self.browser);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    () = tx.closed() => break,
                    event = events.next() => event,
                };
                let Some(event) = event else { break };
                let info = &event.target_info;
                if info.r#type != "page" || info.opener_id.as_ref() != Some(&opener) {
                    continue;
                }
                let Some(page) = attached_page(&browser, &info.target_id).await else {
                    warn!(url = %info.url, "popup target never attached");
                    continue;
                };
                let popup = Popup {
                    url: info.url.clone(),
                    page: ChromiumPage {
                        page,
                        browser: Arc::clone(&browser),
                    },
                };
                if let Err(mpsc::error::SendError(late)) = tx.send(popup) {
                    debug!(url = %late.url, "listener gone, closing late popup");
                    if let Err(e) = late.page.page.close().await {
                        warn!(url = %late.url, error = %e, "failed to close late popup");
                    }
                    break;
                }
            }
        });
        Ok(PopupListener::new(rx))
    }

    async fn close(&self) -> FlowResult<()> {
        self.page.clone().close().await.map_err(driver_error)
    }
}
