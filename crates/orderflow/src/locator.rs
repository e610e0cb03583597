//! Locator abstraction for element selection and interaction.
//!
//! # Design Philosophy
//!
//! - **Late binding**: a [`Locator`] is a description, resolved against the
//!   live document on every access; nothing is cached between calls
//! - **Fallback chains**: UI skins that render the same control differently
//!   are one [`Target::Fallback`], tried in order
//! - **Absence as a value**: [`Locator::probe`] reports [`Presence`] instead
//!   of failing when an element is expected to be missing
//! - **Fluent API**: chainable methods for frame scoping, ancestry and index

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::driver::{ClickCount, PageDriver};
use crate::result::{FlowError, FlowResult};
use crate::wait::{poll_for, WaitCondition, WaitOptions};

/// Default timeout for auto-waiting (5 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

// =============================================================================
// SELECTORS
// =============================================================================

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// Accessible role with an optional accessible name
    Role {
        /// ARIA role (explicit or implied by the tag)
        role: String,
        /// Accessible name to match
        name: Option<String>,
        /// Require the whole name to match (case-sensitive)
        exact: bool,
    },
    /// Smallest element whose text matches
    Text {
        /// Text to match
        text: String,
        /// Require the whole text to match (case-sensitive)
        exact: bool,
    },
    /// CSS selector (e.g., "#jobDatePanel")
    Css(String),
    /// Element whose `title` attribute contains the value
    Title(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// CSS selector filtered to elements containing text
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
    /// CSS selector filtered to elements with no text content
    CssWithoutText(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a role selector with a substring name match
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
            exact: false,
        }
    }

    /// Create a role selector with an exact name match
    #[must_use]
    pub fn role_exact(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
            exact: true,
        }
    }

    /// Create a role selector matching any name
    #[must_use]
    pub fn any_role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
            exact: false,
        }
    }

    /// Create a substring text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: false,
        }
    }

    /// Create an exact text selector
    #[must_use]
    pub fn text_exact(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            exact: true,
        }
    }

    /// Create a title selector
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self::Title(title.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create a CSS selector filtered by contained text
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// Create a CSS selector filtered to empty-text elements
    #[must_use]
    pub fn css_without_text(css: impl Into<String>) -> Self {
        Self::CssWithoutText(css.into())
    }

    /// JavaScript expression yielding the matching elements under `root`
    /// as an array. Requires [`QUERY_HELPERS`] in scope.
    #[must_use]
    pub fn to_js(&self, root: &str) -> String {
        match self {
            Self::Role { role, name, exact } => {
                let name = name.as_deref().map_or_else(|| "null".to_string(), js_str);
                format!("__of.byRole({root}, {}, {name}, {exact})", js_str(role))
            }
            Self::Text { text, exact } => {
                format!("__of.byText({root}, {}, {exact})", js_str(text))
            }
            Self::Css(css) => format!("__of.css({root}, {})", js_str(css)),
            Self::Title(title) => format!("__of.byTitle({root}, {})", js_str(title)),
            Self::TestId(id) => {
                let css = format!("[data-testid={}]", js_str(id));
                format!("__of.css({root}, {})", js_str(&css))
            }
            Self::CssWithText { css, text } => format!(
                "__of.withText(__of.css({root}, {}), {})",
                js_str(css),
                js_str(text)
            ),
            Self::CssWithoutText(css) => {
                format!("__of.withoutText(__of.css({root}, {}))", js_str(css))
            }
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Role { role, name, exact } => match name {
                Some(name) if *exact => write!(f, "role={role}[name={name:?} exact]"),
                Some(name) => write!(f, "role={role}[name={name:?}]"),
                None => write!(f, "role={role}"),
            },
            Self::Text { text, exact: true } => write!(f, "text={text:?}"),
            Self::Text { text, exact: false } => write!(f, "text={text}"),
            Self::Css(css) => write!(f, "css={css}"),
            Self::Title(title) => write!(f, "title={title}"),
            Self::TestId(id) => write!(f, "testid={id}"),
            Self::CssWithText { css, text } => write!(f, "css={css} >> has-text={text:?}"),
            Self::CssWithoutText(css) => write!(f, "css={css} >> empty-text"),
        }
    }
}

/// JSON string literal, which is also a valid JavaScript string literal
fn js_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Query helpers referenced by [`Selector::to_js`].
///
/// Roles and accessible names are approximated from ARIA attributes and
/// tag semantics.
pub const QUERY_HELPERS: &str = r#"const __of = {
  norm(s) { return (s || '').replace(/\s+/g, ' ').trim(); },
  matches(value, wanted, exact) {
    if (wanted === null) return true;
    const v = __of.norm(value);
    return exact ? v === wanted : v.toLowerCase().includes(wanted.toLowerCase());
  },
  all(root) { return Array.from(root.querySelectorAll('*')); },
  css(root, sel) { return Array.from(root.querySelectorAll(sel)); },
  role(el) {
    const explicit = el.getAttribute('role');
    if (explicit) return explicit;
    const tag = el.tagName.toLowerCase();
    const type = (el.getAttribute('type') || '').toLowerCase();
    if (tag === 'button') return 'button';
    if (tag === 'input' && ['button', 'submit', 'reset', 'image'].includes(type)) return 'button';
    if (tag === 'input' && type === 'search') return 'searchbox';
    if (tag === 'textarea') return 'textbox';
    if (tag === 'input' && ['', 'text', 'email', 'password', 'tel', 'url'].includes(type)) return 'textbox';
    if (tag === 'a' && el.hasAttribute('href')) return 'link';
    if (tag === 'img') return 'img';
    if (/^h[1-6]$/.test(tag)) return 'heading';
    if (tag === 'table') return 'table';
    if (tag === 'tr') return 'row';
    if (tag === 'td') return 'cell';
    if (tag === 'ul' || tag === 'ol') return 'list';
    if (tag === 'li') return 'listitem';
    if (tag === 'fieldset') return 'group';
    if (tag === 'dialog') return 'dialog';
    return '';
  },
  name(el) {
    const labelled = el.getAttribute('aria-labelledby');
    if (labelled) {
      const text = labelled.split(/\s+/).map(id => {
        const ref = el.ownerDocument.getElementById(id);
        return ref ? ref.textContent : '';
      }).join(' ');
      if (__of.norm(text)) return text;
    }
    for (const attr of ['aria-label', 'alt', 'title', 'placeholder']) {
      const value = el.getAttribute(attr);
      if (value) return value;
    }
    if (el.labels && el.labels.length) return el.labels[0].textContent;
    return el.innerText || el.textContent || '';
  },
  byRole(root, role, name, exact) {
    return __of.all(root).filter(el => __of.role(el) === role && __of.matches(__of.name(el), name, exact));
  },
  byText(root, text, exact) {
    return __of.all(root).filter(el => {
      if (['SCRIPT', 'STYLE', 'HEAD'].includes(el.tagName)) return false;
      if (!__of.matches(el.innerText || el.textContent, text, exact)) return false;
      return !Array.from(el.children).some(c => __of.matches(c.innerText || c.textContent, text, exact));
    });
  },
  byTitle(root, title) {
    return __of.css(root, '[title]').filter(el => el.getAttribute('title').includes(title));
  },
  withText(els, text) { return els.filter(el => (el.textContent || '').includes(text)); },
  withoutText(els) { return els.filter(el => __of.norm(el.textContent) === ''); },
  frameDoc(frames) {
    const frame = frames[0];
    try { return frame && frame.contentDocument; } catch (e) { return null; }
  },
  visible(el) {
    if (!el || !el.isConnected) return false;
    const style = el.ownerDocument.defaultView.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 || rect.height > 0;
  },
};"#;

// =============================================================================
// TARGETS AND SCOPES
// =============================================================================

/// What a locator looks for: one selector or an ordered fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// A single selector
    Single(Selector),
    /// Alternatives tried in order; the first with a match wins
    Fallback(Vec<Selector>),
}

impl Target {
    /// Selectors in resolution order
    #[must_use]
    pub fn selectors(&self) -> &[Selector] {
        match self {
            Self::Single(selector) => std::slice::from_ref(selector),
            Self::Fallback(selectors) => selectors,
        }
    }
}

impl From<Selector> for Target {
    fn from(selector: Selector) -> Self {
        Self::Single(selector)
    }
}

/// Where a selector is evaluated: an optional iframe and an optional ancestor
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// Iframe whose document is searched
    pub frame: Option<Selector>,
    /// Ancestor elements the match must descend from
    pub within: Option<Selector>,
}

impl Scope {
    /// JavaScript expression yielding the elements matching `selector`
    /// in this scope, de-duplicated, in document order
    #[must_use]
    pub fn query_js(&self, selector: &Selector) -> String {
        let doc = self.frame.as_ref().map_or_else(
            || "document".to_string(),
            |frame| format!("__of.frameDoc({})", frame.to_js("document")),
        );
        let roots = self
            .within
            .as_ref()
            .map_or_else(|| "[doc]".to_string(), |within| within.to_js("doc"));
        format!(
            "(() => {{ const doc = {doc}; if (!doc) return []; \
             return [...new Set(({roots}).flatMap(root => {}))]; }})()",
            selector.to_js("root")
        )
    }

    fn describe(&self, selector: &Selector) -> String {
        let mut out = String::new();
        if let Some(frame) = &self.frame {
            out.push_str(&format!("frame[{frame}] >> "));
        }
        if let Some(within) = &self.within {
            out.push_str(&format!("{within} >> "));
        }
        out.push_str(&selector.to_string());
        out
    }
}

// =============================================================================
// ELEMENT REFERENCES
// =============================================================================

/// A resolved element, itself a description re-resolved on every use
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef {
    /// Scope the match was found in
    pub scope: Scope,
    /// The selector that matched
    pub selector: Selector,
    /// Index among the selector's matches
    pub index: usize,
}

impl ElementRef {
    /// JavaScript expression yielding the element, or `undefined`
    #[must_use]
    pub fn to_js(&self) -> String {
        format!("({})[{}]", self.scope.query_js(&self.selector), self.index)
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scope.describe(&self.selector))?;
        if self.index > 0 {
            write!(f, " >> nth={}", self.index)?;
        }
        Ok(())
    }
}

/// Whether an expected element is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presence {
    /// Attached and visible
    Found(ElementRef),
    /// Absent or hidden
    NotFound,
}

impl Presence {
    /// Whether the element was found
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

// =============================================================================
// LOCATOR
// =============================================================================

/// A logical UI target, resolved lazily against a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    target: Target,
    scope: Scope,
    index: usize,
    timeout_ms: u64,
}

impl Locator {
    /// Create a locator for a target
    #[must_use]
    pub fn new(target: impl Into<Target>) -> Self {
        Self {
            target: target.into(),
            scope: Scope::default(),
            index: 0,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Locator for a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Selector::css(selector))
    }

    /// Locator for a role with a substring name match
    #[must_use]
    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Selector::role(role, name))
    }

    /// Locator for a role with an exact name match
    #[must_use]
    pub fn role_exact(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(Selector::role_exact(role, name))
    }

    /// Locator for substring text
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Selector::text(text))
    }

    /// Locator for exact text
    #[must_use]
    pub fn text_exact(text: impl Into<String>) -> Self {
        Self::new(Selector::text_exact(text))
    }

    /// Locator for a title attribute
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self::new(Selector::title(title))
    }

    /// Locator trying each selector in order
    #[must_use]
    pub fn any_of(selectors: impl IntoIterator<Item = Selector>) -> Self {
        Self::new(Target::Fallback(selectors.into_iter().collect()))
    }

    /// Select the first match (the default)
    #[must_use]
    pub const fn first(mut self) -> Self {
        self.index = 0;
        self
    }

    /// Select the match at `index`
    #[must_use]
    pub const fn nth(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Resolve inside the document of the iframe matched by `frame`
    #[must_use]
    pub fn in_frame(mut self, frame: Selector) -> Self {
        self.scope.frame = Some(frame);
        self
    }

    /// Resolve among descendants of elements matched by `ancestor`
    #[must_use]
    pub fn within(mut self, ancestor: Selector) -> Self {
        self.scope.within = Some(ancestor);
        self
    }

    /// Set the auto-wait timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// The target
    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// The scope
    #[must_use]
    pub const fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Index among matches
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Auto-wait timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Every descriptor tried during resolution, scope included
    #[must_use]
    pub fn descriptors(&self) -> Vec<String> {
        self.target
            .selectors()
            .iter()
            .map(|selector| self.element(selector).to_string())
            .collect()
    }

    // -------------------------------------------------------------------------
    // Conditions
    // -------------------------------------------------------------------------

    /// Condition: this locator is visible
    #[must_use]
    pub fn visible(&self) -> WaitCondition {
        WaitCondition::Visible(self.clone())
    }

    /// Condition: this locator is hidden or detached
    #[must_use]
    pub fn hidden(&self) -> WaitCondition {
        WaitCondition::Hidden(self.clone())
    }

    /// Condition: this locator is attached
    #[must_use]
    pub fn attached(&self) -> WaitCondition {
        WaitCondition::Attached(self.clone())
    }

    /// Condition: this locator is detached
    #[must_use]
    pub fn detached(&self) -> WaitCondition {
        WaitCondition::Detached(self.clone())
    }

    /// Condition: this locator's text contains `text`
    #[must_use]
    pub fn contains_text(&self, text: impl Into<String>) -> WaitCondition {
        WaitCondition::TextContains(self.clone(), text.into())
    }

    // -------------------------------------------------------------------------
    // Resolution
    // -------------------------------------------------------------------------

    fn element(&self, selector: &Selector) -> ElementRef {
        ElementRef {
            scope: self.scope.clone(),
            selector: selector.clone(),
            index: self.index,
        }
    }

    fn wait_options(&self) -> WaitOptions {
        WaitOptions::within(self.timeout_ms)
    }

    fn not_found(&self) -> FlowError {
        FlowError::ElementNotFound {
            attempted: self.descriptors(),
        }
    }

    /// First alternative with an attached match, checked once
    pub(crate) async fn attached_now<P: PageDriver>(&self, page: &P) -> Option<ElementRef> {
        for selector in self.target.selectors() {
            match page.count(&self.scope, selector).await {
                Ok(count) if count > self.index => return Some(self.element(selector)),
                Ok(_) => {}
                Err(e) => debug!(%selector, error = %e, "query failed"),
            }
        }
        None
    }

    /// First alternative with a visible match, checked once
    pub(crate) async fn visible_now<P: PageDriver>(&self, page: &P) -> Option<ElementRef> {
        for selector in self.target.selectors() {
            let element = self.element(selector);
            if page.is_visible(&element).await.unwrap_or(false) {
                return Some(element);
            }
        }
        None
    }

    /// Text of the first attached alternative, checked once
    pub(crate) async fn text_now<P: PageDriver>(&self, page: &P) -> Option<String> {
        let element = self.attached_now(page).await?;
        page.inner_text(&element).await.ok()
    }

    /// Resolve to the first attached match, waiting up to the locator timeout
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` listing every descriptor tried
    pub async fn resolve<P: PageDriver>(&self, page: &P) -> FlowResult<ElementRef> {
        poll_for(&self.wait_options(), || self.attached_now(page))
            .await
            .ok_or_else(|| self.not_found())
    }

    /// Resolve to the first visible match, waiting up to the locator timeout
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` when nothing is attached, or
    /// `ConditionTimedOut` when a match is attached but never shown
    pub async fn resolve_visible<P: PageDriver>(&self, page: &P) -> FlowResult<ElementRef> {
        if let Some(element) = poll_for(&self.wait_options(), || self.visible_now(page)).await {
            return Ok(element);
        }
        if self.attached_now(page).await.is_some() {
            return Err(FlowError::ConditionTimedOut {
                condition: format!("{self} to be visible"),
                ms: self.timeout_ms,
            });
        }
        Err(self.not_found())
    }

    /// Check presence once, without waiting
    pub async fn probe<P: PageDriver>(&self, page: &P) -> Presence {
        self.visible_now(page)
            .await
            .map_or(Presence::NotFound, Presence::Found)
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Click once the element is visible
    pub async fn click<P: PageDriver>(&self, page: &P) -> FlowResult<()> {
        let element = self.resolve_visible(page).await?;
        page.click(&element, ClickCount::Single).await
    }

    /// Double-click once the element is visible
    pub async fn dblclick<P: PageDriver>(&self, page: &P) -> FlowResult<()> {
        let element = self.resolve_visible(page).await?;
        page.click(&element, ClickCount::Double).await
    }

    /// Fill once the element is visible
    pub async fn fill<P: PageDriver>(&self, page: &P, value: &str) -> FlowResult<()> {
        let element = self.resolve_visible(page).await?;
        page.fill(&element, value).await
    }

    /// Press a key with the element focused
    pub async fn press<P: PageDriver>(&self, page: &P, key: &str) -> FlowResult<()> {
        let element = self.resolve_visible(page).await?;
        page.press(&element, key).await
    }

    /// Rendered text of the first attached match
    pub async fn inner_text<P: PageDriver>(&self, page: &P) -> FlowResult<String> {
        let element = self.resolve(page).await?;
        page.inner_text(&element).await
    }

    /// Attribute of the first attached match
    pub async fn attribute<P: PageDriver>(&self, page: &P, name: &str) -> FlowResult<Option<String>> {
        let element = self.resolve(page).await?;
        page.attribute(&element, name).await
    }

    /// Number of matches of the first alternative that has any
    pub async fn count<P: PageDriver>(&self, page: &P) -> FlowResult<usize> {
        for selector in self.target.selectors() {
            let count = page.count(&self.scope, selector).await?;
            if count > 0 {
                return Ok(count);
            }
        }
        Ok(0)
    }

    /// Text of every match of the first alternative that has any
    pub async fn all_inner_texts<P: PageDriver>(&self, page: &P) -> FlowResult<Vec<String>> {
        for selector in self.target.selectors() {
            let count = page.count(&self.scope, selector).await?;
            if count == 0 {
                continue;
            }
            let mut texts = Vec::with_capacity(count);
            for index in 0..count {
                let element = ElementRef {
                    scope: self.scope.clone(),
                    selector: selector.clone(),
                    index,
                };
                texts.push(page.inner_text(&element).await?);
            }
            return Ok(texts);
        }
        Ok(Vec::new())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.descriptors().join(" | "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage};

    const SEARCH_SKINS: [&str; 3] = [
        r#"input[aria-label="Search"]"#,
        r#"input[data-id="searchBox"]"#,
        "input#crmTopBarSearchBox",
    ];

    fn search_box() -> Locator {
        Locator::any_of(SEARCH_SKINS.iter().map(|css| Selector::css(*css))).with_timeout(200)
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_display_formats() {
            assert_eq!(Selector::css("#page_0").to_string(), "css=#page_0");
            assert_eq!(
                Selector::role("button", "Next").to_string(),
                r#"role=button[name="Next"]"#
            );
            assert_eq!(
                Selector::role_exact("button", "Save Job").to_string(),
                r#"role=button[name="Save Job" exact]"#
            );
            assert_eq!(Selector::text_exact("Jobs").to_string(), r#"text="Jobs""#);
            assert_eq!(Selector::any_role("row").to_string(), "role=row");
        }

        #[test]
        fn test_to_js_escapes_strings() {
            let js = Selector::role("gridcell", r#"'6"x18'8" Screen Kit"#).to_js("root");
            assert!(js.starts_with("__of.byRole(root, \"gridcell\""));
            assert!(js.contains(r#"\"x18'8\""#));
            assert!(js.ends_with("false)"));
        }

        #[test]
        fn test_to_js_role_without_name() {
            let js = Selector::any_role("row").to_js("doc");
            assert_eq!(js, r#"__of.byRole(doc, "row", null, false)"#);
        }

        #[test]
        fn test_test_id_js() {
            let js = Selector::test_id("search-result").to_js("root");
            assert!(js.contains("data-testid"));
            assert!(js.starts_with("__of.css(root"));
        }

        #[test]
        fn test_query_helpers_define_every_function() {
            for name in ["byRole", "byText", "byTitle", "css", "withText", "withoutText", "frameDoc"] {
                assert!(QUERY_HELPERS.contains(&format!("{name}(")), "missing {name}");
            }
        }
    }

    mod scope_tests {
        use super::*;

        #[test]
        fn test_frame_scoped_query() {
            let scope = Scope {
                frame: Some(Selector::css(r#"iframe[title*="Orders"]"#)),
                within: None,
            };
            let js = scope.query_js(&Selector::role("img", "Add new Order"));
            assert!(js.contains("__of.frameDoc(__of.css(document"));
            assert!(js.contains("[doc]"));
        }

        #[test]
        fn test_descriptor_includes_scope_and_index() {
            let locator = Locator::new(Selector::any_role("link"))
                .within(Selector::role("list", "Venue"))
                .nth(2);
            assert_eq!(
                locator.descriptors(),
                vec![r#"role=list[name="Venue"] >> role=link >> nth=2"#.to_string()]
            );
        }
    }

    mod resolve_tests {
        use super::*;

        #[tokio::test]
        async fn test_fallback_picks_first_matching_alternative() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::css(SEARCH_SKINS[2])));
            page.insert(MockElement::new(Selector::css(SEARCH_SKINS[1])));

            let element = search_box().resolve(&page).await.unwrap();
            assert_eq!(element.selector, Selector::css(SEARCH_SKINS[1]));
        }

        #[tokio::test]
        async fn test_not_found_lists_every_descriptor() {
            let page = MockPage::new("about:blank");
            let err = search_box().resolve(&page).await.unwrap_err();
            match err {
                FlowError::ElementNotFound { attempted } => {
                    assert_eq!(attempted.len(), 3);
                    assert!(attempted[0].contains("aria-label"));
                    assert!(attempted[2].contains("crmTopBarSearchBox"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_resolution_is_idempotent() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::css("#oeJobGrid")));
            let grid = Locator::css("#oeJobGrid");

            let first = grid.resolve(&page).await.unwrap();
            let second = grid.resolve(&page).await.unwrap();
            assert_eq!(first, second);
        }

        #[tokio::test]
        async fn test_nth_requires_enough_matches() {
            let page = MockPage::new("about:blank");
            let empty_button = Selector::css_without_text("button");
            for _ in 0..5 {
                page.insert(MockElement::new(empty_button.clone()));
            }
            let fifth = Locator::new(empty_button.clone()).nth(4).with_timeout(50);
            let sixth = Locator::new(empty_button).nth(5).with_timeout(50);

            assert_eq!(fifth.resolve(&page).await.unwrap().index, 4);
            assert!(sixth.resolve(&page).await.is_err());
        }

        #[tokio::test]
        async fn test_hidden_match_times_out_on_visibility() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::css("#jobDatePanel")).hidden());
            let err = Locator::css("#jobDatePanel")
                .with_timeout(50)
                .resolve_visible(&page)
                .await
                .unwrap_err();
            assert!(matches!(err, FlowError::ConditionTimedOut { ms: 50, .. }));
        }

        #[tokio::test]
        async fn test_frame_scope_isolates_matches() {
            let page = MockPage::new("about:blank");
            let frame = Selector::css(r#"iframe[title*="Orders"]"#);
            page.insert(MockElement::new(Selector::role("img", "Add new Order")).in_frame(frame.clone()));

            let outside = Locator::role("img", "Add new Order").with_timeout(50);
            let inside = outside.clone().in_frame(frame);
            assert!(outside.resolve(&page).await.is_err());
            assert!(inside.resolve(&page).await.is_ok());
        }
    }

    mod probe_tests {
        use super::*;

        #[tokio::test]
        async fn test_probe_reports_absence_as_value() {
            let page = MockPage::new("about:blank");
            let presence = Locator::text("JBS Automation").probe(&page).await;
            assert_eq!(presence, Presence::NotFound);
        }

        #[tokio::test]
        async fn test_probe_ignores_hidden_elements() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::role("tab", "Parameters")).hidden());
            assert!(!Locator::role("tab", "Parameters").probe(&page).await.is_found());
            page.set_visible(&Selector::role("tab", "Parameters"), true);
            assert!(Locator::role("tab", "Parameters").probe(&page).await.is_found());
        }
    }

    mod action_tests {
        use super::*;

        #[tokio::test]
        async fn test_fill_and_press_reach_resolved_element() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::new(Selector::css(SEARCH_SKINS[0])));

            let search = search_box();
            search.fill(&page, "OP15296451").await.unwrap();
            search.press(&page, "Enter").await.unwrap();

            assert_eq!(
                page.value_of(&Selector::css(SEARCH_SKINS[0])).as_deref(),
                Some("OP15296451")
            );
            let events = page.events();
            assert!(events.iter().any(|e| e.starts_with("press:") && e.ends_with(":Enter")));
        }

        #[tokio::test]
        async fn test_all_inner_texts() {
            let page = MockPage::new("about:blank");
            let row = Selector::any_role("row");
            page.insert(MockElement::new(row.clone()).with_text("Order 1"));
            page.insert(MockElement::new(row.clone()).with_text("Order 2"));

            let texts = Locator::new(row).all_inner_texts(&page).await.unwrap();
            assert_eq!(texts, vec!["Order 1".to_string(), "Order 2".to_string()]);
        }
    }
}
