//! Scriptable in-memory page.
//!
//! A [`MockPage`] holds a flat list of elements keyed by selector and
//! scope, plus scripted reactions to clicks, navigations and reloads.
//! Clones share state, so a test can keep a handle and mutate the page
//! while a flow drives it.
//!
//! Popups opened by a click reaction are delivered synchronously, and only
//! to listeners armed before the click. A popup with no armed listener is
//! lost, as it would be in a browser with nobody awaiting the event.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::{ClickCount, PageDriver, Popup, PopupListener};
use crate::locator::{ElementRef, Locator, Scope, Selector};
use crate::result::{FlowError, FlowResult};
use crate::wait::{LoadState, NavigationOptions};

/// Operations that can be scripted to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `goto`
    Goto,
    /// `reload`
    Reload,
    /// `click` (single or double)
    Click,
    /// `fill`
    Fill,
}

/// An element in a mock document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    scope: Scope,
    selector: Selector,
    visible: bool,
    text: String,
    attributes: HashMap<String, String>,
}

impl MockElement {
    /// A visible element matched by `selector`
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            scope: Scope::default(),
            selector,
            visible: true,
            text: String::new(),
            attributes: HashMap::new(),
        }
    }

    /// An element matched by the first alternative of `locator`, in its scope
    #[must_use]
    pub fn for_locator(locator: &Locator) -> Self {
        let selector = locator
            .target()
            .selectors()
            .first()
            .cloned()
            .unwrap_or_else(|| Selector::css("*"));
        Self {
            scope: locator.scope().clone(),
            ..Self::new(selector)
        }
    }

    /// Set rendered text
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attach without showing
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Place inside the iframe matched by `frame`
    #[must_use]
    pub fn in_frame(mut self, frame: Selector) -> Self {
        self.scope.frame = Some(frame);
        self
    }

    /// Place under the ancestor matched by `ancestor`
    #[must_use]
    pub fn within(mut self, ancestor: Selector) -> Self {
        self.scope.within = Some(ancestor);
        self
    }

    fn matches(&self, scope: &Scope, selector: &Selector) -> bool {
        &self.scope == scope && &self.selector == selector
    }
}

/// A scripted change applied when an operation fires
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Change the current URL
    Navigate(String),
    /// Add an element
    Insert(MockElement),
    /// Show every element matching the selector
    Show(Selector),
    /// Hide every element matching the selector
    Hide(Selector),
    /// Remove every element matching the selector
    Remove(Selector),
    /// Replace the text of every element matching the selector
    SetText(Selector, String),
    /// Open a popup, delivered to armed listeners
    OpenPopup(MockPage),
    /// Fail the operation after applying earlier reactions
    Fail(String),
}

/// Queue of reaction sets; each firing consumes the front, the last one sticks
#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<Vec<Reaction>>,
}

impl Script {
    fn push(&mut self, reactions: Vec<Reaction>) {
        self.queue.push_back(reactions);
    }

    fn next(&mut self) -> Vec<Reaction> {
        if self.queue.len() > 1 {
            self.queue.pop_front().unwrap_or_default()
        } else {
            self.queue.front().cloned().unwrap_or_default()
        }
    }
}

#[derive(Debug)]
struct MockState {
    url: String,
    load_state: LoadState,
    elements: Vec<MockElement>,
    values: HashMap<Selector, String>,
    predicates: HashMap<String, bool>,
    on_click: HashMap<Selector, Script>,
    on_goto: Script,
    on_reload: Script,
    failures: HashMap<Operation, u32>,
    listeners: Vec<mpsc::UnboundedSender<Popup<MockPage>>>,
    events: Vec<String>,
    closed: bool,
}

impl MockState {
    fn new(url: String) -> Self {
        Self {
            url,
            load_state: LoadState::NetworkIdle,
            elements: Vec::new(),
            values: HashMap::new(),
            predicates: HashMap::new(),
            on_click: HashMap::new(),
            on_goto: Script::default(),
            on_reload: Script::default(),
            failures: HashMap::new(),
            listeners: Vec::new(),
            events: Vec::new(),
            closed: false,
        }
    }

    fn find(&self, element: &ElementRef) -> Option<&MockElement> {
        self.elements
            .iter()
            .filter(|e| e.matches(&element.scope, &element.selector))
            .nth(element.index)
    }

    fn require(&self, element: &ElementRef) -> FlowResult<&MockElement> {
        self.find(element).ok_or_else(|| FlowError::ElementNotFound {
            attempted: vec![element.to_string()],
        })
    }

    fn take_failure(&mut self, operation: Operation) -> bool {
        match self.failures.get_mut(&operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn apply(&mut self, reactions: Vec<Reaction>) -> FlowResult<()> {
        for reaction in reactions {
            match reaction {
                Reaction::Navigate(url) => self.url = url,
                Reaction::Insert(element) => self.elements.push(element),
                Reaction::Show(selector) => self.set_visible(&selector, true),
                Reaction::Hide(selector) => self.set_visible(&selector, false),
                Reaction::Remove(selector) => self.elements.retain(|e| e.selector != selector),
                Reaction::SetText(selector, text) => {
                    for element in self.elements.iter_mut().filter(|e| e.selector == selector) {
                        element.text.clone_from(&text);
                    }
                }
                Reaction::OpenPopup(popup) => {
                    let url = popup.current_url();
                    self.listeners.retain(|tx| !tx.is_closed());
                    for tx in &self.listeners {
                        let _ = tx.send(Popup {
                            url: url.clone(),
                            page: popup.clone(),
                        });
                    }
                    self.events.push(format!("popup:{url}"));
                }
                Reaction::Fail(message) => return Err(FlowError::driver(message)),
            }
        }
        Ok(())
    }

    fn set_visible(&mut self, selector: &Selector, visible: bool) {
        for element in self.elements.iter_mut().filter(|e| &e.selector == selector) {
            element.visible = visible;
        }
    }
}

/// Scriptable in-memory page
#[derive(Debug, Clone)]
pub struct MockPage {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

impl MockPage {
    /// Create a page at `url`, fully loaded
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(url.into()))),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Scripting
    // -------------------------------------------------------------------------

    /// Add an element
    pub fn insert(&self, element: MockElement) {
        self.state().elements.push(element);
    }

    /// Insert visible copies of `locator`'s first alternative until its
    /// index resolves
    pub fn insert_for(&self, locator: &Locator) {
        let element = MockElement::for_locator(locator);
        let mut state = self.state();
        let present = state
            .elements
            .iter()
            .filter(|e| e.matches(&element.scope, &element.selector))
            .count();
        for _ in present..=locator.index() {
            state.elements.push(element.clone());
        }
    }

    /// Remove every element matching `selector`
    pub fn remove(&self, selector: &Selector) {
        self.state().elements.retain(|e| &e.selector != selector);
    }

    /// Show or hide every element matching `selector`
    pub fn set_visible(&self, selector: &Selector, visible: bool) {
        self.state().set_visible(selector, visible);
    }

    /// Set the current URL
    pub fn set_url(&self, url: impl Into<String>) {
        self.state().url = url.into();
    }

    /// Set the load state the document has reached
    pub fn set_load_state(&self, state: LoadState) {
        self.state().load_state = state;
    }

    /// Set the result of evaluating `script`
    pub fn set_predicate(&self, script: impl Into<String>, value: bool) {
        self.state().predicates.insert(script.into(), value);
    }

    /// Queue reactions for the next click on `selector`
    pub fn on_click(&self, selector: Selector, reactions: Vec<Reaction>) {
        self.state()
            .on_click
            .entry(selector)
            .or_default()
            .push(reactions);
    }

    /// Queue reactions for the next navigation
    pub fn on_goto(&self, reactions: Vec<Reaction>) {
        self.state().on_goto.push(reactions);
    }

    /// Queue reactions for the next reload
    pub fn on_reload(&self, reactions: Vec<Reaction>) {
        self.state().on_reload.push(reactions);
    }

    /// Make the next `times` calls of `operation` fail
    pub fn fail_next(&self, operation: Operation, times: u32) {
        self.state().failures.insert(operation, times);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    /// Operations performed, in order
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    /// Number of recorded events starting with `prefix`
    #[must_use]
    pub fn count_events(&self, prefix: &str) -> usize {
        self.state()
            .events
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Value last filled into elements matching `selector`
    #[must_use]
    pub fn value_of(&self, selector: &Selector) -> Option<String> {
        self.state().values.get(selector).cloned()
    }

    /// Current URL without going through the driver
    #[must_use]
    pub fn current_url(&self) -> String {
        self.state().url.clone()
    }

    /// Whether the page has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn goto(&self, url: &str, _options: &NavigationOptions) -> FlowResult<()> {
        let mut state = self.state();
        state.events.push(format!("goto:{url}"));
        if state.take_failure(Operation::Goto) {
            return Err(FlowError::Navigation {
                url: url.to_string(),
                message: "scripted navigation failure".to_string(),
            });
        }
        state.url = url.to_string();
        let reactions = state.on_goto.next();
        state.apply(reactions)
    }

    async fn reload(&self, _options: &NavigationOptions) -> FlowResult<()> {
        let mut state = self.state();
        state.events.push("reload".to_string());
        if state.take_failure(Operation::Reload) {
            return Err(FlowError::driver("scripted reload failure"));
        }
        let reactions = state.on_reload.next();
        state.apply(reactions)
    }

    async fn url(&self) -> FlowResult<String> {
        Ok(self.current_url())
    }

    async fn reached(&self, state: LoadState) -> FlowResult<bool> {
        Ok(self.state().load_state.includes(state))
    }

    async fn count(&self, scope: &Scope, selector: &Selector) -> FlowResult<usize> {
        Ok(self
            .state()
            .elements
            .iter()
            .filter(|e| e.matches(scope, selector))
            .count())
    }

    async fn is_visible(&self, element: &ElementRef) -> FlowResult<bool> {
        Ok(self.state().find(element).is_some_and(|e| e.visible))
    }

    async fn click(&self, element: &ElementRef, clicks: ClickCount) -> FlowResult<()> {
        let mut state = self.state();
        if !state.require(element)?.visible {
            return Err(FlowError::driver(format!("{element} is not visible")));
        }
        let verb = match clicks {
            ClickCount::Single => "click",
            ClickCount::Double => "dblclick",
        };
        state.events.push(format!("{verb}:{element}"));
        if state.take_failure(Operation::Click) {
            return Err(FlowError::driver(format!("scripted click failure on {element}")));
        }
        let reactions = state
            .on_click
            .get_mut(&element.selector)
            .map(Script::next)
            .unwrap_or_default();
        state.apply(reactions)
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> FlowResult<()> {
        let mut state = self.state();
        state.require(element)?;
        state.events.push(format!("fill:{element}={value}"));
        if state.take_failure(Operation::Fill) {
            return Err(FlowError::driver(format!("scripted fill failure on {element}")));
        }
        state.values.insert(element.selector.clone(), value.to_string());
        Ok(())
    }

    async fn press(&self, element: &ElementRef, key: &str) -> FlowResult<()> {
        let mut state = self.state();
        state.require(element)?;
        state.events.push(format!("press:{element}:{key}"));
        Ok(())
    }

    async fn inner_text(&self, element: &ElementRef) -> FlowResult<String> {
        let state = self.state();
        let found = state.require(element)?;
        Ok(state
            .values
            .get(&element.selector)
            .cloned()
            .unwrap_or_else(|| found.text.clone()))
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> FlowResult<Option<String>> {
        Ok(self.state().require(element)?.attributes.get(name).cloned())
    }

    async fn evaluate_predicate(&self, script: &str) -> FlowResult<bool> {
        Ok(self.state().predicates.get(script).copied().unwrap_or(false))
    }

    async fn arm_popups(&self) -> FlowResult<PopupListener<Self>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        state.listeners.push(tx);
        state.events.push("arm_popups".to_string());
        Ok(PopupListener::new(rx))
    }

    async fn close(&self) -> FlowResult<()> {
        let mut state = self.state();
        state.closed = true;
        state.events.push("close".to_string());
        Ok(())
    }
}
