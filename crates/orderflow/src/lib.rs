//! Orderflow: retry-governed browser flows for a CRM order workflow
//!
//! Drives a CRM from sign-in through opportunity search, order creation in
//! the order system popup, job insertion and report generation, recording
//! the identifiers captured along the way.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                     ORDERFLOW Architecture                     │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐ │
//! │  │ Scenarios │──►│ Page       │──►│ Locator  │──►│ Page     │ │
//! │  │ (steps)   │   │ objects    │   │ + Wait   │   │ driver   │ │
//! │  └───────────┘   └────────────┘   └──────────┘   └──────────┘ │
//! │        │               │                              │       │
//! │        ▼               ▼                              ▼       │
//! │  ┌───────────┐   ┌────────────┐               ┌────────────┐  │
//! │  │ State +   │   │ Retry +    │               │ Chromium / │  │
//! │  │ store     │   │ popups     │               │ mock       │  │
//! │  └───────────┘   └────────────┘               └────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use orderflow::prelude::*;
//!
//! let config = SuiteConfig::load("orderflow.yaml")?;
//! let credentials = Credentials::from_env()?;
//! let browser = Browser::launch(&config.browser).await?;
//! let page = browser.new_page().await?;
//! let store = JsonFileStore::new(config.records_path());
//! let report = complete_order_flow(&page, &credentials, &config, &store).await?;
//! println!("{}", report.state.order_number);
//! ```

#![cfg_attr(test, allow(clippy::large_stack_frames))]

pub mod config;
pub mod driver;
pub mod flow;
pub mod locator;
pub mod pages;
pub mod popup;
pub mod result;
pub mod retry;
pub mod scenarios;
pub mod state;
pub mod store;
pub mod url;
pub mod wait;

#[cfg(feature = "browser")]
pub use driver::{Browser, ChromiumPage};
pub use config::{BrowserConfig, Credentials, ScenarioData, SuiteConfig, Timeouts};
pub use driver::{MockElement, MockPage, PageDriver};
pub use flow::{Scenario, ScenarioReport, StepOutcome, StepPolicy, StepRecord};
pub use locator::{ElementRef, Locator, Presence, Selector, Target};
pub use popup::{acquire_frame, acquire_popup, AcquireOptions, FrameScope};
pub use result::{FlowError, FlowResult};
pub use retry::{open_with_retry, Recovery, RetryPolicy};
pub use scenarios::{complete_order_flow, ScenarioKind};
pub use state::{RunStatus, ScenarioState};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
pub use url::UrlPattern;
pub use wait::{wait_for, LoadState, NavigationOptions, WaitCondition, WaitOptions};

/// Prelude for convenient imports
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::{Browser, ChromiumPage};
    pub use super::{
        complete_order_flow, AcquireOptions, Credentials, FlowError, FlowResult, JsonFileStore,
        Locator, PageDriver, Presence, RecordStore, RetryPolicy, RunStatus, Scenario,
        ScenarioKind, ScenarioReport, ScenarioState, Selector, StepPolicy, SuiteConfig,
        WaitCondition, WaitOptions,
    };
}
