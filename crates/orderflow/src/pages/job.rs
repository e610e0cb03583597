//! Job insertion, catalog items and the job grid.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Timeouts;
use crate::driver::PageDriver;
use crate::locator::{Locator, Selector};
use crate::result::FlowResult;
use crate::url::job_number_from_grid;
use crate::wait::{settle, wait_for, WaitCondition, WaitOptions};

/// Pause after saving, while the grid refreshes
const SAVE_SETTLE_MS: u64 = 3000;

/// Grid text length below which the grid is still loading
const GRID_CONTENT_MIN_LEN: usize = 100;

/// One interaction with the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    /// Click an element
    Click(Locator),
    /// Double-click an element (adds a catalog row to the job)
    DoubleClick(Locator),
}

impl Pick {
    fn gridcell(name: &str) -> Locator {
        Locator::role("gridcell", name)
    }

    /// The element this pick acts on
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        match self {
            Self::Click(locator) | Self::DoubleClick(locator) => locator,
        }
    }
}

/// Catalog category in the item picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    AvEquipment,
    VideoEquipment,
    Freight,
    ScenicDisplay,
    Additional,
}

impl Category {
    /// Every category, in the order items are added
    pub const ALL: [Self; 5] = [
        Self::AvEquipment,
        Self::VideoEquipment,
        Self::Freight,
        Self::ScenicDisplay,
        Self::Additional,
    ];

    /// Button that opens the category
    #[must_use]
    pub fn button(self) -> Locator {
        match self {
            Self::AvEquipment => Locator::new(Selector::css_without_text("button")).nth(4),
            Self::VideoEquipment => Locator::new(Selector::css_without_text("button")).nth(5),
            Self::Freight => Locator::css(".btn-group-vertical > button:nth-child(3)"),
            Self::ScenicDisplay => Locator::css("button:nth-child(4)").first(),
            Self::Additional => Locator::css("button:nth-child(5)"),
        }
    }

    /// Item picks made once the category is open
    #[must_use]
    pub fn picks(self) -> Vec<Pick> {
        match self {
            Self::AvEquipment => vec![
                Pick::Click(Pick::gridcell("Deluxe LCD Projection Package")),
                Pick::DoubleClick(Pick::gridcell("Deluxe LCD Projection Package")),
                Pick::Click(Locator::role("button", "OK")),
                Pick::Click(Pick::gridcell("Allen & Heath ZED10")),
                Pick::DoubleClick(Pick::gridcell("Audix OM2")),
                Pick::DoubleClick(Pick::gridcell("Belkin Meeting Room Power")),
                Pick::DoubleClick(Pick::gridcell("Lenovo T460s Touch Laptop")),
                Pick::DoubleClick(Pick::gridcell("House Sound System Patch -")),
            ],
            Self::VideoEquipment => vec![
                Pick::Click(Pick::gridcell("Camera")),
                Pick::DoubleClick(Pick::gridcell("Camera")),
            ],
            Self::Freight => vec![
                Pick::Click(Pick::gridcell("Air Freight")),
                Pick::DoubleClick(Pick::gridcell("Air Freight")),
            ],
            Self::ScenicDisplay => vec![Pick::DoubleClick(Pick::gridcell(
                "'6\"x18'8\" Screen Kit - Front Projection",
            ))],
            Self::Additional => vec![Pick::Click(Pick::gridcell("01C Mix Scenery Set Kit"))],
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AvEquipment => "AV equipment",
            Self::VideoEquipment => "video equipment",
            Self::Freight => "freight",
            Self::ScenicDisplay => "scenic/display",
            Self::Additional => "additional",
        };
        write!(f, "{name}")
    }
}

/// Jobs area of an order
#[derive(Debug)]
pub struct JobPage<'a, P> {
    page: &'a P,
    timeouts: &'a Timeouts,
}

impl<'a, P: PageDriver> JobPage<'a, P> {
    #[must_use]
    pub const fn new(page: &'a P, timeouts: &'a Timeouts) -> Self {
        Self { page, timeouts }
    }

    #[must_use]
    pub fn jobs_tab() -> Locator {
        Locator::text_exact("Jobs")
    }

    #[must_use]
    pub fn job_actions() -> Locator {
        Locator::role("button", "Job Actions")
    }

    #[must_use]
    pub fn insert_job() -> Locator {
        Locator::text("Insert Job")
    }

    #[must_use]
    pub fn job_date_panel() -> Locator {
        Locator::css("#jobDatePanel")
    }

    #[must_use]
    pub fn items_link() -> Locator {
        Locator::role("link", "Items")
    }

    #[must_use]
    pub fn save_job_button() -> Locator {
        Locator::role_exact("button", "Save Job")
    }

    /// "Save" in the Job Actions menu
    #[must_use]
    pub fn save_menu_item() -> Locator {
        Locator::text_exact("Save")
    }

    /// Jobs link that returns to the grid after saving
    #[must_use]
    pub fn jobs_link() -> Locator {
        Locator::text("Jobs")
    }

    #[must_use]
    pub fn job_grid() -> Locator {
        Locator::css("#oeJobGrid")
    }

    /// Script testing that the grid holds more than placeholder text
    #[must_use]
    pub fn grid_populated_script() -> String {
        format!(
            "(() => {{ const grid = document.querySelector('#oeJobGrid'); \
             return !!grid && !!grid.innerText && grid.innerText.trim().length > {GRID_CONTENT_MIN_LEN}; }})()"
        )
    }

    fn element(&self, locator: Locator) -> Locator {
        locator.with_timeout(self.timeouts.element_ms)
    }

    async fn wait_and_click(&self, locator: Locator) -> FlowResult<()> {
        let locator = self.element(locator);
        wait_for(
            self.page,
            &locator.visible(),
            &WaitOptions::within(self.timeouts.element_ms),
        )
        .await?;
        locator.click(self.page).await
    }

    /// Jobs tab, Job Actions, Insert Job, date panel, Items
    ///
    /// # Errors
    ///
    /// Returns the first element that never shows
    pub async fn insert_new_job(&self) -> FlowResult<()> {
        self.element(Self::jobs_tab()).click(self.page).await?;
        self.wait_and_click(Self::job_actions()).await?;
        self.element(Self::insert_job()).click(self.page).await?;
        self.wait_and_click(Self::job_date_panel()).await?;
        self.wait_and_click(Self::items_link()).await?;
        info!("job inserted, item picker open");
        Ok(())
    }

    /// Open `category` and make its picks
    ///
    /// # Errors
    ///
    /// Returns the first pick that cannot be made
    pub async fn add_items(&self, category: Category) -> FlowResult<()> {
        self.element(category.button()).click(self.page).await?;
        for pick in category.picks() {
            match pick {
                Pick::Click(locator) => self.element(locator).click(self.page).await?,
                Pick::DoubleClick(locator) => self.element(locator).dblclick(self.page).await?,
            }
        }
        info!(%category, "items added");
        Ok(())
    }

    /// Save the job, falling back to the Job Actions menu
    ///
    /// # Errors
    ///
    /// Returns the fallback's failure when both routes fail
    pub async fn save(&self) -> FlowResult<()> {
        match self.element(Self::save_job_button()).click(self.page).await {
            Ok(()) => settle(SAVE_SETTLE_MS).await,
            Err(e) => {
                warn!(error = %e, "Save Job button unavailable, using Job Actions menu");
                self.wait_and_click(Self::job_actions()).await?;
                self.wait_and_click(Self::save_menu_item()).await?;
            }
        }
        info!("job saved");
        Ok(())
    }

    /// Return to the job grid and read the job number.
    ///
    /// A grid without a four-digit run yields an empty string.
    ///
    /// # Errors
    ///
    /// Returns a wait timeout if the grid never populates
    pub async fn read_job_number(&self) -> FlowResult<String> {
        self.element(Self::jobs_link()).click(self.page).await?;
        let grid = Self::job_grid();
        wait_for(
            self.page,
            &grid.visible(),
            &WaitOptions::within(self.timeouts.element_ms),
        )
        .await?;
        wait_for(
            self.page,
            &WaitCondition::custom("job grid populated", Self::grid_populated_script()),
            &WaitOptions::within(self.timeouts.ready_ms),
        )
        .await?;

        let text = self.element(grid).inner_text(self.page).await?;
        let job_number = job_number_from_grid(&text);
        if job_number.is_empty() {
            info!("job grid updated, no job number shown");
        } else {
            info!(job_number, "job listed in grid");
        }
        Ok(job_number)
    }
}
