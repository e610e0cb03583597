//! Run record persistence.
//!
//! [`JsonFileStore`] keeps every run as one element of a JSON array file.
//! Appends are read-modify-write by a single writer; existing entries are
//! preserved verbatim even if they do not parse as [`ScenarioState`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::info;

use crate::result::{FlowError, FlowResult};
use crate::state::ScenarioState;

/// Default record file, relative to the working directory
pub const DEFAULT_RECORDS_PATH: &str = "data/testdata.json";

/// Destination for scenario records
pub trait RecordStore: Send + Sync {
    /// Append one record
    fn append(&self, record: &ScenarioState) -> FlowResult<()>;

    /// Load every record
    fn load(&self) -> FlowResult<Vec<ScenarioState>>;
}

/// JSON array file store
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_raw(&self) -> FlowResult<Vec<serde_json::Value>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

impl RecordStore for JsonFileStore {
    fn append(&self, record: &ScenarioState) -> FlowResult<()> {
        let mut entries = self.read_raw()?;
        entries.push(serde_json::to_value(record)?);
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        info!(
            path = %self.path.display(),
            run_id = %record.run_id,
            status = %record.status,
            "run record saved"
        );
        Ok(())
    }

    fn load(&self) -> FlowResult<Vec<ScenarioState>> {
        self.read_raw()?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(FlowError::from))
            .collect()
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<ScenarioState>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, record: &ScenarioState) -> FlowResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }

    fn load(&self) -> FlowResult<Vec<ScenarioState>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
