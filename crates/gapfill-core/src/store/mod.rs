//! Tabular store adapters.
//!
//! The engine only ever sees [`TabularStore`]: an ordered list of rows it can
//! read in full, insert into, and overwrite cells of. Three backends exist:
//!
//! - [`sheets::SheetsStore`]: Google Sheets over the REST API
//! - [`file::FileStore`]: a local JSON document of raw cells
//! - [`memory::MemoryStore`]: in-process, spreadsheet-like evaluation
//!
//! All positions are 1-based; row 1 is the header.

pub mod file;
pub mod memory;
pub mod sheets;

use std::sync::Arc;

use async_trait::async_trait;

use crate::columns::RangeSpec;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::{ConfigError, StoreError};

/// How written values are interpreted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Stored verbatim, never evaluated.
    Raw,
    /// Parsed as if typed into the UI: formulas evaluate, numbers and dates are typed.
    UserEntered,
}

impl InputMode {
    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::UserEntered => "USER_ENTERED",
        }
    }
}

/// Remote log operations consumed by the engine.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Every row as displayed (formulas evaluated), header included.
    async fn read_all(&self) -> Result<Vec<Vec<String>>, StoreError>;

    /// Insert one row at `position`, shifting that row and all below it down by one.
    async fn insert_row(
        &self,
        values: &[String],
        position: usize,
        mode: InputMode,
    ) -> Result<(), StoreError>;

    /// Overwrite one cell with a user-entered value.
    async fn update_cell(&self, position: usize, column: u32, value: &str)
    -> Result<(), StoreError>;

    /// Overwrite a rectangle of cells.
    async fn update_range(
        &self,
        range: &RangeSpec,
        values: &[Vec<String>],
        mode: InputMode,
    ) -> Result<(), StoreError>;
}

/// Open the configured backend.
///
/// Sheets connections are verified up front so an unreachable store fails
/// before any planning happens.
pub async fn open(config: &StoreConfig) -> crate::Result<Arc<dyn TabularStore>> {
    match config.backend {
        StoreBackend::Sheets => {
            let store = sheets::SheetsStore::connect(config).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| ConfigError::Missing("store.path".to_string()))?;
            let store = file::FileStore::open(path)?;
            Ok(Arc::new(store))
        }
    }
}
