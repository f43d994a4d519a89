//! In-memory cache of the loaded table.
//!
//! The table is replaced wholesale: readers clone the current `Arc` and keep
//! working on it while a reload builds the next table, which is then swapped
//! in under a short write lock. A failed load leaves the current table alone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::LoadResult;
use crate::loader::LoadReport;
use crate::types::ApportionedTable;

/// What a cached table was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl SourceIdentity {
    pub fn of(path: &Path) -> Self {
        SourceIdentity {
            path: path.to_path_buf(),
            modified: std::fs::metadata(path).and_then(|m| m.modified()).ok(),
        }
    }
}

#[derive(Debug)]
pub struct LoadedTable {
    pub identity: SourceIdentity,
    pub table: ApportionedTable,
    pub report: LoadReport,
}

#[derive(Debug, Default)]
pub struct TableStore {
    current: RwLock<Option<Arc<LoadedTable>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<LoadedTable>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Cached table for `path` if its identity is unchanged, otherwise a
    /// fresh load. The flag tells whether `load` ran.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> LoadResult<(Arc<LoadedTable>, bool)>
    where
        F: FnOnce(&Path) -> LoadResult<(ApportionedTable, LoadReport)>,
    {
        let identity = SourceIdentity::of(path);
        if let Some(cached) = self.current() {
            if cached.identity == identity {
                debug!(path = %path.display(), "using cached table");
                return Ok((cached, false));
            }
        }
        self.swap_in(identity, load).map(|t| (t, true))
    }

    /// Load `path` unconditionally and replace the cached table on success.
    pub fn reload<F>(&self, path: &Path, load: F) -> LoadResult<Arc<LoadedTable>>
    where
        F: FnOnce(&Path) -> LoadResult<(ApportionedTable, LoadReport)>,
    {
        self.swap_in(SourceIdentity::of(path), load)
    }

    fn swap_in<F>(&self, identity: SourceIdentity, load: F) -> LoadResult<Arc<LoadedTable>>
    where
        F: FnOnce(&Path) -> LoadResult<(ApportionedTable, LoadReport)>,
    {
        let (table, report) = load(&identity.path)?;
        let loaded = Arc::new(LoadedTable {
            identity,
            table,
            report,
        });
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&loaded));
        info!(rows = loaded.table.records.len(), "table swapped in");
        Ok(loaded)
    }
}
