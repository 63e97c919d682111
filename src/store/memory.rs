//! In-memory [`LayoutStore`] with failure injection.
//!
//! Clones share the same backing rows, so a test can hand one clone to the
//! loader and inspect the other.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::{HslError, Result};
use crate::grid::GridGeometry;
use crate::store::{LayoutStore, PersistedRow, RowWrite, WriteBatch};

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<i64, PersistedRow>,
    grid: Option<GridGeometry>,
    max_id: i64,
    failing_reads: u32,
    failing_writes: u32,
    reads: u32,
}

/// Shared in-memory row store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with rows laid out for `grid`.
    #[must_use]
    pub fn with_rows(rows: Vec<PersistedRow>, grid: Option<GridGeometry>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for row in rows {
                inner.max_id = inner.max_id.max(row.id);
                inner.rows.insert(row.id, row);
            }
            inner.grid = grid;
        }
        store
    }

    /// Make the next `count` reads fail.
    pub fn fail_next_reads(&self, count: u32) {
        self.inner.lock().failing_reads = count;
    }

    /// Make the next `count` writes fail.
    pub fn fail_next_writes(&self, count: u32) {
        self.inner.lock().failing_writes = count;
    }

    /// Number of read attempts so far, failed ones included.
    #[must_use]
    pub fn read_attempts(&self) -> u32 {
        self.inner.lock().reads
    }

    /// Current rows, ordered by id.
    #[must_use]
    pub fn rows(&self) -> Vec<PersistedRow> {
        self.inner.lock().rows.values().cloned().collect()
    }

    #[must_use]
    pub fn row(&self, id: i64) -> Option<PersistedRow> {
        self.inner.lock().rows.get(&id).cloned()
    }
}

fn injected(component: &'static str) -> HslError {
    HslError::Sql {
        context: component,
        details: "injected failure".to_string(),
    }
}

fn take_write_failure(inner: &mut Inner) -> Result<()> {
    if inner.failing_writes > 0 {
        inner.failing_writes -= 1;
        return Err(injected("memory-write"));
    }
    Ok(())
}

impl LayoutStore for MemoryStore {
    fn read_rows(&mut self) -> Result<Vec<PersistedRow>> {
        let mut inner = self.inner.lock();
        inner.reads += 1;
        if inner.failing_reads > 0 {
            inner.failing_reads -= 1;
            return Err(injected("memory-read"));
        }
        Ok(inner.rows.values().cloned().collect())
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<()> {
        let mut inner = self.inner.lock();
        take_write_failure(&mut inner)?;
        // Build the result first so a failure cannot leave a partial write.
        let mut rows = inner.rows.clone();
        let mut max_id = inner.max_id;
        for op in batch.ops() {
            match op {
                RowWrite::Upsert(row) => {
                    max_id = max_id.max(row.id);
                    rows.insert(row.id, row.clone());
                }
                RowWrite::Delete(id) => {
                    rows.remove(id);
                }
            }
        }
        inner.rows = rows;
        inner.max_id = max_id;
        Ok(())
    }

    fn replace_all(&mut self, rows: &[PersistedRow], geometry: GridGeometry) -> Result<()> {
        let mut inner = self.inner.lock();
        take_write_failure(&mut inner)?;
        inner.rows = rows.iter().map(|r| (r.id, r.clone())).collect();
        inner.max_id = rows.iter().map(|r| r.id).fold(inner.max_id, i64::max);
        inner.grid = Some(geometry);
        Ok(())
    }

    fn grid_state(&mut self) -> Result<Option<GridGeometry>> {
        Ok(self.inner.lock().grid)
    }

    fn set_grid_state(&mut self, geometry: GridGeometry) -> Result<()> {
        let mut inner = self.inner.lock();
        take_write_failure(&mut inner)?;
        inner.grid = Some(geometry);
        Ok(())
    }

    fn max_item_id(&mut self) -> Result<i64> {
        Ok(self.inner.lock().max_id)
    }
}
