//! Persisted layout rows and the repository seam over durable storage.
//!
//! The loader, validator, and migration engine only see [`LayoutStore`]; the
//! storage engine behind it is interchangeable ([`SqliteStore`] in production,
//! [`MemoryStore`] in tests and tooling).

#![allow(missing_docs)]

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::grid::GridGeometry;
use crate::model::{Container, Item, ItemKind, RestoreFlags};

/// Container column value for desktop screens.
pub const CONTAINER_DESKTOP: i64 = -100;
/// Container column value for the hotseat; the screen column holds the slot.
pub const CONTAINER_HOTSEAT: i64 = -101;

pub const ITEM_TYPE_APPLICATION: i64 = 0;
pub const ITEM_TYPE_FOLDER: i64 = 2;
pub const ITEM_TYPE_APPWIDGET: i64 = 4;
pub const ITEM_TYPE_DEEP_SHORTCUT: i64 = 6;

/// One row of the favorites table, exactly as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRow {
    pub id: i64,
    pub container: i64,
    pub screen: i64,
    pub cell_x: i64,
    pub cell_y: i64,
    pub span_x: i64,
    pub span_y: i64,
    pub item_type: i64,
    pub intent: Option<String>,
    pub title: Option<String>,
    pub profile_id: i64,
    pub rank: i64,
    pub restored: i64,
    pub app_widget_id: i64,
    pub app_widget_provider: Option<String>,
}

impl Default for PersistedRow {
    fn default() -> Self {
        Self {
            id: 0,
            container: CONTAINER_DESKTOP,
            screen: 0,
            cell_x: 0,
            cell_y: 0,
            span_x: 1,
            span_y: 1,
            item_type: ITEM_TYPE_APPLICATION,
            intent: None,
            title: None,
            profile_id: 0,
            rank: 0,
            restored: 0,
            app_widget_id: -1,
            app_widget_provider: None,
        }
    }
}

impl PersistedRow {
    /// Encode a model item. Pending-restore apps are stored as application
    /// rows carrying the restore flag.
    #[must_use]
    pub fn from_item(item: &Item) -> Self {
        let (container, screen) = match item.container {
            Container::Desktop(screen) => (CONTAINER_DESKTOP, i64::from(screen.0)),
            Container::Hotseat(slot) => (CONTAINER_HOTSEAT, i64::from(slot)),
            Container::Folder(folder) => (folder.0, -1),
        };
        let mut restore = item.restore;
        let mut row = Self {
            id: item.id.0,
            container,
            screen,
            cell_x: i64::from(item.cell_x),
            cell_y: i64::from(item.cell_y),
            span_x: i64::from(item.span_x),
            span_y: i64::from(item.span_y),
            title: item.title.clone(),
            profile_id: item.user.0,
            rank: i64::from(item.rank),
            ..Self::default()
        };
        match &item.kind {
            ItemKind::Application { intent } => {
                row.item_type = ITEM_TYPE_APPLICATION;
                row.intent = Some(intent.to_uri());
            }
            ItemKind::PendingRestore { intent } => {
                row.item_type = ITEM_TYPE_APPLICATION;
                row.intent = Some(intent.to_uri());
                if !restore.is_pending() {
                    restore |= RestoreFlags::RESTORED_ICON;
                }
            }
            ItemKind::DeepShortcut { intent } => {
                row.item_type = ITEM_TYPE_DEEP_SHORTCUT;
                row.intent = Some(intent.to_uri());
            }
            ItemKind::Folder => row.item_type = ITEM_TYPE_FOLDER,
            ItemKind::AppWidget {
                widget_id,
                provider,
            } => {
                row.item_type = ITEM_TYPE_APPWIDGET;
                row.app_widget_id = *widget_id;
                row.app_widget_provider = Some(provider.flatten());
            }
        }
        row.restored = i64::from(restore.bits());
        row
    }
}

/// One write in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowWrite {
    Upsert(PersistedRow),
    Delete(i64),
}

/// Ordered writes applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<RowWrite>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, row: PersistedRow) {
        self.ops.push(RowWrite::Upsert(row));
    }

    pub fn delete(&mut self, id: i64) {
        self.ops.push(RowWrite::Delete(id));
    }

    #[must_use]
    pub fn ops(&self) -> &[RowWrite] {
        &self.ops
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Repository over the persisted layout.
///
/// Every method that writes more than one row must be all-or-nothing.
pub trait LayoutStore: Send {
    /// Every row, ordered by id.
    fn read_rows(&mut self) -> Result<Vec<PersistedRow>>;

    /// Apply a batch inside one transaction.
    fn apply(&mut self, batch: &WriteBatch) -> Result<()>;

    /// Replace every row and record the geometry they were laid out for.
    fn replace_all(&mut self, rows: &[PersistedRow], geometry: GridGeometry) -> Result<()>;

    /// Geometry the stored layout was last written for, if known.
    fn grid_state(&mut self) -> Result<Option<GridGeometry>>;

    fn set_grid_state(&mut self, geometry: GridGeometry) -> Result<()>;

    /// Largest id ever stored.
    fn max_item_id(&mut self) -> Result<i64>;
}
