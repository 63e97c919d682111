//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use homescreen_layout::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{HslError, Result};

// Grid
pub use crate::grid::{GridGeometry, GridOccupancy, Placement, SpaceFinder};

// Model
pub use crate::model::{
    ComponentName, Container, Item, ItemId, ItemKind, LaunchIntent, LayoutModel, RestoreFlags,
    ScreenId, UserSerial,
};

// Store
pub use crate::store::{LayoutStore, MemoryStore, PersistedRow, WriteBatch};
#[cfg(feature = "sqlite")]
pub use crate::store::SqliteStore;

// Migration
pub use crate::migration::{GridMigration, MigrationOutcome, MigrationPolicy, ReflowMode};

// Loader
pub use crate::loader::{
    AddWorkspaceItemsTask, AddedItems, BindPhase, FirstScreenBroadcast, ItemRequest,
    LayoutCallbacks, LoaderDeps, LoaderPipeline, PipelineSettings, RowValidator, StaticServices,
    SystemServices, UiExecutor,
};

// Logging
pub use crate::logger::{ActivityEvent, ActivityLoggerHandle, spawn_logger};
