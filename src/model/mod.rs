//! Workspace data model: item types and the authoritative layout collection.

pub mod data_model;
pub mod item;

pub use data_model::{LayoutModel, build_occupancy, check_invariants};
pub use item::{
    ComponentName, Container, Item, ItemId, ItemKind, LaunchIntent, RestoreFlags, ScreenId,
    UserSerial,
};
