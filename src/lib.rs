#![forbid(unsafe_code)]

//! Home-screen Layout (hsl): workspace layout engine for launchers.
//!
//! Owns where every icon, folder, and widget sits:
//! 1. **Grid**: per-screen occupancy and first-fit space finding
//! 2. **Model**: the in-memory layout and its invariants
//! 3. **Store**: the persisted favorites table and its schema upgrades
//! 4. **Migration**: reflowing a layout into a different grid size
//! 5. **Loader**: background load, validation, binding, and item insertion
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use homescreen_layout::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use homescreen_layout::core::config::Config;
//! use homescreen_layout::grid::{GridGeometry, SpaceFinder};
//! ```

pub mod prelude;

pub mod core;
pub mod grid;
pub mod loader;
pub mod logger;
pub mod migration;
pub mod model;
pub mod store;
