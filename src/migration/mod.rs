//! Grid-size migration of a stored layout.

pub mod grid_migration;

pub use grid_migration::{
    GridMigration, MigrationOutcome, MigrationPolicy, ReflowMode, needs_migration,
};
