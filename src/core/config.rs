//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HslError, Result};
use crate::grid::GridGeometry;

/// Largest grid dimension accepted from configuration.
pub const MAX_GRID_DIMENSION: u32 = 20;
/// Largest hotseat accepted from configuration.
pub const MAX_HOTSEAT_SLOTS: u32 = 12;

/// Full layout engine configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub grid: GridGeometry,
    pub migration: MigrationConfig,
    pub loader: LoaderConfig,
    pub broadcast: BroadcastConfig,
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
}

/// Grid-size migration policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MigrationConfig {
    /// Largest per-dimension change that still keeps items on their screens.
    pub reflow_in_place_max_delta: u32,
    /// Span a widget shrinks to when it no longer fits the destination grid.
    pub widget_min_span_x: u32,
    pub widget_min_span_y: u32,
}

/// Background loader tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// Screen bound synchronously before the rest of the workspace.
    pub first_page_screen: u32,
    /// Upper bound on waiting for the UI thread between bind batches.
    pub bind_idle_timeout_ms: u64,
    /// Extra attempts for storage reads and writes after the first failure.
    pub storage_retries: u32,
    /// Capacity of the worker task queue.
    pub task_queue_capacity: usize,
}

/// First-screen installer broadcast settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BroadcastConfig {
    pub enabled: bool,
    /// Total package entries allowed per installer payload.
    pub max_items: usize,
}

/// Activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub channel_capacity: usize,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

/// Filesystem paths used by hsl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub config_file: PathBuf,
    pub database: PathBuf,
    pub activity_log: PathBuf,
    pub activity_log_fallback: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            reflow_in_place_max_delta: 2,
            widget_min_span_x: 2,
            widget_min_span_y: 2,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            first_page_screen: 0,
            bind_idle_timeout_ms: 1_000,
            storage_retries: 1,
            task_queue_capacity: 64,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_items: 70,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            channel_capacity: 1024,
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home_dir = env::var_os("HOME").map_or_else(
            || {
                eprintln!(
                    "[HSL-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths"
                );
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        );
        let cfg = home_dir.join(".config").join("hsl").join("config.toml");
        let data = home_dir.join(".local").join("share").join("hsl");
        Self {
            config_file: cfg,
            database: data.join("launcher.db"),
            activity_log: data.join("activity.jsonl"),
            activity_log_fallback: None,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathsConfig::default().config_file
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HslError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HslError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.paths.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for logging.
    ///
    /// FNV-1a keeps the value stable across processes and toolchains.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        // grid
        set_u32(&mut lookup, "HSL_GRID_COLUMNS", &mut self.grid.columns)?;
        set_u32(&mut lookup, "HSL_GRID_ROWS", &mut self.grid.rows)?;
        set_u32(
            &mut lookup,
            "HSL_GRID_HOTSEAT_SLOTS",
            &mut self.grid.hotseat_slots,
        )?;

        // migration
        set_u32(
            &mut lookup,
            "HSL_MIGRATION_REFLOW_IN_PLACE_MAX_DELTA",
            &mut self.migration.reflow_in_place_max_delta,
        )?;

        // loader
        set_u32(
            &mut lookup,
            "HSL_LOADER_FIRST_PAGE_SCREEN",
            &mut self.loader.first_page_screen,
        )?;
        set_u64(
            &mut lookup,
            "HSL_LOADER_BIND_IDLE_TIMEOUT_MS",
            &mut self.loader.bind_idle_timeout_ms,
        )?;
        set_u32(
            &mut lookup,
            "HSL_LOADER_STORAGE_RETRIES",
            &mut self.loader.storage_retries,
        )?;

        // broadcast
        set_bool(&mut lookup, "HSL_BROADCAST_ENABLED", &mut self.broadcast.enabled)?;
        set_usize(
            &mut lookup,
            "HSL_BROADCAST_MAX_ITEMS",
            &mut self.broadcast.max_items,
        )?;

        // logging
        set_bool(&mut lookup, "HSL_LOGGING_ENABLED", &mut self.logging.enabled)?;

        // paths
        if let Some(raw) = lookup("HSL_PATHS_DATABASE") {
            self.paths.database = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HSL_PATHS_ACTIVITY_LOG") {
            self.paths.activity_log = PathBuf::from(raw);
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, val) in [("columns", self.grid.columns), ("rows", self.grid.rows)] {
            if !(1..=MAX_GRID_DIMENSION).contains(&val) {
                return Err(HslError::InvalidConfig {
                    details: format!("grid.{name} must be in [1, {MAX_GRID_DIMENSION}], got {val}"),
                });
            }
        }

        if !(1..=MAX_HOTSEAT_SLOTS).contains(&self.grid.hotseat_slots) {
            return Err(HslError::InvalidConfig {
                details: format!(
                    "grid.hotseat_slots must be in [1, {MAX_HOTSEAT_SLOTS}], got {}",
                    self.grid.hotseat_slots
                ),
            });
        }

        if self.migration.widget_min_span_x == 0 || self.migration.widget_min_span_y == 0 {
            return Err(HslError::InvalidConfig {
                details: "migration.widget_min_span_x and widget_min_span_y must be >= 1"
                    .to_string(),
            });
        }

        if self.loader.bind_idle_timeout_ms == 0 {
            return Err(HslError::InvalidConfig {
                details: "loader.bind_idle_timeout_ms must be > 0".to_string(),
            });
        }

        if self.loader.task_queue_capacity == 0 {
            return Err(HslError::InvalidConfig {
                details: "loader.task_queue_capacity must be >= 1".to_string(),
            });
        }

        if self.broadcast.enabled && self.broadcast.max_items == 0 {
            return Err(HslError::InvalidConfig {
                details: "broadcast.max_items must be >= 1 when broadcast.enabled=true"
                    .to_string(),
            });
        }

        if self.logging.channel_capacity == 0 {
            return Err(HslError::InvalidConfig {
                details: "logging.channel_capacity must be >= 1".to_string(),
            });
        }

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| HslError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

fn set_u32<F>(lookup: &mut F, name: &str, slot: &mut u32) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_u64<F>(lookup: &mut F, name: &str, slot: &mut u64) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_usize<F>(lookup: &mut F, name: &str, slot: &mut usize) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}

fn set_bool<F>(lookup: &mut F, name: &str, slot: &mut bool) -> Result<()>
where
    F: FnMut(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = parse_env(name, &raw)?;
    }
    Ok(())
}
