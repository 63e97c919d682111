//! Favorites table schema and stepwise version upgrades.
//!
//! The version lives in `PRAGMA user_version`. Each step only adds what the
//! next version introduced, so a v1 database walks v1→v2→v3→v4 in order.

#![allow(missing_docs)]

use rusqlite::{Connection, params};

use crate::core::errors::{HslError, Result};

/// Newest schema this build understands.
pub const CURRENT_VERSION: i64 = 4;

/// Base table as it shipped in version 1.
const CREATE_FAVORITES_V1: &str = "CREATE TABLE IF NOT EXISTS favorites (
    _id INTEGER PRIMARY KEY,
    title TEXT,
    intent TEXT,
    container INTEGER,
    screen INTEGER,
    cellX INTEGER,
    cellY INTEGER,
    spanX INTEGER,
    spanY INTEGER,
    itemType INTEGER,
    appWidgetId INTEGER NOT NULL DEFAULT -1,
    modified INTEGER NOT NULL DEFAULT 0
)";

const CREATE_META: &str = "CREATE TABLE IF NOT EXISTS layout_meta (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)";

/// Outcome of bringing a database to [`CURRENT_VERSION`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaReport {
    /// Version found on disk (0 for a fresh file).
    pub from_version: i64,
    pub to_version: i64,
    /// Whether the table was dropped and recreated empty.
    pub reset: bool,
}

impl SchemaReport {
    #[must_use]
    pub const fn upgraded(&self) -> bool {
        self.from_version != 0 && self.from_version != self.to_version && !self.reset
    }
}

/// Read `PRAGMA user_version`.
pub fn user_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn set_user_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))?;
    Ok(())
}

/// Create a schema at exactly `version`. Used for fresh files and by tests that
/// need an old layout on disk.
pub fn create_at_version(conn: &Connection, version: i64, folder_columns: u32) -> Result<()> {
    conn.execute_batch(CREATE_FAVORITES_V1)?;
    conn.execute_batch(CREATE_META)?;
    upgrade_steps(conn, 1, version, folder_columns)?;
    set_user_version(conn, version)
}

/// Apply upgrade steps `from+1 ..= to`.
pub fn upgrade_steps(conn: &Connection, from: i64, to: i64, folder_columns: u32) -> Result<()> {
    if from > to || to > CURRENT_VERSION {
        return Err(HslError::SchemaVersion {
            found: from,
            supported: CURRENT_VERSION,
        });
    }
    conn.execute_batch(CREATE_META)?;
    for step in (from + 1)..=to {
        match step {
            2 => add_column_if_missing(conn, "appWidgetProvider", "TEXT")?,
            3 => {
                add_column_if_missing(conn, "restored", "INTEGER NOT NULL DEFAULT 0")?;
                add_column_if_missing(conn, "profileId", "INTEGER DEFAULT 0")?;
            }
            4 => {
                add_column_if_missing(conn, "rank", "INTEGER NOT NULL DEFAULT 0")?;
                // Folder children get a rank matching their old cell order.
                conn.execute(
                    "UPDATE favorites SET rank = cellX + (cellY * ?1) WHERE container > 0",
                    params![i64::from(folder_columns)],
                )?;
                conn.execute(
                    "UPDATE favorites SET rank = screen WHERE container = -101",
                    [],
                )?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Drop everything and start over at [`CURRENT_VERSION`].
pub fn reset(conn: &Connection, folder_columns: u32) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS favorites;
         DROP TABLE IF EXISTS layout_meta;",
    )?;
    create_at_version(conn, CURRENT_VERSION, folder_columns)
}

/// Bring the database to [`CURRENT_VERSION`].
///
/// A newer-than-known version or a failed upgrade resets the table. Must be
/// called inside a transaction.
pub fn migrate_schema(conn: &Connection, folder_columns: u32) -> Result<SchemaReport> {
    let found = user_version(conn)?;
    let mut report = SchemaReport {
        from_version: found,
        to_version: CURRENT_VERSION,
        reset: false,
    };

    if found == 0 {
        create_at_version(conn, CURRENT_VERSION, folder_columns)?;
        return Ok(report);
    }
    if found == CURRENT_VERSION {
        conn.execute_batch(CREATE_META)?;
        return Ok(report);
    }
    if found > CURRENT_VERSION {
        eprintln!(
            "[HSL-SCHEMA] database version {found} is newer than {CURRENT_VERSION}, resetting"
        );
        reset(conn, folder_columns)?;
        report.reset = true;
        return Ok(report);
    }

    match upgrade_steps(conn, found, CURRENT_VERSION, folder_columns) {
        Ok(()) => set_user_version(conn, CURRENT_VERSION)?,
        Err(e) => {
            eprintln!("[HSL-SCHEMA] upgrade from v{found} failed ({e}), resetting");
            reset(conn, folder_columns)?;
            report.reset = true;
        }
    }
    Ok(report)
}

fn add_column_if_missing(conn: &Connection, column: &str, decl: &str) -> Result<()> {
    if has_column(conn, column)? {
        return Ok(());
    }
    conn.execute_batch(&format!("ALTER TABLE favorites ADD COLUMN {column} {decl};"))?;
    Ok(())
}

fn has_column(conn: &Connection, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare("PRAGMA table_info(favorites)")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n.eq_ignore_ascii_case(column)))
}
