//! SQLite-backed [`LayoutStore`]: WAL mode, prepared statements, and one
//! transaction per multi-row write.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};

use crate::core::errors::{HslError, Result};
use crate::grid::GridGeometry;
use crate::store::schema::{self, SchemaReport};
use crate::store::{LayoutStore, PersistedRow, RowWrite, WriteBatch};

const SELECT_ROWS: &str = "SELECT _id, container, screen, cellX, cellY, spanX, spanY, itemType,
        intent, title, profileId, rank, restored, appWidgetId, appWidgetProvider
 FROM favorites ORDER BY _id";

const UPSERT_ROW: &str = "INSERT OR REPLACE INTO favorites (
        _id, container, screen, cellX, cellY, spanX, spanY, itemType,
        intent, title, profileId, rank, restored, appWidgetId, appWidgetProvider, modified
    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)";

/// Layout database on disk (or in memory for tests).
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
    schema: SchemaReport,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, applying PRAGMAs and bringing
    /// the schema to the current version.
    ///
    /// `folder_columns` is only used when ranking folder children during the
    /// v4 upgrade.
    pub fn open(path: &Path, folder_columns: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HslError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        apply_pragmas(&conn)?;
        Self::finish_open(conn, Some(path.to_path_buf()), folder_columns)
    }

    /// Private in-memory database.
    pub fn open_in_memory(folder_columns: u32) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::finish_open(conn, None, folder_columns)
    }

    fn finish_open(mut conn: Connection, path: Option<PathBuf>, folder_columns: u32) -> Result<Self> {
        let tx = conn.transaction()?;
        let schema = schema::migrate_schema(&tx, folder_columns)?;
        tx.commit()?;
        Ok(Self { conn, path, schema })
    }

    /// Path to the database file, `None` when in memory.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// What happened to the schema when this store was opened.
    #[must_use]
    pub const fn schema_report(&self) -> SchemaReport {
        self.schema
    }

    /// Current on-disk schema version.
    pub fn schema_version(&self) -> Result<i64> {
        schema::user_version(&self.conn)
    }

    /// Borrow the raw connection for tooling and tests.
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;
         PRAGMA busy_timeout = 5000;",
    )?;
    let mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        eprintln!("[HSL-SQLITE] WARNING: requested WAL mode but got '{mode}'");
    }
    Ok(())
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<PersistedRow> {
    Ok(PersistedRow {
        id: row.get(0)?,
        container: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
        screen: row.get::<_, Option<i64>>(2)?.unwrap_or(-1),
        cell_x: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        cell_y: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
        span_x: row.get::<_, Option<i64>>(5)?.unwrap_or(1),
        span_y: row.get::<_, Option<i64>>(6)?.unwrap_or(1),
        item_type: row.get::<_, Option<i64>>(7)?.unwrap_or(-1),
        intent: row.get(8)?,
        title: row.get(9)?,
        profile_id: row.get::<_, Option<i64>>(10)?.unwrap_or(0),
        rank: row.get::<_, Option<i64>>(11)?.unwrap_or(0),
        restored: row.get::<_, Option<i64>>(12)?.unwrap_or(0),
        app_widget_id: row.get::<_, Option<i64>>(13)?.unwrap_or(-1),
        app_widget_provider: row.get(14)?,
    })
}

fn upsert(conn: &Connection, row: &PersistedRow, modified: i64) -> Result<()> {
    conn.prepare_cached(UPSERT_ROW)?.execute(params![
        row.id,
        row.container,
        row.screen,
        row.cell_x,
        row.cell_y,
        row.span_x,
        row.span_y,
        row.item_type,
        row.intent,
        row.title,
        row.profile_id,
        row.rank,
        row.restored,
        row.app_widget_id,
        row.app_widget_provider,
        modified,
    ])?;
    Ok(())
}

fn set_meta(conn: &Connection, key: &str, value: i64) -> Result<()> {
    conn.prepare_cached("INSERT OR REPLACE INTO layout_meta (key, value) VALUES (?1, ?2)")?
        .execute(params![key, value])?;
    Ok(())
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<i64>> {
    Ok(conn
        .prepare_cached("SELECT value FROM layout_meta WHERE key = ?1")?
        .query_row(params![key], |row| row.get(0))
        .optional()?)
}

fn bump_max_id(conn: &Connection, candidate: i64) -> Result<()> {
    let current = get_meta(conn, "max_item_id")?.unwrap_or(0);
    if candidate > current {
        set_meta(conn, "max_item_id", candidate)?;
    }
    Ok(())
}

fn write_grid(conn: &Connection, geometry: GridGeometry) -> Result<()> {
    set_meta(conn, "grid_columns", i64::from(geometry.columns))?;
    set_meta(conn, "grid_rows", i64::from(geometry.rows))?;
    set_meta(conn, "hotseat_slots", i64::from(geometry.hotseat_slots))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl LayoutStore for SqliteStore {
    fn read_rows(&mut self) -> Result<Vec<PersistedRow>> {
        let mut stmt = self.conn.prepare_cached(SELECT_ROWS)?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let modified = now_millis();
        let tx = self.conn.transaction()?;
        let mut max_id = 0;
        for op in batch.ops() {
            match op {
                RowWrite::Upsert(row) => {
                    upsert(&tx, row, modified)?;
                    max_id = max_id.max(row.id);
                }
                RowWrite::Delete(id) => {
                    tx.prepare_cached("DELETE FROM favorites WHERE _id = ?1")?
                        .execute(params![id])?;
                }
            }
        }
        bump_max_id(&tx, max_id)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_all(&mut self, rows: &[PersistedRow], geometry: GridGeometry) -> Result<()> {
        let modified = now_millis();
        let tx = self.conn.transaction()?;
        // Keep the high-water mark of rows that are about to disappear.
        let existing_max: Option<i64> =
            tx.query_row("SELECT MAX(_id) FROM favorites", [], |row| row.get(0))?;
        bump_max_id(&tx, existing_max.unwrap_or(0))?;
        tx.execute("DELETE FROM favorites", [])?;
        for row in rows {
            upsert(&tx, row, modified)?;
        }
        bump_max_id(&tx, rows.iter().map(|r| r.id).max().unwrap_or(0))?;
        write_grid(&tx, geometry)?;
        tx.commit()?;
        Ok(())
    }

    fn grid_state(&mut self) -> Result<Option<GridGeometry>> {
        let columns = get_meta(&self.conn, "grid_columns")?;
        let rows = get_meta(&self.conn, "grid_rows")?;
        let hotseat = get_meta(&self.conn, "hotseat_slots")?;
        let (Some(columns), Some(rows), Some(hotseat)) = (columns, rows, hotseat) else {
            return Ok(None);
        };
        let to_u32 = |v: i64| u32::try_from(v).ok();
        Ok(match (to_u32(columns), to_u32(rows), to_u32(hotseat)) {
            (Some(c), Some(r), Some(h)) => Some(GridGeometry::new(c, r, h)),
            _ => None,
        })
    }

    fn set_grid_state(&mut self, geometry: GridGeometry) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_grid(&tx, geometry)?;
        tx.commit()?;
        Ok(())
    }

    fn max_item_id(&mut self) -> Result<i64> {
        let table_max: Option<i64> =
            self.conn
                .query_row("SELECT MAX(_id) FROM favorites", [], |row| row.get(0))?;
        let meta_max = get_meta(&self.conn, "max_item_id")?;
        Ok(table_max.unwrap_or(0).max(meta_max.unwrap_or(0)))
    }
}
