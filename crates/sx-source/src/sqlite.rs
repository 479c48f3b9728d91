//! SQLite-backed configuration source.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use sx_core::{ConfigId, ConfigurationRecord};
use tracing::warn;

use crate::{ConfigSource, SourceError, SourceResult};

/// Table holding the configuration rows.
pub const TABLE_NAME: &str = "XGStels";

const COLUMNS: &str = "id, rc1, rc2, rc3, zs1, zs2, zs3, nfp, etabar, B2c, p2, axis_length, iota";

/// Reads rows from the configuration database.
///
/// The database is opened read-only, one connection per call, so the
/// source can be shared between threads without a lock.
#[derive(Debug, Clone)]
pub struct SqliteConfigSource {
    path: PathBuf,
}

impl SqliteConfigSource {
    pub fn open(path: impl Into<PathBuf>) -> SourceResult<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(SourceError::DatabaseNotFound { path });
        }
        let source = Self { path };
        // Fail early on a file that is not a database or lacks the table.
        {
            let conn = source.connect()?;
            conn.prepare(&format!("SELECT {COLUMNS} FROM {TABLE_NAME} LIMIT 0"))?;
        }
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> SourceResult<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(conn)
    }
}

/// A required numeric column. NULL or a non-numeric value reads as NaN so
/// the row still loads and is rejected later by
/// [`ConfigurationRecord::validate`] as an item-level failure.
fn required(row: &Row<'_>, idx: usize, id: i64, name: &str) -> f64 {
    match row.get::<_, Option<f64>>(idx) {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!(config = id, column = name, "NULL in required column");
            f64::NAN
        }
        Err(e) => {
            warn!(config = id, column = name, error = %e, "unreadable required column");
            f64::NAN
        }
    }
}

fn optional(row: &Row<'_>, idx: usize, id: i64, name: &str) -> Option<f64> {
    row.get(idx).unwrap_or_else(|e| {
        warn!(config = id, column = name, error = %e, "unreadable optional column");
        None
    })
}

/// Builds a record from one row. Only an unreadable id is an error; any
/// other bad column is carried into the record for validation.
fn record_from_row(row: &Row<'_>) -> SourceResult<ConfigurationRecord> {
    let id: i64 = row.get(0).map_err(|e| SourceError::InvalidRow {
        id: -1,
        message: format!("id: {e}"),
    })?;
    // 0 is rejected by validation like a missing value.
    let nfp = match row.get::<_, Option<i64>>(7) {
        Ok(Some(n)) => u32::try_from(n).unwrap_or_else(|_| {
            warn!(config = id, nfp = n, "nfp out of range");
            0
        }),
        Ok(None) => {
            warn!(config = id, column = "nfp", "NULL in required column");
            0
        }
        Err(e) => {
            warn!(config = id, column = "nfp", error = %e, "unreadable required column");
            0
        }
    };

    Ok(ConfigurationRecord {
        id: ConfigId::new(id),
        rc: [
            required(row, 1, id, "rc1"),
            required(row, 2, id, "rc2"),
            required(row, 3, id, "rc3"),
        ],
        zs: [
            required(row, 4, id, "zs1"),
            required(row, 5, id, "zs2"),
            required(row, 6, id, "zs3"),
        ],
        nfp,
        etabar: required(row, 8, id, "etabar"),
        b2c: optional(row, 9, id, "B2c"),
        p2: optional(row, 10, id, "p2"),
        axis_length: optional(row, 11, id, "axis_length"),
        iota: optional(row, 12, id, "iota"),
    })
}

impl ConfigSource for SqliteConfigSource {
    fn load_all(&self) -> SourceResult<Vec<ConfigurationRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM {TABLE_NAME} ORDER BY id"))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(record_from_row(row)?);
        }
        tracing::debug!(count = records.len(), path = %self.path.display(), "loaded configurations");
        Ok(records)
    }

    fn get(&self, id: ConfigId) -> SourceResult<Option<ConfigurationRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM {TABLE_NAME} WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id.get()])?;
        match rows.next()? {
            Some(row) => Ok(Some(record_from_row(row)?)),
            None => Ok(None),
        }
    }

    fn count(&self) -> SourceResult<usize> {
        let conn = self.connect()?;
        let count: Option<i64> = conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(count.unwrap_or(0).max(0) as usize)
    }
}
