//! sx-source: read-only access to the configuration table.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryConfigSource;
pub use sqlite::{SqliteConfigSource, TABLE_NAME};

use sx_core::{ConfigId, ConfigurationRecord};

pub type SourceResult<T> = Result<T, SourceError>;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database not found: {path}")]
    DatabaseNotFound { path: std::path::PathBuf },

    #[error("Invalid row {id}: {message}")]
    InvalidRow { id: i64, message: String },
}

/// Ordered, read-only view of the configuration rows.
///
/// Implementations are shared across threads by the pipeline and the
/// serving layer.
pub trait ConfigSource: Send + Sync {
    /// Every row, ordered by id.
    fn load_all(&self) -> SourceResult<Vec<ConfigurationRecord>>;

    /// One row, `None` when the id does not exist.
    fn get(&self, id: ConfigId) -> SourceResult<Option<ConfigurationRecord>>;

    /// Number of rows.
    fn count(&self) -> SourceResult<usize> {
        Ok(self.load_all()?.len())
    }
}
