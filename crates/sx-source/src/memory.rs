//! In-memory configuration source.

use sx_core::{ConfigId, ConfigurationRecord};

use crate::{ConfigSource, SourceResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryConfigSource {
    records: Vec<ConfigurationRecord>,
}

impl MemoryConfigSource {
    /// Rows are kept sorted by id so iteration order matches the database.
    pub fn new(mut records: Vec<ConfigurationRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        Self { records }
    }
}

impl ConfigSource for MemoryConfigSource {
    fn load_all(&self) -> SourceResult<Vec<ConfigurationRecord>> {
        Ok(self.records.clone())
    }

    fn get(&self, id: ConfigId) -> SourceResult<Option<ConfigurationRecord>> {
        Ok(self
            .records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|idx| self.records[idx].clone()))
    }

    fn count(&self) -> SourceResult<usize> {
        Ok(self.records.len())
    }
}
