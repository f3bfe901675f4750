use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_text, round2, table_error};
use crate::error::{AuthError, AuthResult};
use crate::identity::{authorize, Domain, Identity};
use crate::storage::{Keyed, RecordTable, StoreError};

/// Anything above this many megabytes counts as a large dataset.
pub const LARGE_DATASET_MB: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub source: String,
    pub last_updated: NaiveDate,
    pub record_count: u64,
    pub file_size_mb: f64,
}

impl Keyed for Dataset {
    fn id(&self) -> i64 { self.id }
    fn set_id(&mut self, id: i64) { self.id = id; }
}

impl Dataset {
    pub fn size_gb(&self) -> f64 { round2(self.file_size_mb / 1024.0) }

    pub fn is_large(&self) -> bool { self.file_size_mb > LARGE_DATASET_MB }

    pub fn records_per_mb(&self) -> f64 {
        if self.file_size_mb == 0.0 { return 0.0; }
        round2(self.record_count as f64 / self.file_size_mb)
    }

    pub fn ai_context(&self) -> String {
        format!(
            "Dataset Name: {}\nCategory: {}\nSource: {}\nLast Updated: {}\nRecord Count: {} records\nFile Size: {:.2} MB ({} GB)\nRecords per MB: {}",
            self.name,
            self.category,
            self.source,
            self.last_updated,
            self.record_count,
            self.file_size_mb,
            self.size_gb(),
            self.records_per_mb(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDataset {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub source: String,
    pub last_updated: NaiveDate,
    pub record_count: u64,
    pub file_size_mb: f64,
}

pub struct DatasetRepository {
    table: RecordTable<Dataset>,
}

impl DatasetRepository {
    pub fn in_memory() -> Self { Self { table: RecordTable::in_memory() } }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self { table: RecordTable::open(path)? })
    }

    pub fn list(&self, who: &Identity) -> AuthResult<Vec<Dataset>> {
        authorize(who, Domain::DataScience)?;
        let mut rows = self.table.all();
        rows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated).then(a.name.cmp(&b.name)));
        Ok(rows)
    }

    pub fn get(&self, who: &Identity, id: i64) -> AuthResult<Dataset> {
        authorize(who, Domain::DataScience)?;
        self.table.get(id).ok_or_else(|| AuthError::NotFound(format!("dataset {}", id)))
    }

    pub fn add(&self, who: &Identity, new: NewDataset) -> AuthResult<Dataset> {
        authorize(who, Domain::DataScience)?;
        require_text("name", &new.name)?;
        if !new.file_size_mb.is_finite() || new.file_size_mb < 0.0 {
            return Err(AuthError::InvalidInput("file_size_mb must be a non-negative number".into()));
        }
        let row = Dataset {
            id: 0,
            name: new.name,
            category: new.category,
            source: new.source,
            last_updated: new.last_updated,
            record_count: new.record_count,
            file_size_mb: new.file_size_mb,
        };
        let saved = self.table.insert(row).map_err(table_error)?;
        info!(target: "records", id = saved.id, by = %who.username(), "dataset.added");
        Ok(saved)
    }

    /// Total size across all datasets, in MB.
    pub fn total_size_mb(&self, who: &Identity) -> AuthResult<f64> {
        Ok(self.list(who)?.iter().map(|d| d.file_size_mb).sum())
    }
}
