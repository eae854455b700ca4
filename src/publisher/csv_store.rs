use super::store::StateStore;
use crate::shared_data::{current_timestamp, StoreUpdate};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One journal row per accepted update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRecord {
    pub timestamp: u64,
    pub payload: String,
}

/// Append-only CSV journal acting as the store. The last row is the current
/// value of every key it wrote.
pub struct CsvStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Result<Vec<StoreRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let mut records = Vec::new();
        for result in rdr.deserialize() {
            let record: StoreRecord = result.context("malformed journal row")?;
            records.push(record);
        }
        Ok(records)
    }
}

impl StateStore for CsvStore {
    fn name(&self) -> &str {
        "csv"
    }

    fn publish(&self, update: &StoreUpdate) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let record = StoreRecord {
            timestamp: current_timestamp(),
            payload: serde_json::to_string(&update.entries)?,
        };

        let file_exists = self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!file_exists)
            .from_writer(file);
        wtr.serialize(&record)?;
        wtr.flush()?;
        Ok(())
    }

    fn snapshot(&self) -> Result<Option<StoreUpdate>> {
        let mut current = StoreUpdate::new();
        for record in self.records()? {
            let entries: BTreeMap<String, Value> = serde_json::from_str(&record.payload)
                .context("journal payload is not a key/value map")?;
            current.entries.extend(entries);
        }
        Ok((!current.is_empty()).then_some(current))
    }
}
