//! Work index
//!
//! The single authoritative collection of per-work metadata records, one
//! record per work, mirroring each work's attributes plus its catalog
//! folder. Content artifacts hold body text only; everything else lives
//! here.
//!
//! Persistence is deliberately simple: the whole document is loaded,
//! one record mutated in memory, and the whole document written back.
//! Optimistic, last-writer-wins, no conflict detection — callers that need
//! concurrent mutators must serialize around the store (see crate docs).
//!
//! Records are kept as raw JSON values on the wire and decoded
//! individually, so one malformed record can be skipped during listing
//! without making the whole catalog unreadable, and a read-modify-write
//! cycle preserves corrupt entries it did not touch.

use crate::error::{LibraryError, Result};
use crate::work::{Catalog, Work};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One index record: a work's metadata plus the folder it lives in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub catalog: Catalog,
    #[serde(flatten)]
    pub work: Work,
}

impl IndexRecord {
    pub fn from_work(work: &Work) -> Self {
        Self {
            catalog: work.catalog(),
            work: work.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexDoc {
    version: u32,
    updated_at: DateTime<Utc>,
    records: Vec<serde_json::Value>,
}

impl IndexDoc {
    fn empty() -> Self {
        Self {
            version: 1,
            updated_at: Utc::now(),
            records: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkIndex {
    path: PathBuf,
}

impl WorkIndex {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            let doc = IndexDoc::empty();
            fs::write(&path, serde_json::to_string_pretty(&doc)?)?;
        }
        Ok(Self { path })
    }

    fn load_doc(&self) -> Result<IndexDoc> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_doc(&self, mut doc: IndexDoc) -> Result<()> {
        doc.updated_at = Utc::now();
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }

    /// All decodable records, in stored order. Malformed records are logged
    /// and excluded rather than failing the listing.
    pub fn records(&self) -> Result<Vec<IndexRecord>> {
        let doc = self.load_doc()?;
        let mut records = Vec::with_capacity(doc.records.len());
        for value in doc.records {
            match serde_json::from_value::<IndexRecord>(value.clone()) {
                Ok(record) => records.push(record),
                Err(e) => {
                    let id = raw_id(&value).unwrap_or("<no id>");
                    warn!(id, error = %e, "Skipping corrupt index record");
                }
            }
        }
        Ok(records)
    }

    /// First record matching `id` in stored order, or `None`. A matching
    /// but undecodable record surfaces as `CorruptRecord`.
    pub fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        let doc = self.load_doc()?;
        for value in doc.records {
            if raw_id(&value) == Some(id) {
                let record = serde_json::from_value::<IndexRecord>(value)
                    .map_err(|e| LibraryError::CorruptRecord(format!("index record '{id}': {e}")))?;
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Insert or replace the record for `record.work.id`, leaving every
    /// other raw entry untouched.
    pub fn upsert(&self, record: &IndexRecord) -> Result<()> {
        let mut doc = self.load_doc()?;
        let value = serde_json::to_value(record)?;
        match doc
            .records
            .iter_mut()
            .find(|v| raw_id(v) == Some(record.work.id.as_str()))
        {
            Some(existing) => *existing = value,
            None => doc.records.push(value),
        }
        self.write_doc(doc)
    }

    /// Remove the record for `id`, if present.
    pub fn remove(&self, id: &str) -> Result<()> {
        let mut doc = self.load_doc()?;
        doc.records.retain(|v| raw_id(v) != Some(id));
        self.write_doc(doc)
    }
}

fn raw_id(value: &serde_json::Value) -> Option<&str> {
    value.get("id").and_then(|v| v.as_str())
}
