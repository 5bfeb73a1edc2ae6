//! Append-only audit trail
//!
//! Every mutating store operation appends exactly one entry; the log order
//! is the only total order across mutations ("what happened when"), distinct
//! from the index ("what exists now"). Entries are JSON lines so the file
//! stays greppable and individual line corruption never poisons the rest.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, starting at 1.
    pub seq: u64,
    pub at: DateTime<Utc>,
    /// Identity reference of the acting user, or "system".
    pub actor: String,
    /// Human-readable description of the action.
    pub action: String,
    /// Id of the affected entity.
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(&path, "")?;
        }
        Ok(Self { path })
    }

    /// Append one entry. The sequence number is derived from the current
    /// line count, so the log itself is the source of truth for ordering.
    pub fn append(&self, actor: &str, action: &str, subject: &str) -> Result<AuditEntry> {
        let seq = self.line_count()? + 1;
        let entry = AuditEntry {
            seq,
            at: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            subject: subject.to_string(),
        };
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(entry)
    }

    /// All entries in commit order. Unparseable lines are logged and
    /// skipped, never fatal.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let raw = fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (n, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(line = n + 1, error = %e, "Skipping corrupt audit line");
                }
            }
        }
        Ok(entries)
    }

    fn line_count(&self) -> Result<u64> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(raw.lines().filter(|l| !l.trim().is_empty()).count() as u64)
    }
}
