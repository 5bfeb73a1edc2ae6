//! User repository
//!
//! Users live in a single `users.json` document keyed by identity reference.
//! Like the work index, persistence is a whole-file read-modify-write with
//! last-writer-wins semantics; concurrent mutators are the caller's problem.

use crate::error::{LibraryError, Result};
use crate::rbac::User;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    /// Open or create the user database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            fs::write(&path, serde_json::to_string_pretty(&BTreeMap::<String, User>::new())?)?;
            info!(path = %path.display(), "Initialized user store");
        }
        Ok(Self { path })
    }

    fn load_all(&self) -> Result<BTreeMap<String, User>> {
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Insert or replace a user record.
    pub fn save(&self, user: &User) -> Result<()> {
        let mut users = self.load_all()?;
        users.insert(user.id.clone(), user.clone());
        fs::write(&self.path, serde_json::to_string_pretty(&users)?)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<User> {
        self.load_all()?
            .remove(id)
            .ok_or_else(|| LibraryError::NotFound(format!("user '{id}'")))
    }

    pub fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.load_all()?.contains_key(id))
    }

    pub fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.load_all()?.into_values().collect())
    }
}
