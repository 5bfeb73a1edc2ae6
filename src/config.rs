//! Configuration for workshelf

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default library data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("workshelf")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for catalogs, loans, promotions, and users
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Loan duration in days
    #[serde(default = "default_lease_days")]
    pub lease_days: i64,

    /// Rights term in years before restricted works fall into the
    /// public domain
    #[serde(default = "default_rights_term_years")]
    pub rights_term_years: i32,
}

fn default_lease_days() -> i64 {
    crate::loans::DEFAULT_LEASE_DAYS
}

fn default_rights_term_years() -> i32 {
    crate::sweep::DEFAULT_RIGHTS_TERM_YEARS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lease_days: default_lease_days(),
            rights_term_years: default_rights_term_years(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| LibraryError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| LibraryError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get works directory (catalog folders, index, audit log)
    pub fn works_dir(&self) -> PathBuf {
        self.data_dir.join("works")
    }

    /// Get loans directory
    pub fn loans_dir(&self) -> PathBuf {
        self.data_dir.join("loans")
    }

    /// Get promotions directory
    pub fn promotions_dir(&self) -> PathBuf {
        self.data_dir.join("promotions")
    }

    /// Get user registry path
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join("users.json")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}
