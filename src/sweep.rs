//! Rights-term expiry sweep
//!
//! Sequestered works fall into the public domain once the rights term has
//! elapsed. The sweeper walks the restricted catalog, compares each
//! sequestered work's publication year against the current year, and
//! relocates the expired ones to the public catalog. Works that are merely
//! under rights (no expiry scheduled) are never touched.

use crate::error::Result;
use crate::rbac::{permissions, User};
use crate::store::WorkStore;
use crate::work::{Catalog, RightsStatus};
use chrono::{Datelike, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Default rights term in years.
pub const DEFAULT_RIGHTS_TERM_YEARS: i32 = 70;

/// Outcome of a sweep pass. `skipped` counts works that stayed restricted,
/// whether still under term, not sequestered, or undated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub released: Vec<String>,
    pub skipped: usize,
}

pub struct RightsExpirySweeper {
    term_years: i32,
}

impl Default for RightsExpirySweeper {
    fn default() -> Self {
        Self::new(DEFAULT_RIGHTS_TERM_YEARS)
    }
}

impl RightsExpirySweeper {
    pub fn new(term_years: i32) -> Self {
        Self { term_years }
    }

    /// Release expired sequestered works from the restricted catalog.
    ///
    /// A work expires when strictly more than `term_years` whole years have
    /// passed since its publication year: published in year Y, it stays
    /// restricted through Y + term and releases in Y + term + 1. Works
    /// without a parseable publication year are skipped with a warning.
    /// Running the sweep twice is a no-op the second time.
    pub fn sweep(&self, actor: &User, store: &WorkStore) -> Result<SweepReport> {
        actor.require(permissions::MODERATE_WORK)?;

        let current_year = Utc::now().year();
        let mut report = SweepReport {
            released: Vec::new(),
            skipped: 0,
        };

        for mut work in store.list_by_catalog(Catalog::Restricted)? {
            if work.rights != RightsStatus::Sequestered {
                report.skipped += 1;
                continue;
            }
            let year = match work.publication_date.as_deref().and_then(leading_year) {
                Some(year) => year,
                None => {
                    warn!(id = %work.id, date = ?work.publication_date,
                          "No publication year, leaving restricted");
                    report.skipped += 1;
                    continue;
                }
            };
            if current_year - year > self.term_years {
                work.rights = RightsStatus::PublicDomain;
                store.move_state(&actor.id, &work)?;
                info!(id = %work.id, year, "Rights expired, released to public catalog");
                report.released.push(work.id);
            } else {
                report.skipped += 1;
            }
        }

        info!(
            released = report.released.len(),
            skipped = report.skipped,
            "Rights expiry sweep complete"
        );
        Ok(report)
    }
}

/// Leading 4-digit year of a date string such as "1862" or "1862-04-03".
fn leading_year(date: &str) -> Option<i32> {
    let digits: String = date.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}
