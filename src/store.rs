//! File-backed work repository
//!
//! The authoritative persistence layer. Enforces "folder = state": a work's
//! body text is stored under the catalog directory derived from its current
//! state and rights, the index record mirrors that location, and every
//! mutation appends one audit entry.
//!
//! ## Storage layout
//!
//! ```text
//! <data root>/
//! ├── pending/        # Submitted + InReview bodies
//! ├── public/         # Approved, public domain
//! ├── restricted/     # Approved, under rights (lendable)
//! ├── archive/        # Rejected, kept forever
//! ├── index.json      # one record per work ("what exists now")
//! └── audit.log       # append-only JSON lines ("what happened when")
//! ```
//!
//! `move_state` is three sub-steps (copy body to the new folder, update the
//! index, remove the old body) treated as one logical operation. There is no
//! transactional substrate underneath: if a later sub-step fails after an
//! earlier one succeeded, the store may be left with a body present in two
//! folders or an index mismatched with the filesystem. Failures are logged
//! with the work id and sub-step so the condition can be repaired by hand;
//! no automatic rollback is attempted.

use crate::audit::AuditLog;
use crate::error::{LibraryError, Result};
use crate::index::{IndexRecord, WorkIndex};
use crate::work::{Catalog, Work, WorkState};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

pub struct WorkStore {
    root: PathBuf,
    index: WorkIndex,
    audit: AuditLog,
}

impl WorkStore {
    /// Open or create a store rooted at `root`, with all catalog
    /// directories, the index, and the audit log in place.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        for catalog in Catalog::ALL {
            fs::create_dir_all(root.join(catalog.dir_name()))?;
        }
        let index = WorkIndex::open(root.join("index.json"))?;
        let audit = AuditLog::open(root.join("audit.log"))?;
        info!(path = %root.display(), "Opened work store");
        Ok(Self { root, index, audit })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    fn body_path(&self, catalog: Catalog, content_ref: &str) -> PathBuf {
        self.root.join(catalog.dir_name()).join(content_ref)
    }

    /// Persist a work and its body under the folder derived from its
    /// current state, upsert the index record, and audit the action.
    ///
    /// `save` is for creation and in-place updates (the catalog does not
    /// change); relocations go through [`WorkStore::move_state`].
    pub fn save(&self, actor: &str, work: &Work, body: &str) -> Result<()> {
        let catalog = work.catalog();
        let path = self.body_path(catalog, &work.content_ref);
        fs::write(&path, body).map_err(|e| {
            error!(id = %work.id, step = "write body", error = %e, "save failed");
            e
        })?;
        self.index.upsert(&IndexRecord::from_work(work))?;
        self.audit.append(
            actor,
            &format!("save '{}' [{}] in {}", work.title, work.state, catalog),
            &work.id,
        )?;
        debug!(id = %work.id, catalog = %catalog, "Stored work");
        Ok(())
    }

    /// Relocate a work whose state or rights changed. The work must already
    /// carry its new state; the old location comes from the index record.
    ///
    /// Copy-to-new, update index, remove-from-old — logically one
    /// operation, not atomic (see module docs).
    pub fn move_state(&self, actor: &str, work: &Work) -> Result<()> {
        let record = self
            .index
            .get(&work.id)?
            .ok_or_else(|| LibraryError::NotFound(format!("work '{}'", work.id)))?;
        let from = record.catalog;
        let to = work.catalog();

        if from == to {
            // Nothing to relocate; still an index update plus audit entry.
            self.index.upsert(&IndexRecord::from_work(work))?;
            self.audit.append(
                actor,
                &format!("update '{}' [{}] in {}", work.title, work.state, to),
                &work.id,
            )?;
            return Ok(());
        }

        let old_path = self.body_path(from, &record.work.content_ref);
        let new_path = self.body_path(to, &work.content_ref);

        // Sub-step 1: copy the body to the destination folder.
        fs::copy(&old_path, &new_path).map_err(|e| {
            error!(id = %work.id, step = "copy body", from = %from, to = %to, error = %e,
                   "move_state failed");
            e
        })?;

        // Sub-step 2: point the index at the new location.
        self.index.upsert(&IndexRecord::from_work(work)).map_err(|e| {
            error!(id = %work.id, step = "update index", from = %from, to = %to, error = %e,
                   "move_state failed; body now present in both folders");
            e
        })?;

        // Sub-step 3: remove the old body.
        fs::remove_file(&old_path).map_err(|e| {
            error!(id = %work.id, step = "remove old body", from = %from, error = %e,
                   "move_state failed; stale body left behind");
            e
        })?;

        self.audit.append(
            actor,
            &format!("move '{}' {} -> {} [{}]", work.title, from, to, work.state),
            &work.id,
        )?;
        info!(id = %work.id, from = %from, to = %to, "Moved work");
        Ok(())
    }

    /// Look a work up by id across all catalogs, in index order.
    pub fn load_by_id(&self, id: &str) -> Result<Work> {
        self.index
            .get(id)?
            .map(|r| r.work)
            .ok_or_else(|| LibraryError::NotFound(format!("work '{id}'")))
    }

    /// Look a work up by id, requiring it to live in `catalog`.
    pub fn load_from_catalog(&self, catalog: Catalog, id: &str) -> Result<Work> {
        match self.index.get(id)? {
            Some(record) if record.catalog == catalog => Ok(record.work),
            _ => Err(LibraryError::NotFound(format!(
                "work '{id}' in catalog '{catalog}'"
            ))),
        }
    }

    /// Read a work's body text from the artifact named by its index record.
    pub fn read_body(&self, id: &str) -> Result<String> {
        let record = self
            .index
            .get(id)?
            .ok_or_else(|| LibraryError::NotFound(format!("work '{id}'")))?;
        let path = self.body_path(record.catalog, &record.work.content_ref);
        if !path.exists() {
            return Err(LibraryError::NotFound(format!(
                "content artifact for '{id}' at {}",
                path.display()
            )));
        }
        Ok(fs::read_to_string(path)?)
    }

    /// Works currently in `catalog`, from the index. Corrupt records are
    /// skipped inside the index layer.
    pub fn list_by_catalog(&self, catalog: Catalog) -> Result<Vec<Work>> {
        Ok(self
            .index
            .records()?
            .into_iter()
            .filter(|r| r.catalog == catalog)
            .map(|r| r.work)
            .collect())
    }

    /// Works currently in `state`.
    pub fn list_by_state(&self, state: WorkState) -> Result<Vec<Work>> {
        Ok(self
            .index
            .records()?
            .into_iter()
            .filter(|r| r.work.state == state)
            .map(|r| r.work)
            .collect())
    }

    pub fn list_all(&self) -> Result<Vec<Work>> {
        Ok(self.index.records()?.into_iter().map(|r| r.work).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work::RightsStatus;
    use tempfile::TempDir;

    fn store() -> (WorkStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = WorkStore::open(temp.path()).unwrap();
        (store, temp)
    }

    #[test]
    fn test_save_places_body_in_state_folder() {
        let (store, temp) = store();
        let work = Work::new("Candide", "Voltaire", "bob@test.com");
        store.save("bob@test.com", &work, "# Candide\n\nIl y avait...").unwrap();

        assert!(temp.path().join("pending/Candide.md").exists());
        assert_eq!(store.read_body("Candide").unwrap(), "# Candide\n\nIl y avait...");
        assert_eq!(store.load_by_id("Candide").unwrap().state, WorkState::Submitted);
    }

    #[test]
    fn test_move_state_relocates_exactly_once() {
        let (store, temp) = store();
        let mut work = Work::new("Candide", "Voltaire", "bob@test.com");
        store.save("bob@test.com", &work, "body").unwrap();

        work.begin_review().unwrap();
        store.save("alice@test.com", &work, "body").unwrap();

        work.approve().unwrap();
        work.rights = RightsStatus::PublicDomain;
        store.move_state("alice@test.com", &work).unwrap();

        // Folder invariant: exactly one location, matching the new catalog
        assert!(temp.path().join("public/Candide.md").exists());
        assert!(!temp.path().join("pending/Candide.md").exists());

        let loaded = store.load_by_id("Candide").unwrap();
        assert_eq!(loaded.state, WorkState::Approved);
        assert_eq!(loaded.catalog(), Catalog::Public);
        assert_eq!(store.read_body("Candide").unwrap(), "body");
    }

    #[test]
    fn test_move_state_same_catalog_updates_index_only() {
        let (store, temp) = store();
        let mut work = Work::new("Candide", "Voltaire", "bob@test.com");
        store.save("bob@test.com", &work, "body").unwrap();

        work.begin_review().unwrap();
        store.move_state("alice@test.com", &work).unwrap();

        assert!(temp.path().join("pending/Candide.md").exists());
        assert_eq!(store.load_by_id("Candide").unwrap().state, WorkState::InReview);
    }

    #[test]
    fn test_listing_by_catalog_and_state() {
        let (store, _temp) = store();
        let a = Work::new("A", "x", "bob@test.com");
        let mut b = Work::new("B", "y", "bob@test.com");
        store.save("bob@test.com", &a, "a").unwrap();
        store.save("bob@test.com", &b, "b").unwrap();

        b.begin_review().unwrap();
        store.save("alice@test.com", &b, "b").unwrap();

        assert_eq!(store.list_by_catalog(Catalog::Pending).unwrap().len(), 2);
        assert_eq!(store.list_by_state(WorkState::Submitted).unwrap().len(), 1);
        assert_eq!(store.list_by_state(WorkState::InReview).unwrap().len(), 1);
        assert!(store.list_by_catalog(Catalog::Public).unwrap().is_empty());
        assert_eq!(store.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_load_missing_work_is_not_found() {
        let (store, _temp) = store();
        assert!(matches!(
            store.load_by_id("Ghost"),
            Err(LibraryError::NotFound(_))
        ));
        assert!(matches!(
            store.load_from_catalog(Catalog::Restricted, "Ghost"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_from_wrong_catalog_is_not_found() {
        let (store, _temp) = store();
        let work = Work::new("Candide", "Voltaire", "bob@test.com");
        store.save("bob@test.com", &work, "body").unwrap();

        assert!(store.load_from_catalog(Catalog::Pending, "Candide").is_ok());
        assert!(matches!(
            store.load_from_catalog(Catalog::Restricted, "Candide"),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_every_mutation_appends_one_audit_entry() {
        let (store, _temp) = store();
        let mut work = Work::new("Candide", "Voltaire", "bob@test.com");
        store.save("bob@test.com", &work, "body").unwrap();

        work.begin_review().unwrap();
        store.save("alice@test.com", &work, "body").unwrap();

        work.approve().unwrap();
        work.rights = RightsStatus::Sequestered;
        store.move_state("alice@test.com", &work).unwrap();

        let entries = store.audit().entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.last().unwrap().seq, 3);
        assert!(entries[2].action.contains("pending -> restricted"));
    }
}
