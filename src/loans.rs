//! Time-boxed, encrypted lending
//!
//! A loan grants a member access to a restricted work for a bounded period.
//! The body text is encrypted under the borrower's personal key at borrow
//! time and the ciphertext is discarded when the loan is returned.
//!
//! Loans are persisted one JSON record per loan under `loans/` (with the
//! ciphertext beside it as `<id>.enc`); the in-memory table is a
//! read-through cache rebuilt from those records at construction, never the
//! system of record.

use crate::error::{LibraryError, Result};
use crate::providers::EncryptionProvider;
use crate::rbac::{permissions, User};
use crate::store::WorkStore;
use crate::work::{Catalog, Work};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default lease duration in days, for both borrow and renew.
pub const DEFAULT_LEASE_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: String,
    pub work_id: String,
    pub work_title: String,
    /// Identity reference of the borrowing user.
    pub borrower: String,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub active: bool,
    /// File name of the encrypted body, relative to the loans directory.
    pub encrypted_ref: String,
}

impl Loan {
    fn new(work: &Work, borrower: &str, lease_days: i64) -> Self {
        let id = format!("loan_{}", uuid::Uuid::new_v4().simple());
        let started_at = Utc::now();
        Self {
            encrypted_ref: format!("{id}.enc"),
            id,
            work_id: work.id.clone(),
            work_title: work.title.clone(),
            borrower: borrower.to_string(),
            started_at,
            ends_at: started_at + Duration::days(lease_days),
            active: true,
        }
    }

    /// Whole days remaining, rounded up: any positive residual beyond whole
    /// days counts as one more, so a loan ending later today still reports
    /// 1. Inactive loans report 0, as do active loans past their end.
    pub fn remaining_days(&self) -> i64 {
        if !self.active {
            return 0;
        }
        let delta = self.ends_at - Utc::now();
        if delta <= Duration::zero() {
            return 0;
        }
        let days = delta.num_days();
        if delta > Duration::days(days) {
            days + 1
        } else {
            days
        }
    }

    /// An active loan whose end has passed.
    pub fn is_expired(&self) -> bool {
        self.active && Utc::now() > self.ends_at
    }

    /// Extend an active loan by `extra_days`. Inactive loans cannot be
    /// renewed.
    pub fn renew(&mut self, extra_days: i64) -> Result<()> {
        if !self.active {
            return Err(LibraryError::InvalidTransition {
                state: "inactive loan".to_string(),
                action: "renew".to_string(),
            });
        }
        self.ends_at = self.ends_at + Duration::days(extra_days);
        Ok(())
    }
}

pub struct LoanManager {
    dir: PathBuf,
    provider: Box<dyn EncryptionProvider>,
    /// Read-through cache over the persisted records, keyed by loan id.
    loans: HashMap<String, Loan>,
}

impl LoanManager {
    /// Open the loan directory and rehydrate the in-memory table from the
    /// persisted records. Unreadable records are logged and skipped.
    pub fn open<P: AsRef<Path>>(dir: P, provider: Box<dyn EncryptionProvider>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut loans = HashMap::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(LibraryError::from)
                .and_then(|raw| serde_json::from_str::<Loan>(&raw).map_err(LibraryError::from))
            {
                Ok(loan) => {
                    loans.insert(loan.id.clone(), loan);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping corrupt loan record");
                }
            }
        }
        info!(path = %dir.display(), count = loans.len(), "Rehydrated loan table");
        Ok(Self { dir, provider, loans })
    }

    fn record_path(&self, loan_id: &str) -> PathBuf {
        self.dir.join(format!("{loan_id}.json"))
    }

    fn persist(&self, loan: &Loan) -> Result<()> {
        fs::write(self.record_path(&loan.id), serde_json::to_string_pretty(loan)?)?;
        Ok(())
    }

    fn active_loan_exists(&self, borrower: &str, work_id: &str) -> bool {
        self.loans
            .values()
            .any(|l| l.active && l.borrower == borrower && l.work_id == work_id)
    }

    /// Borrow a restricted work for `lease_days`.
    ///
    /// Requires `borrow_work`; the work must be loadable from the
    /// restricted catalog, and at most one active loan may exist per
    /// (borrower, work) pair.
    pub fn borrow(
        &mut self,
        user: &User,
        store: &WorkStore,
        work_id: &str,
        lease_days: i64,
    ) -> Result<Loan> {
        user.require(permissions::BORROW_WORK)?;

        let work = store.load_from_catalog(Catalog::Restricted, work_id)?;
        if self.active_loan_exists(&user.id, work_id) {
            return Err(LibraryError::DuplicateResource(format!(
                "active loan for '{work_id}' by {}",
                user.id
            )));
        }

        let body = store.read_body(work_id)?;
        let key = user.loan_key_bytes()?;
        let ciphertext = self.provider.encrypt(body.as_bytes(), &key)?;

        let loan = Loan::new(&work, &user.id, lease_days);
        fs::write(self.dir.join(&loan.encrypted_ref), &ciphertext)?;
        self.persist(&loan)?;
        self.loans.insert(loan.id.clone(), loan.clone());

        info!(loan = %loan.id, work = %work_id, borrower = %user.id, days = lease_days,
              "Loan created");
        Ok(loan)
    }

    /// Return a loan: the only way to deactivate one. The record and the
    /// encrypted payload are removed; the work itself is untouched.
    pub fn return_loan(&mut self, user: &User, loan_id: &str) -> Result<()> {
        let loan = match self.loans.get_mut(loan_id) {
            Some(loan) if loan.borrower == user.id => loan,
            _ => return Err(LibraryError::NotFound(format!("loan '{loan_id}'"))),
        };
        loan.active = false;

        let encrypted = self.dir.join(&loan.encrypted_ref);
        let record = self.record_path(loan_id);
        fs::remove_file(&record)?;
        // Payload may already be gone; the record removal is what matters.
        if let Err(e) = fs::remove_file(&encrypted) {
            warn!(loan = %loan_id, error = %e, "Could not remove encrypted payload");
        }
        self.loans.remove(loan_id);

        info!(loan = %loan_id, borrower = %user.id, "Loan returned");
        Ok(())
    }

    /// The user's active loans, oldest first.
    pub fn list_mine(&self, user: &User) -> Vec<Loan> {
        let mut mine: Vec<Loan> = self
            .loans
            .values()
            .filter(|l| l.active && l.borrower == user.id)
            .cloned()
            .collect();
        mine.sort_by_key(|l| l.started_at);
        mine
    }

    pub fn get(&self, loan_id: &str) -> Option<&Loan> {
        self.loans.get(loan_id)
    }

    /// Extend one of the user's active loans by `extra_days`.
    pub fn renew(&mut self, user: &User, loan_id: &str, extra_days: i64) -> Result<Loan> {
        let loan = match self.loans.get_mut(loan_id) {
            Some(loan) if loan.borrower == user.id => loan,
            _ => return Err(LibraryError::NotFound(format!("loan '{loan_id}'"))),
        };
        loan.renew(extra_days)?;
        let snapshot = loan.clone();
        self.persist(&snapshot)?;
        info!(loan = %loan_id, days = extra_days, "Loan renewed");
        Ok(snapshot)
    }

    /// Decrypt a loan's stored payload with the borrower's key.
    pub fn read_payload(&self, user: &User, loan_id: &str) -> Result<Vec<u8>> {
        let loan = match self.loans.get(loan_id) {
            Some(loan) if loan.borrower == user.id => loan,
            _ => return Err(LibraryError::NotFound(format!("loan '{loan_id}'"))),
        };
        let ciphertext = fs::read(self.dir.join(&loan.encrypted_ref))?;
        self.provider.decrypt(&ciphertext, &user.loan_key_bytes()?)
    }

    /// Report active loans whose end has passed. Read-only: expiry is
    /// reported, not enforced, and nothing is deactivated here.
    pub fn sweep_expired(&self) -> Vec<Loan> {
        self.loans
            .values()
            .filter(|l| l.is_expired())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Role;
    use tempfile::TempDir;

    /// Keyed XOR stand-in for the external encryption primitive.
    struct XorCipher;

    impl EncryptionProvider for XorCipher {
        fn encrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
            if key.is_empty() {
                return Err(LibraryError::Crypto("empty key".to_string()));
            }
            Ok(data
                .iter()
                .zip(key.iter().cycle())
                .map(|(d, k)| d ^ k)
                .collect())
        }

        fn decrypt(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
            self.encrypt(data, key)
        }
    }

    fn setup() -> (WorkStore, LoanManager, User, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = WorkStore::open(temp.path().join("works")).unwrap();
        let loans = LoanManager::open(temp.path().join("loans"), Box::new(XorCipher)).unwrap();
        let bob = User::new("bob@test.com", "Bob", "secret");
        (store, loans, bob, temp)
    }

    fn restricted_work(store: &WorkStore, title: &str) -> Work {
        let mut work = Work::new(title, "Victor Hugo", "bob@test.com");
        store.save("bob@test.com", &work, "Un soir de 1815...").unwrap();
        work.begin_review().unwrap();
        work.approve().unwrap();
        work.rights = crate::work::RightsStatus::Sequestered;
        store.move_state("alice@test.com", &work).unwrap();
        work
    }

    #[test]
    fn test_borrow_creates_active_loan_with_lease() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");

        let loan = loans.borrow(&bob, &store, &work.id, DEFAULT_LEASE_DAYS).unwrap();
        assert!(loan.active);
        assert_eq!(loan.ends_at, loan.started_at + Duration::days(14));
        assert_eq!(loans.list_mine(&bob).len(), 1);
    }

    #[test]
    fn test_borrow_requires_restricted_catalog() {
        let (store, mut loans, bob, _temp) = setup();
        let work = Work::new("Pending Book", "X", "bob@test.com");
        store.save("bob@test.com", &work, "body").unwrap();

        assert!(matches!(
            loans.borrow(&bob, &store, &work.id, 14),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_no_double_booking() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");

        loans.borrow(&bob, &store, &work.id, 14).unwrap();
        assert!(matches!(
            loans.borrow(&bob, &store, &work.id, 14),
            Err(LibraryError::DuplicateResource(_))
        ));
        // Still exactly one active loan for the pair
        assert_eq!(loans.list_mine(&bob).len(), 1);
    }

    #[test]
    fn test_borrow_requires_permission() {
        let (store, mut loans, mut bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        bob.roles.clear();

        assert!(matches!(
            loans.borrow(&bob, &store, &work.id, 14),
            Err(LibraryError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn test_return_removes_record_and_payload() {
        let (store, mut loans, bob, temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();

        let enc = temp.path().join("loans").join(&loan.encrypted_ref);
        assert!(enc.exists());

        loans.return_loan(&bob, &loan.id).unwrap();
        assert!(loans.list_mine(&bob).is_empty());
        assert!(loans.get(&loan.id).is_none());
        assert!(!enc.exists());
    }

    #[test]
    fn test_return_is_owner_checked() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();

        let alice = User::new("alice@test.com", "Alice", "secret");
        assert!(matches!(
            loans.return_loan(&alice, &loan.id),
            Err(LibraryError::NotFound(_))
        ));
    }

    #[test]
    fn test_payload_round_trips_through_borrower_key() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();

        let plaintext = loans.read_payload(&bob, &loan.id).unwrap();
        assert_eq!(plaintext, b"Un soir de 1815...");
    }

    #[test]
    fn test_renew_extends_active_loan_only() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();

        let renewed = loans.renew(&bob, &loan.id, 14).unwrap();
        assert_eq!(renewed.ends_at, loan.ends_at + Duration::days(14));

        let mut returned = renewed;
        returned.active = false;
        assert!(matches!(
            returned.renew(7),
            Err(LibraryError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_remaining_days_rounds_up() {
        let work = Work::new("X", "Y", "bob@test.com");
        let mut loan = Loan::new(&work, "bob@test.com", 14);

        // Ends later today: still one day remaining
        loan.ends_at = Utc::now() + Duration::minutes(90);
        assert_eq!(loan.remaining_days(), 1);

        // Just over a day: two
        loan.ends_at = Utc::now() + Duration::days(1) + Duration::minutes(5);
        assert_eq!(loan.remaining_days(), 2);

        // Past end but still active: zero
        loan.ends_at = Utc::now() - Duration::hours(1);
        assert_eq!(loan.remaining_days(), 0);
        assert!(loan.is_expired());

        // Inactive: zero regardless of end
        loan.active = false;
        loan.ends_at = Utc::now() + Duration::days(10);
        assert_eq!(loan.remaining_days(), 0);
    }

    #[test]
    fn test_sweep_expired_reports_without_deactivating() {
        let (store, mut loans, bob, _temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();

        assert!(loans.sweep_expired().is_empty());

        // Force the loan past its end
        loans.loans.get_mut(&loan.id).unwrap().ends_at = Utc::now() - Duration::days(1);

        let expired = loans.sweep_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, loan.id);
        // Report-only: the loan stays active
        assert!(loans.get(&loan.id).unwrap().active);
    }

    #[test]
    fn test_rehydration_from_disk() {
        let (store, mut loans, bob, temp) = setup();
        let work = restricted_work(&store, "Les Misérables");
        let loan = loans.borrow(&bob, &store, &work.id, 14).unwrap();
        drop(loans);

        let reopened = LoanManager::open(temp.path().join("loans"), Box::new(XorCipher)).unwrap();
        let mine = reopened.list_mine(&bob);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, loan.id);
    }
}
