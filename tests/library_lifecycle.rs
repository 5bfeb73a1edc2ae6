//! End-to-end lifecycle over a real directory tree
//!
//! Walks a work from submission through moderation into the restricted
//! catalog, borrows it, and lets the rights sweep release it to the public
//! catalog, checking the folder layout and audit trail along the way.

use chrono::{Datelike, Utc};
use tempfile::TempDir;
use workshelf::{
    Catalog, EncryptionProvider, LibraryError, LibraryService, Loan, LoanManager,
    PlainTextExtractor, PromotionService, PromotionStore, Result, RightsExpirySweeper,
    RightsStatus, Role, User, UserStore, WorkState, WorkStore, DEFAULT_LEASE_DAYS,
};

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

struct Library {
    service: LibraryService,
    loans: LoanManager,
    _temp: TempDir,
}

fn open_library() -> Library {
    // RUST_LOG-driven output for debugging test failures; ignore the error
    // when another test already installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let temp = TempDir::new().unwrap();
    let store = WorkStore::open(temp.path().join("works")).unwrap();
    let users = UserStore::open(temp.path().join("users.json")).unwrap();
    let loans = LoanManager::open(temp.path().join("loans"), Box::new(XorCipher)).unwrap();
    Library {
        service: LibraryService::new(store, users, Box::new(PlainTextExtractor)),
        loans,
        _temp: temp,
    }
}

fn register_librarian(service: &LibraryService, id: &str, name: &str) -> User {
    let mut user = service.register_member(id, name, "secret").unwrap();
    user.grant_role(Role::librarian());
    service.users().save(&user).unwrap();
    user
}

#[test]
fn test_full_lifecycle_submission_to_public_domain() {
    let mut lib = open_library();
    let bob = lib.service.register_member("bob@test.com", "Bob", "secret").unwrap();
    let alice = register_librarian(&lib.service, "alice@test.com", "Alice");

    // Bob deposits a novel; it waits in the pending catalog.
    let body = "Un soir de 1815, un homme entra dans la petite ville de Digne.";
    let work = lib
        .service
        .submit_work(&bob, body.as_bytes(), Some("Les Misérables"), Some("Victor Hugo"), &["Roman", "Culture"])
        .unwrap();
    assert_eq!(work.state, WorkState::Submitted);

    let root = lib.service.store().root().to_path_buf();
    assert!(root.join("pending").join(&work.content_ref).exists());

    // Alice reviews and approves it as still under rights (not public).
    lib.service.begin_review(&alice, &work.id).unwrap();
    let mut approved = lib.service.approve(&alice, &work.id, false).unwrap();
    assert_eq!(approved.state, WorkState::Approved);
    assert_eq!(approved.catalog(), Catalog::Restricted);
    assert!(root.join("restricted").join(&work.content_ref).exists());
    assert!(!root.join("pending").join(&work.content_ref).exists());

    // Bob borrows it; the payload decrypts back to the original text.
    let loan = lib
        .loans
        .borrow(&bob, lib.service.store(), &work.id, DEFAULT_LEASE_DAYS)
        .unwrap();
    assert_eq!(loan.remaining_days(), 14);
    let plaintext = lib.loans.read_payload(&bob, &loan.id).unwrap();
    assert_eq!(String::from_utf8(plaintext).unwrap(), body);
    lib.loans.return_loan(&bob, &loan.id).unwrap();

    // Decades later the rights term runs out and the sweep releases it.
    assert_eq!(approved.rights, RightsStatus::Sequestered);
    approved.publication_date = Some((Utc::now().year() - 164).to_string());
    lib.service
        .store()
        .move_state(&alice.id, &approved)
        .unwrap();

    let report = RightsExpirySweeper::default()
        .sweep(&alice, lib.service.store())
        .unwrap();
    assert_eq!(report.released, vec![work.id.clone()]);
    assert!(root.join("public").join(&work.content_ref).exists());
    assert!(!root.join("restricted").join(&work.content_ref).exists());
    assert_eq!(lib.service.read_public(&work.id).unwrap(), body);

    // Every step left an audit entry.
    let audit = lib.service.store().audit().entries().unwrap();
    assert!(audit.len() >= 4);
    assert!(audit.iter().all(|e| !e.actor.is_empty()));
}

#[test]
fn test_rejected_work_is_archived_with_reason() {
    let lib = open_library();
    let bob = lib.service.register_member("bob@test.com", "Bob", "secret").unwrap();
    let alice = register_librarian(&lib.service, "alice@test.com", "Alice");

    let work = lib
        .service
        .submit_work(&bob, b"BUY NOW!!!", Some("Advertisement"), None, &[])
        .unwrap();
    lib.service.begin_review(&alice, &work.id).unwrap();
    lib.service.reject(&alice, &work.id, "commercial content").unwrap();

    let root = lib.service.store().root().to_path_buf();
    assert!(root.join("archive").join(&work.content_ref).exists());

    let archived = lib.service.store().load_by_id(&work.id).unwrap();
    assert_eq!(archived.state, WorkState::Rejected);
    assert_eq!(
        archived.metadata.get("rejection_reason").and_then(|v| v.as_str()),
        Some("commercial content")
    );
}

#[test]
fn test_promoted_member_can_moderate() {
    let lib = open_library();
    let ud = lib._temp.path().join("users.json");

    let bob = lib.service.register_member("bob@test.com", "Bob", "secret").unwrap();
    let alice = register_librarian(&lib.service, "alice@test.com", "Alice");

    let promotions =
        PromotionStore::open(lib._temp.path().join("promotions")).unwrap();
    let promotion_service =
        PromotionService::new(promotions, UserStore::open(&ud).unwrap());

    // Bob cannot moderate yet.
    let work = lib
        .service
        .submit_work(&bob, b"text", Some("A Book"), None, &[])
        .unwrap();
    assert!(lib.service.begin_review(&bob, &work.id).is_err());

    // Bob asks, Alice approves, and the reloaded Bob can moderate.
    let request = promotion_service.submit(&bob, "I read everything").unwrap();
    promotion_service.approve(&alice, &request.id, None).unwrap();

    let promoted_bob = lib.service.users().get("bob@test.com").unwrap();
    lib.service.begin_review(&promoted_bob, &work.id).unwrap();
    let reviewed = lib.service.store().load_by_id(&work.id).unwrap();
    assert_eq!(reviewed.state, WorkState::InReview);
}

#[test]
fn test_loan_table_survives_restart() {
    let mut lib = open_library();
    let bob = lib.service.register_member("bob@test.com", "Bob", "secret").unwrap();
    let alice = register_librarian(&lib.service, "alice@test.com", "Alice");

    let work = lib
        .service
        .submit_work(&bob, b"chapter one", Some("Serial Novel"), None, &[])
        .unwrap();
    lib.service.begin_review(&alice, &work.id).unwrap();
    lib.service.approve(&alice, &work.id, false).unwrap();

    let loan = lib
        .loans
        .borrow(&bob, lib.service.store(), &work.id, 7)
        .unwrap();

    let reopened =
        LoanManager::open(lib._temp.path().join("loans"), Box::new(XorCipher)).unwrap();
    let mine: Vec<Loan> = reopened.list_mine(&bob);
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, loan.id);
    assert_eq!(reopened.read_payload(&bob, &loan.id).unwrap(), b"chapter one");
}
