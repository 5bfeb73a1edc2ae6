//! Library facade
//!
//! Ties the permission gate, the extraction provider, and the work store
//! into the operations callers actually use: register, submit, moderate,
//! browse. Loans and promotions have their own managers; this service
//! covers the work lifecycle itself.

use crate::error::{LibraryError, Result};
use crate::providers::TextExtractionProvider;
use crate::rbac::{permissions, User};
use crate::store::WorkStore;
use crate::users::UserStore;
use crate::work::{Catalog, RightsStatus, Work};
use tracing::info;

pub struct LibraryService {
    store: WorkStore,
    users: UserStore,
    extractor: Box<dyn TextExtractionProvider>,
}

impl LibraryService {
    pub fn new(store: WorkStore, users: UserStore, extractor: Box<dyn TextExtractionProvider>) -> Self {
        Self {
            store,
            users,
            extractor,
        }
    }

    pub fn store(&self) -> &WorkStore {
        &self.store
    }

    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// Register a new member. Identity references are unique.
    pub fn register_member(&self, id: &str, name: &str, secret: &str) -> Result<User> {
        if self.users.exists(id)? {
            return Err(LibraryError::DuplicateResource(format!("user '{id}'")));
        }
        let user = User::new(id, name, secret);
        self.users.save(&user)?;
        info!(id = %user.id, "Member registered");
        Ok(user)
    }

    /// Deposit raw content as a new work awaiting moderation.
    ///
    /// The extraction provider proposes title, author, and publication
    /// metadata from the raw bytes; explicit `title`/`author` arguments
    /// override the proposal. The work lands in the pending catalog.
    pub fn submit_work(
        &self,
        user: &User,
        raw: &[u8],
        title: Option<&str>,
        author: Option<&str>,
        categories: &[&str],
    ) -> Result<Work> {
        user.require(permissions::SUBMIT_WORK)?;

        let extraction = self.extractor.extract(raw);
        let title = title
            .map(|t| t.to_string())
            .or(extraction.title)
            .unwrap_or_else(|| "Untitled".to_string());
        let author = author
            .map(|a| a.to_string())
            .or(extraction.author)
            .unwrap_or_else(|| "Unknown".to_string());

        let mut work = Work::new(&title, &author, &user.id);
        work.categories = categories.iter().map(|c| c.to_string()).collect();
        work.publication_date = extraction.publication_date;
        if extraction.public_domain_guess {
            work.rights = RightsStatus::PublicDomain;
        }
        if self.store.load_by_id(&work.id).is_ok() {
            return Err(LibraryError::DuplicateResource(format!("work '{}'", work.id)));
        }

        self.store.save(&user.id, &work, &extraction.body)?;
        info!(id = %work.id, by = %user.id, "Work submitted");
        Ok(work)
    }

    /// Claim a submitted work for review. It stays in the pending catalog.
    pub fn begin_review(&self, librarian: &User, work_id: &str) -> Result<Work> {
        librarian.require(permissions::MODERATE_WORK)?;
        let mut work = self.store.load_from_catalog(Catalog::Pending, work_id)?;
        work.begin_review()?;
        self.store.save(&librarian.id, &work, &self.store.read_body(work_id)?)?;
        info!(id = %work.id, by = %librarian.id, "Review started");
        Ok(work)
    }

    /// Approve a work under review.
    ///
    /// `public` routes it: true means public domain and the public catalog,
    /// false means sequestered and the restricted catalog.
    pub fn approve(&self, librarian: &User, work_id: &str, public: bool) -> Result<Work> {
        librarian.require(permissions::MODERATE_WORK)?;
        let mut work = self.store.load_from_catalog(Catalog::Pending, work_id)?;
        work.approve()?;
        work.rights = if public {
            RightsStatus::PublicDomain
        } else {
            RightsStatus::Sequestered
        };
        self.store.move_state(&librarian.id, &work)?;
        info!(id = %work.id, by = %librarian.id, catalog = work.catalog().dir_name(),
              "Work approved");
        Ok(work)
    }

    /// Reject a work under review, recording the reason, and archive it.
    pub fn reject(&self, librarian: &User, work_id: &str, reason: &str) -> Result<Work> {
        librarian.require(permissions::MODERATE_WORK)?;
        let mut work = self.store.load_from_catalog(Catalog::Pending, work_id)?;
        work.reject()?;
        work.set_metadata("rejection_reason", reason);
        self.store.move_state(&librarian.id, &work)?;
        info!(id = %work.id, by = %librarian.id, reason, "Work rejected");
        Ok(work)
    }

    /// Works awaiting moderation, for the review queue.
    pub fn list_pending(&self, librarian: &User) -> Result<Vec<Work>> {
        librarian.require(permissions::MODERATE_WORK)?;
        self.store.list_by_catalog(Catalog::Pending)
    }

    /// Freely readable works. No permission needed.
    pub fn list_public(&self) -> Result<Vec<Work>> {
        self.store.list_by_catalog(Catalog::Public)
    }

    /// Works available for borrowing.
    pub fn list_restricted(&self) -> Result<Vec<Work>> {
        self.store.list_by_catalog(Catalog::Restricted)
    }

    /// Read the body of a public-catalog work.
    pub fn read_public(&self, work_id: &str) -> Result<String> {
        self.store.load_from_catalog(Catalog::Public, work_id)?;
        self.store.read_body(work_id)
    }
}
