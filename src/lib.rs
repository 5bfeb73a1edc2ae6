//! Workshelf - Moderated digital library with catalog-backed storage
//!
//! Works move through a moderation lifecycle (submitted, in review, then
//! approved or rejected) and the storage layout mirrors that lifecycle: a
//! work's file lives in exactly one catalog folder at a time, decided by
//! its state and rights status. Restricted works can be borrowed on
//! time-boxed loans, encrypted under the borrower's key.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/workshelf/
//! ├── works/
//! │   ├── pending/           # Submitted and in-review works
//! │   ├── public/            # Approved, public domain
//! │   ├── restricted/        # Approved, under rights or sequestered
//! │   ├── archive/           # Rejected works
//! │   ├── index.json         # Catalog index over all works
//! │   └── audit.log          # Append-only audit trail (JSON lines)
//! ├── loans/                 # Loan records + encrypted payloads
//! ├── promotions/            # Librarian promotion requests
//! ├── users.json             # User registry
//! └── config.toml            # Configuration
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod index;
pub mod loans;
pub mod promotion;
pub mod providers;
pub mod rbac;
pub mod service;
pub mod store;
pub mod sweep;
pub mod users;
pub mod work;

// Re-exports
pub use audit::{AuditEntry, AuditLog};
pub use config::Config;
pub use error::{LibraryError, Result};
pub use loans::{Loan, LoanManager, DEFAULT_LEASE_DAYS};
pub use promotion::{PromotionRequest, PromotionService, PromotionStats, PromotionStatus, PromotionStore};
pub use providers::{EncryptionProvider, Extraction, PlainTextExtractor, TextExtractionProvider};
pub use rbac::{Role, User};
pub use service::LibraryService;
pub use store::WorkStore;
pub use sweep::{RightsExpirySweeper, SweepReport, DEFAULT_RIGHTS_TERM_YEARS};
pub use users::UserStore;
pub use work::{Catalog, RightsStatus, Work, WorkAction, WorkState};
