//! Work entity and moderation state machine
//!
//! A `Work` is a submitted document progressing through moderation. Its state
//! machine is a closed enumeration with an explicit transition table, so the
//! legal transition set is enumerable and testable without touching storage.
//! The entity never performs I/O; persistence and folder moves are the
//! store's responsibility.

use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Moderation state of a work.
///
/// Transition graph: `Submitted -> InReview -> {Approved, Rejected}`.
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkState {
    Submitted,
    InReview,
    Approved,
    Rejected,
}

/// Actions accepted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkAction {
    BeginReview,
    Approve,
    Reject,
}

impl WorkState {
    /// Transition table: `(state, action) -> state | InvalidTransition`.
    pub fn apply(self, action: WorkAction) -> Result<WorkState> {
        match (self, action) {
            (WorkState::Submitted, WorkAction::BeginReview) => Ok(WorkState::InReview),
            (WorkState::InReview, WorkAction::Approve) => Ok(WorkState::Approved),
            (WorkState::InReview, WorkAction::Reject) => Ok(WorkState::Rejected),
            (state, action) => Err(LibraryError::InvalidTransition {
                state: state.as_str().to_string(),
                action: action.as_str().to_string(),
            }),
        }
    }

    /// Terminal states accept no further actions.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkState::Approved | WorkState::Rejected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkState::Submitted => "Submitted",
            WorkState::InReview => "InReview",
            WorkState::Approved => "Approved",
            WorkState::Rejected => "Rejected",
        }
    }
}

impl WorkAction {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkAction::BeginReview => "begin_review",
            WorkAction::Approve => "approve",
            WorkAction::Reject => "reject",
        }
    }
}

impl std::fmt::Display for WorkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rights status of a work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RightsStatus {
    /// Under copyright, not lendable, not public.
    UnderRights,
    /// Held back awaiting rights expiry; lendable from the restricted catalog.
    Sequestered,
    /// Free for everyone.
    PublicDomain,
}

/// A named storage partition. Every work lives in exactly one catalog
/// directory, derived from its state and rights status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalog {
    /// Awaiting or undergoing moderation.
    Pending,
    /// Approved, public domain.
    Public,
    /// Approved, still under rights; lendable only.
    Restricted,
    /// Rejected works, kept forever.
    Archive,
}

impl Catalog {
    pub const ALL: [Catalog; 4] = [
        Catalog::Pending,
        Catalog::Public,
        Catalog::Restricted,
        Catalog::Archive,
    ];

    /// Directory name under the data root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Catalog::Pending => "pending",
            Catalog::Public => "public",
            Catalog::Restricted => "restricted",
            Catalog::Archive => "archive",
        }
    }
}

impl std::fmt::Display for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A submitted document and its moderation attributes.
///
/// The body text is not carried here; it lives in the content artifact named
/// by `content_ref`, and this struct is what the index records mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    /// Stable identifier, derived from the title.
    pub id: String,
    pub title: String,
    pub author: String,
    pub categories: BTreeSet<String>,
    /// Identity reference of the submitting user.
    pub submitted_by: String,
    pub submitted_at: DateTime<Utc>,
    pub rights: RightsStatus,
    /// Publication date as free text; the rights sweeper parses the leading
    /// 4-digit year.
    pub publication_date: Option<String>,
    pub state: WorkState,
    /// File name of the stored body text.
    pub content_ref: String,
    /// Free-form metadata (string or bool values).
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Work {
    pub fn new(title: &str, author: &str, submitted_by: &str) -> Self {
        let id = slug(title);
        let content_ref = format!("{id}.md");
        Self {
            id,
            title: title.to_string(),
            author: author.to_string(),
            categories: BTreeSet::new(),
            submitted_by: submitted_by.to_string(),
            submitted_at: Utc::now(),
            rights: RightsStatus::UnderRights,
            publication_date: None,
            state: WorkState::Submitted,
            content_ref,
            metadata: BTreeMap::new(),
        }
    }

    /// `Submitted -> InReview`. Pure state change.
    pub fn begin_review(&mut self) -> Result<()> {
        self.state = self.state.apply(WorkAction::BeginReview)?;
        Ok(())
    }

    /// `InReview -> Approved`. Pure state change.
    pub fn approve(&mut self) -> Result<()> {
        self.state = self.state.apply(WorkAction::Approve)?;
        Ok(())
    }

    /// `InReview -> Rejected`. Pure state change.
    pub fn reject(&mut self) -> Result<()> {
        self.state = self.state.apply(WorkAction::Reject)?;
        Ok(())
    }

    pub fn set_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// The one catalog this work belongs to, derived from state and rights.
    pub fn catalog(&self) -> Catalog {
        match self.state {
            WorkState::Submitted | WorkState::InReview => Catalog::Pending,
            WorkState::Approved => match self.rights {
                RightsStatus::PublicDomain => Catalog::Public,
                RightsStatus::UnderRights | RightsStatus::Sequestered => Catalog::Restricted,
            },
            WorkState::Rejected => Catalog::Archive,
        }
    }
}

/// Filesystem-safe identifier from a title: alphanumerics kept, everything
/// else collapsed to single underscores.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_sep = true;
    for c in title.chars() {
        if c.is_alphanumeric() {
            out.push(c);
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
