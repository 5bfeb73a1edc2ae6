//! Librarian promotion requests
//!
//! Members ask to become librarians; existing librarians decide. Each
//! request is one JSON record under `promotions/`, and approval grants the
//! librarian role through the user store in the same operation.

use crate::error::{LibraryError, Result};
use crate::rbac::{permissions, Role, User};
use crate::users::UserStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl PromotionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PromotionStatus::Pending => "pending",
            PromotionStatus::Approved => "approved",
            PromotionStatus::Rejected => "rejected",
            PromotionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub id: String,
    /// Identity reference of the requesting member.
    pub requester: String,
    pub motivation: String,
    pub status: PromotionStatus,
    pub requested_at: DateTime<Utc>,
    /// Set when a librarian decides or the requester cancels.
    pub responded_at: Option<DateTime<Utc>>,
    /// Identity reference of the deciding librarian, if any.
    pub responded_by: Option<String>,
    pub response_note: Option<String>,
}

impl PromotionRequest {
    fn new(requester: &str, motivation: &str) -> Self {
        Self {
            id: format!("promo_{}", uuid::Uuid::new_v4().simple()),
            requester: requester.to_string(),
            motivation: motivation.to_string(),
            status: PromotionStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            responded_by: None,
            response_note: None,
        }
    }

    fn resolve(&mut self, status: PromotionStatus, by: &str, note: Option<&str>) -> Result<()> {
        if self.status != PromotionStatus::Pending {
            return Err(LibraryError::InvalidTransition {
                state: self.status.as_str().to_string(),
                action: status.as_str().to_string(),
            });
        }
        self.status = status;
        self.responded_at = Some(Utc::now());
        self.responded_by = Some(by.to_string());
        self.response_note = note.map(|n| n.to_string());
        Ok(())
    }

    /// Whole days between request and decision, or waiting time so far for
    /// a still-pending request.
    pub fn response_days(&self) -> i64 {
        let end = self.responded_at.unwrap_or_else(Utc::now);
        (end - self.requested_at).num_days()
    }
}

/// One JSON record per request under the promotions directory.
pub struct PromotionStore {
    dir: PathBuf,
}

impl PromotionStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn save(&self, request: &PromotionRequest) -> Result<()> {
        fs::write(
            self.record_path(&request.id),
            serde_json::to_string_pretty(request)?,
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<PromotionRequest> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(LibraryError::NotFound(format!("promotion request '{id}'")));
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// All readable requests; unreadable records are logged and skipped.
    pub fn list_all(&self) -> Result<Vec<PromotionRequest>> {
        let mut requests = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(LibraryError::from)
                .and_then(|raw| {
                    serde_json::from_str::<PromotionRequest>(&raw).map_err(LibraryError::from)
                }) {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!(path = %path.display(), error = %e,
                          "Skipping corrupt promotion record");
                }
            }
        }
        Ok(requests)
    }
}

/// Aggregates over decided and pending requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    /// Mean whole days from request to decision, over decided requests.
    pub mean_response_days: Option<f64>,
}

/// The promotion workflow over a [`PromotionStore`] and the [`UserStore`].
pub struct PromotionService {
    store: PromotionStore,
    users: UserStore,
}

impl PromotionService {
    pub fn new(store: PromotionStore, users: UserStore) -> Self {
        Self { store, users }
    }

    /// File a promotion request for `user`.
    ///
    /// Users who can already manage promotion requests are librarians;
    /// asking again is rejected outright, as is a second request while one
    /// is still pending.
    pub fn submit(&self, user: &User, motivation: &str) -> Result<PromotionRequest> {
        if user.has_permission(permissions::MANAGE_PROMOTION_REQUESTS) {
            return Err(LibraryError::AlreadyPromoted(user.id.clone()));
        }
        let has_pending = self
            .store
            .list_all()?
            .iter()
            .any(|r| r.requester == user.id && r.status == PromotionStatus::Pending);
        if has_pending {
            return Err(LibraryError::DuplicateResource(format!(
                "pending promotion request for {}",
                user.id
            )));
        }

        let request = PromotionRequest::new(&user.id, motivation);
        self.store.save(&request)?;
        info!(request = %request.id, requester = %user.id, "Promotion request filed");
        Ok(request)
    }

    /// Approve a pending request and grant the librarian role in the same
    /// operation.
    pub fn approve(&self, librarian: &User, request_id: &str, note: Option<&str>) -> Result<PromotionRequest> {
        librarian.require(permissions::MANAGE_PROMOTION_REQUESTS)?;

        let mut request = self.store.get(request_id)?;
        request.resolve(PromotionStatus::Approved, &librarian.id, note)?;

        let mut requester = self.users.get(&request.requester)?;
        requester.grant_role(Role::librarian());
        self.users.save(&requester)?;
        self.store.save(&request)?;

        info!(request = %request.id, requester = %request.requester, by = %librarian.id,
              "Promotion approved");
        Ok(request)
    }

    /// Reject a pending request.
    pub fn reject(&self, librarian: &User, request_id: &str, note: Option<&str>) -> Result<PromotionRequest> {
        librarian.require(permissions::MANAGE_PROMOTION_REQUESTS)?;

        let mut request = self.store.get(request_id)?;
        request.resolve(PromotionStatus::Rejected, &librarian.id, note)?;
        self.store.save(&request)?;

        info!(request = %request.id, by = %librarian.id, "Promotion rejected");
        Ok(request)
    }

    /// Withdraw a request. Only the requester may cancel, and only while
    /// the request is still pending.
    pub fn cancel(&self, user: &User, request_id: &str) -> Result<PromotionRequest> {
        let mut request = self.store.get(request_id)?;
        if request.requester != user.id {
            return Err(LibraryError::NotFound(format!(
                "promotion request '{request_id}'"
            )));
        }
        request.resolve(PromotionStatus::Cancelled, &user.id, None)?;
        self.store.save(&request)?;

        info!(request = %request.id, "Promotion request cancelled");
        Ok(request)
    }

    /// The user's own requests, any status, newest first. No permission
    /// needed: every member can see what they filed.
    pub fn my_requests(&self, user: &User) -> Result<Vec<PromotionRequest>> {
        let mut mine: Vec<PromotionRequest> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|r| r.requester == user.id)
            .collect();
        mine.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(mine)
    }

    /// Pending requests, oldest first.
    pub fn pending(&self, librarian: &User) -> Result<Vec<PromotionRequest>> {
        librarian.require(permissions::MANAGE_PROMOTION_REQUESTS)?;
        let mut pending: Vec<PromotionRequest> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|r| r.status == PromotionStatus::Pending)
            .collect();
        pending.sort_by_key(|r| r.requested_at);
        Ok(pending)
    }

    /// Decided and cancelled requests, newest first.
    pub fn history(&self, librarian: &User) -> Result<Vec<PromotionRequest>> {
        librarian.require(permissions::MANAGE_PROMOTION_REQUESTS)?;
        let mut history: Vec<PromotionRequest> = self
            .store
            .list_all()?
            .into_iter()
            .filter(|r| r.status != PromotionStatus::Pending)
            .collect();
        history.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(history)
    }

    pub fn stats(&self, librarian: &User) -> Result<PromotionStats> {
        librarian.require(permissions::MANAGE_PROMOTION_REQUESTS)?;
        let all = self.store.list_all()?;

        let count = |s: PromotionStatus| all.iter().filter(|r| r.status == s).count();
        let decided: Vec<&PromotionRequest> = all
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    PromotionStatus::Approved | PromotionStatus::Rejected
                )
            })
            .collect();
        let mean_response_days = if decided.is_empty() {
            None
        } else {
            let total: i64 = decided.iter().map(|r| r.response_days()).sum();
            Some(total as f64 / decided.len() as f64)
        };

        Ok(PromotionStats {
            pending: count(PromotionStatus::Pending),
            approved: count(PromotionStatus::Approved),
            rejected: count(PromotionStatus::Rejected),
            cancelled: count(PromotionStatus::Cancelled),
            mean_response_days,
        })
    }
}
