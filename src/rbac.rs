//! Role-based permission gate
//!
//! Answers "does identity X hold permission P". Permissions are plain name
//! strings; roles bundle permission names and are granted whole. The
//! librarian role is a superset of the member role by composition: it is
//! built from the member permission set plus the librarian-only names, not
//! by any subtype relation.
//!
//! Every mutating operation in the store and loan manager calls
//! [`User::require`] before touching storage.

use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Permission names used throughout the crate.
pub mod permissions {
    /// Deposit a new work for moderation.
    pub const SUBMIT_WORK: &str = "submit_work";
    /// Take a time-boxed loan on a restricted work.
    pub const BORROW_WORK: &str = "borrow_work";
    /// Review, approve, and reject submitted works.
    pub const MODERATE_WORK: &str = "moderate_work";
    /// Approve or reject librarian promotion requests.
    pub const MANAGE_PROMOTION_REQUESTS: &str = "manage_promotion_requests";
}

pub const ROLE_MEMBER: &str = "Member";
pub const ROLE_LIBRARIAN: &str = "Librarian";

/// A named bundle of permission names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<String>,
}

impl Role {
    /// Member role: submit and borrow.
    pub fn member() -> Self {
        Self {
            name: ROLE_MEMBER.to_string(),
            permissions: [permissions::SUBMIT_WORK, permissions::BORROW_WORK]
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    /// Librarian role: everything a member has, plus moderation and
    /// promotion management.
    pub fn librarian() -> Self {
        let mut perms = Self::member().permissions;
        perms.insert(permissions::MODERATE_WORK.to_string());
        perms.insert(permissions::MANAGE_PROMOTION_REQUESTS.to_string());
        Self {
            name: ROLE_LIBRARIAN.to_string(),
            permissions: perms,
        }
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// A registered user: identity reference, stored credential hash, and the
/// roles granted to them. The loan key encrypts borrowed work bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub credential_hash: String,
    pub roles: Vec<Role>,
    /// Per-user symmetric key material, hex encoded.
    pub loan_key: String,
    pub registered_at: DateTime<Utc>,
}

impl User {
    /// Create a user with the member role and a fresh loan key.
    pub fn new(id: &str, name: &str, secret: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            credential_hash: hash_secret(secret),
            roles: vec![Role::member()],
            loan_key: generate_loan_key(),
            registered_at: Utc::now(),
        }
    }

    /// Verify a submitted secret against the stored hash.
    pub fn verify_secret(&self, secret: &str) -> bool {
        self.credential_hash == hash_secret(secret)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.roles.iter().any(|r| r.grants(permission))
    }

    /// Fail fast with `PermissionDenied` unless the user holds `permission`.
    pub fn require(&self, permission: &str) -> Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(LibraryError::PermissionDenied {
                permission: permission.to_string(),
            })
        }
    }

    /// Grant a role; granting an already-held role is a no-op.
    pub fn grant_role(&mut self, role: Role) {
        if !self.roles.iter().any(|r| r.name == role.name) {
            self.roles.push(role);
        }
    }

    /// Raw key bytes for the encryption provider.
    pub fn loan_key_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.loan_key)
            .map_err(|e| LibraryError::Crypto(format!("bad loan key for {}: {e}", self.id)))
    }
}

/// SHA256 hex of a secret. Credential issuance and session handling live
/// outside this crate; only storage and comparison happen here.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_loan_key() -> String {
    let mut hasher = Sha256::new();
    hasher.update(uuid::Uuid::new_v4().as_bytes());
    hex::encode(hasher.finalize())
}
