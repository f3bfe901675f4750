//!
//! intelhub storage module
//! -----------------------
//! Persistence for credentials and domain records.
//!
//! - `UserStore` is the seam to the users table. Implementations must make the
//!   username uniqueness check and the insert a single atomic step and report a
//!   collision as `StoreError::UniqueViolation`.
//! - `CredentialStore` sits on top of a `UserStore` handle, hashes passwords,
//!   validates roles, and turns store failures into the `AuthError` taxonomy.
//! - `RecordTable` is the generic table used for incidents, datasets and tickets.
//!
//! Handles are passed in explicitly (`Arc<dyn UserStore>`); there is no global
//! connection.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::error;

use crate::error::{AuthError, AuthResult};
use crate::identity::Role;
use crate::security;

mod memory;
mod parquet_users;
mod table;

pub use memory::MemoryUserStore;
pub use parquet_users::ParquetUserStore;
pub use table::{Keyed, RecordTable};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parquet: {0}")]
    Parquet(#[from] polars::prelude::PolarsError),
    #[error("snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// One row of the users table.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    /// Epoch milliseconds.
    pub created_at: i64,
}

// Hand-written so the hash never ends up in logs.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Persistence collaborator for the users table.
pub trait UserStore: Send + Sync {
    /// Insert a new user with a freshly generated id. Fails with
    /// `UniqueViolation` when the username (exact, case-sensitive) exists.
    fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<CredentialRecord, StoreError>;
    fn find_user_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError>;
    /// Returns false when no such user exists.
    fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<bool, StoreError>;
    /// Returns false when no such user exists.
    fn update_role(&self, username: &str, role: Role) -> Result<bool, StoreError>;
    fn list_users(&self) -> Result<Vec<CredentialRecord>, StoreError>;
}

/// Storage failures other than a uniqueness collision are logged here and
/// surfaced as `StorageFault`.
pub(crate) fn storage_fault(err: StoreError) -> AuthError {
    error!(target: "storage", error = %err, "storage fault");
    AuthError::StorageFault(err)
}

pub(crate) fn now_ms() -> i64 { chrono::Utc::now().timestamp_millis() }

/// Credential-level operations over an injected `UserStore`.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn UserStore>) -> Self { Self { store } }

    /// Hash `password` and persist a new record. The raw password is never stored.
    pub fn register(&self, username: &str, password: &str, role: &str) -> AuthResult<CredentialRecord> {
        validate_username(username)?;
        let role: Role = role.parse()?;
        let hash = security::hash_password(password)?;
        match self.store.insert_user(username, hash.as_str(), role) {
            Ok(rec) => Ok(rec),
            Err(StoreError::UniqueViolation(_)) => Err(AuthError::AlreadyExists(username.to_string())),
            Err(e) => Err(storage_fault(e)),
        }
    }

    pub fn find_by_username(&self, username: &str) -> AuthResult<Option<CredentialRecord>> {
        self.store.find_user_by_username(username).map_err(storage_fault)
    }

    /// Replace the stored hash for `username` with a hash of `new_password`.
    pub fn rotate_password(&self, username: &str, new_password: &str) -> AuthResult<()> {
        let hash = security::hash_password(new_password)?;
        match self.store.update_password_hash(username, hash.as_str()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::NotFound(format!("user {}", username))),
            Err(e) => Err(storage_fault(e)),
        }
    }

    pub fn reassign_role(&self, username: &str, role: Role) -> AuthResult<()> {
        match self.store.update_role(username, role) {
            Ok(true) => Ok(()),
            Ok(false) => Err(AuthError::NotFound(format!("user {}", username))),
            Err(e) => Err(storage_fault(e)),
        }
    }

    pub fn list(&self) -> AuthResult<Vec<CredentialRecord>> {
        self.store.list_users().map_err(storage_fault)
    }
}

fn validate_username(username: &str) -> AuthResult<()> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidUsername("username cannot be empty".into()));
    }
    if username.chars().any(|c| c.is_control()) {
        return Err(AuthError::InvalidUsername("username contains control characters".into()));
    }
    Ok(())
}
