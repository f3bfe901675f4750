use parking_lot::Mutex;

use super::{now_ms, CredentialRecord, StoreError, UserStore};
use crate::identity::Role;

/// Process-local users table. The mutex is held across check and insert so
/// concurrent registrations of one username cannot both succeed.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: Vec<CredentialRecord>,
    last_id: i64,
}

impl MemoryUserStore {
    pub fn new() -> Self { Self::default() }
}

impl UserStore for MemoryUserStore {
    fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<CredentialRecord, StoreError> {
        let mut g = self.inner.lock();
        if g.rows.iter().any(|r| r.username == username) {
            return Err(StoreError::UniqueViolation(format!("users.username={}", username)));
        }
        g.last_id += 1;
        let rec = CredentialRecord {
            id: g.last_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            created_at: now_ms(),
        };
        g.rows.push(rec.clone());
        Ok(rec)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.inner.lock().rows.iter().find(|r| r.username == username).cloned())
    }

    fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        let mut g = self.inner.lock();
        match g.rows.iter_mut().find(|r| r.username == username) {
            Some(r) => { r.password_hash = password_hash.to_string(); Ok(true) }
            None => Ok(false),
        }
    }

    fn update_role(&self, username: &str, role: Role) -> Result<bool, StoreError> {
        let mut g = self.inner.lock();
        match g.rows.iter_mut().find(|r| r.username == username) {
            Some(r) => { r.role = role; Ok(true) }
            None => Ok(false),
        }
    }

    fn list_users(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        Ok(self.inner.lock().rows.clone())
    }
}
