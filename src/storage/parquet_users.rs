//! Users table persisted as a single Parquet file (`<root>/users.parquet`).
//!
//! Every mutation is a read-modify-write of the whole file under the table
//! lock, so the uniqueness check and the insert happen as one step. The lock is
//! an in-process mutex plus an exclusive advisory lock on `<root>/users.lock`,
//! which also orders the server against `intelhub_admin` on the same folder.
//! Writes go to a uniquely named sibling temp file and are renamed into place.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};
use polars::prelude::*;
use tracing::{debug, warn};

use super::{now_ms, CredentialRecord, StoreError, UserStore};
use crate::identity::Role;

pub struct ParquetUserStore {
    path: PathBuf,
    lock_path: PathBuf,
    write_lock: Mutex<()>,
}

/// Held for a whole read-modify-write. Dropping it releases the file lock.
struct TableLock<'a> {
    _local: MutexGuard<'a, ()>,
    file: File,
}

impl Drop for TableLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Raw row as stored. The role stays a string until a caller asks for the
/// record so one bad row cannot take the whole table down.
struct StoredRow {
    id: i64,
    username: String,
    password_hash: String,
    role: String,
    created_at: i64,
}

impl StoredRow {
    fn to_record(&self) -> Result<CredentialRecord, StoreError> {
        let role: Role = self.role.parse().map_err(|_| {
            StoreError::Corrupt(format!("unknown role '{}' for user '{}'", self.role, self.username))
        })?;
        Ok(CredentialRecord {
            id: self.id,
            username: self.username.clone(),
            password_hash: self.password_hash.clone(),
            role,
            created_at: self.created_at,
        })
    }
}

impl ParquetUserStore {
    /// Open (or lazily create) the users table under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        let path = root.join("users.parquet");
        let lock_path = root.join("users.lock");
        debug!(target: "storage", path = %path.display(), "users table opened");
        Ok(Self { path, lock_path, write_lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn lock_table(&self) -> Result<TableLock<'_>, StoreError> {
        let local = self.write_lock.lock();
        let file = OpenOptions::new().create(true).read(true).write(true).truncate(false).open(&self.lock_path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(TableLock { _local: local, file })
    }

    fn with_row<F>(&self, username: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut StoredRow),
    {
        let _g = self.lock_table()?;
        let mut rows = read_rows(&self.path)?;
        let Some(row) = rows.iter_mut().find(|r| r.username == username) else { return Ok(false); };
        f(row);
        write_rows(&self.path, &rows)?;
        Ok(true)
    }
}

fn string_at(df: &DataFrame, col: &str, i: usize) -> Result<String, StoreError> {
    match df.column(col)?.get(i)? {
        AnyValue::String(s) => Ok(s.to_string()),
        AnyValue::StringOwned(s) => Ok(s.to_string()),
        other => Err(StoreError::Corrupt(format!("users.{} row {}: unexpected {:?}", col, i, other))),
    }
}

fn i64_at(df: &DataFrame, col: &str, i: usize) -> Result<i64, StoreError> {
    match df.column(col)?.get(i)? {
        AnyValue::Int64(v) => Ok(v),
        AnyValue::Int32(v) => Ok(v as i64),
        other => Err(StoreError::Corrupt(format!("users.{} row {}: unexpected {:?}", col, i, other))),
    }
}

fn read_rows(path: &Path) -> Result<Vec<StoredRow>, StoreError> {
    if !path.exists() { return Ok(Vec::new()); }
    let file = File::open(path)?;
    let df = ParquetReader::new(file).finish()?;
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        rows.push(StoredRow {
            id: i64_at(&df, "id", i)?,
            username: string_at(&df, "username", i)?,
            password_hash: string_at(&df, "password_hash", i)?,
            role: string_at(&df, "role", i)?,
            created_at: i64_at(&df, "created_at", i)?,
        });
    }
    Ok(rows)
}

fn write_rows(path: &Path, rows: &[StoredRow]) -> Result<(), StoreError> {
    let mut df = DataFrame::new(vec![
        Series::new("id".into(), rows.iter().map(|r| r.id).collect::<Vec<i64>>()).into(),
        Series::new("username".into(), rows.iter().map(|r| r.username.clone()).collect::<Vec<String>>()).into(),
        Series::new("password_hash".into(), rows.iter().map(|r| r.password_hash.clone()).collect::<Vec<String>>()).into(),
        Series::new("role".into(), rows.iter().map(|r| r.role.clone()).collect::<Vec<String>>()).into(),
        Series::new("created_at".into(), rows.iter().map(|r| r.created_at).collect::<Vec<i64>>()).into(),
    ])?;
    let tmp = path.with_extension(format!("parquet.{}.tmp", uuid::Uuid::new_v4().simple()));
    {
        let mut f = File::create(&tmp)?;
        ParquetWriter::new(&mut f).finish(&mut df)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl UserStore for ParquetUserStore {
    fn insert_user(&self, username: &str, password_hash: &str, role: Role) -> Result<CredentialRecord, StoreError> {
        let _g = self.lock_table()?;
        let mut rows = read_rows(&self.path)?;
        if rows.iter().any(|r| r.username == username) {
            return Err(StoreError::UniqueViolation(format!("users.username={}", username)));
        }
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let row = StoredRow {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: role.as_str().to_string(),
            created_at: now_ms(),
        };
        let rec = row.to_record()?;
        rows.push(row);
        write_rows(&self.path, &rows)?;
        Ok(rec)
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let rows = read_rows(&self.path)?;
        match rows.iter().find(|r| r.username == username) {
            Some(row) => row.to_record().map(Some),
            None => Ok(None),
        }
    }

    fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<bool, StoreError> {
        self.with_row(username, |row| row.password_hash = password_hash.to_string())
    }

    fn update_role(&self, username: &str, role: Role) -> Result<bool, StoreError> {
        self.with_row(username, |row| row.role = role.as_str().to_string())
    }

    fn list_users(&self) -> Result<Vec<CredentialRecord>, StoreError> {
        let rows = read_rows(&self.path)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            match row.to_record() {
                Ok(rec) => out.push(rec),
                Err(e) => warn!(target: "storage", error = %e, "skipping unreadable user row"),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
pub(super) fn write_raw_row_for_test(store: &ParquetUserStore, username: &str, password_hash: &str, role: &str) -> Result<(), StoreError> {
    let _g = store.lock_table()?;
    let mut rows = read_rows(&store.path)?;
    let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
    rows.push(StoredRow {
        id,
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role: role.to_string(),
        created_at: now_ms(),
    });
    write_rows(&store.path, &rows)
}
