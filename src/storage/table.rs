use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::StoreError;

/// Rows stored in a `RecordTable` carry a table-assigned numeric id.
pub trait Keyed {
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
}

/// Small id-keyed table kept in memory, optionally mirrored to a JSON snapshot
/// file after every mutation.
pub struct RecordTable<T> {
    inner: RwLock<TableInner<T>>,
    snapshot: Option<PathBuf>,
}

#[derive(Serialize, Deserialize)]
struct TableInner<T> {
    last_id: i64,
    rows: Vec<T>,
}

impl<T> Default for TableInner<T> {
    fn default() -> Self { Self { last_id: 0, rows: Vec::new() } }
}

impl<T> RecordTable<T>
where
    T: Keyed + Clone + Serialize + DeserializeOwned,
{
    pub fn in_memory() -> Self {
        Self { inner: RwLock::new(TableInner::default()), snapshot: None }
    }

    /// Load the snapshot at `path` if it exists; mutations write it back.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let bytes = std::fs::read(&path)?;
            serde_json::from_slice::<TableInner<T>>(&bytes)?
        } else {
            if let Some(dir) = path.parent() { std::fs::create_dir_all(dir)?; }
            TableInner::default()
        };
        Ok(Self { inner: RwLock::new(inner), snapshot: Some(path) })
    }

    fn persist(&self, inner: &TableInner<T>) -> Result<(), StoreError> {
        let Some(path) = self.snapshot.as_ref() else { return Ok(()); };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(inner)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn all(&self) -> Vec<T> { self.inner.read().rows.clone() }

    pub fn get(&self, id: i64) -> Option<T> {
        self.inner.read().rows.iter().find(|r| r.id() == id).cloned()
    }

    pub fn len(&self) -> usize { self.inner.read().rows.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Assign the next id and append.
    pub fn insert(&self, row: T) -> Result<T, StoreError> {
        self.insert_unique(row, |_| None)
    }

    /// Append unless `key` yields a value already present in the table. The
    /// check and the append happen under one write lock.
    pub fn insert_unique<F>(&self, mut row: T, key: F) -> Result<T, StoreError>
    where
        F: Fn(&T) -> Option<String>,
    {
        let mut g = self.inner.write();
        if let Some(k) = key(&row) {
            if g.rows.iter().any(|r| key(r).as_deref() == Some(k.as_str())) {
                return Err(StoreError::UniqueViolation(k));
            }
        }
        g.last_id += 1;
        row.set_id(g.last_id);
        g.rows.push(row.clone());
        if let Err(e) = self.persist(&g) {
            g.rows.pop();
            g.last_id -= 1;
            return Err(e);
        }
        Ok(row)
    }

    /// Apply `f` to the row with `id`. Returns `None` when the id is unknown.
    pub fn update<F>(&self, id: i64, f: F) -> Result<Option<T>, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let mut g = self.inner.write();
        let Some(pos) = g.rows.iter().position(|r| r.id() == id) else { return Ok(None); };
        let before = g.rows[pos].clone();
        f(&mut g.rows[pos]);
        let after = g.rows[pos].clone();
        if let Err(e) = self.persist(&g) {
            g.rows[pos] = before;
            return Err(e);
        }
        Ok(Some(after))
    }
}
