//! Durable set of posting ids that have already been emailed.
//!
//! On disk the set is a pretty-printed JSON array of strings, kept in
//! insertion order. A sidecar `<file>.lock` is held with an exclusive
//! advisory lock from [`SeenStore::open`] until the store is dropped, so
//! two overlapping runs cannot interleave their load/modify/save cycles.
//!
//! Saving a set that was never modified writes back the exact bytes that
//! were loaded, so files produced by other writers (or corrupt files) are
//! left untouched until a new id is actually added.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::PersistenceError;

pub struct SeenStore {
    path: PathBuf,
    ids: Vec<String>,
    index: HashSet<String>,
    /// Bytes read at open, if the file could be read
    loaded: Option<Vec<u8>>,
    dirty: bool,
    _lock: File,
}

impl SeenStore {
    /// Lock and load the seen-set at `path`.
    ///
    /// A missing, unreadable or corrupt file loads as an empty set; only a
    /// failure to take the lock is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let lock = acquire_lock(&path)?;

        let loaded = read_file(&path);
        let ids = loaded.as_deref().map(|bytes| parse_ids(&path, bytes)).unwrap_or_default();
        let mut store = Self {
            path,
            ids: Vec::with_capacity(ids.len()),
            index: HashSet::with_capacity(ids.len()),
            loaded,
            dirty: false,
            _lock: lock,
        };
        for id in ids {
            store.insert(id);
        }
        store.dirty = false;

        debug!(path = %store.path.display(), count = store.len(), "Loaded seen-set");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Add an id. Returns `false` when it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.ids.push(id);
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Whether ids were added since the file was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Overwrite the file with the current set, or with the loaded bytes
    /// when nothing was added.
    ///
    /// Writes a temporary sibling first and renames it into place, so a
    /// crash mid-write leaves the previous file intact.
    pub fn save(&self) -> Result<(), PersistenceError> {
        let content = match (&self.loaded, self.dirty) {
            (Some(bytes), false) => bytes.clone(),
            _ => serde_json::to_string_pretty(&self.ids)?.into_bytes(),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = sidecar(&self.path, "tmp");
        fs::write(&tmp, content).map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), count = self.len(), "Saved seen-set");
        Ok(())
    }
}

fn acquire_lock(path: &Path) -> Result<File, PersistenceError> {
    let lock_path = sidecar(path, "lock");
    let lock_err = |source| PersistenceError::Lock {
        path: lock_path.clone(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(lock_err)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(lock_err)?;
    file.lock_exclusive().map_err(lock_err)?;
    Ok(file)
}

fn read_file(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Seen-set unreadable, starting empty");
            None
        }
    }
}

fn parse_ids(path: &Path, bytes: &[u8]) -> Vec<String> {
    match serde_json::from_slice::<Vec<String>>(bytes) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Seen-set corrupt, starting empty");
            Vec::new()
        }
    }
}

fn sidecar(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}
