//! Storage media under test.
//!
//! A [`Store`] hands out write handles that close when dropped, so a failed
//! write still releases its handle before the error reaches the caller.
//! Two media are provided: [`DirStore`] over a host directory and
//! [`MemStore`], an in-memory fake with an optional capacity limit.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("no space left writing {name} ({needed} bytes over capacity)")]
    NoSpace { name: String, needed: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        match self {
            StoreError::NotFound(_) => true,
            StoreError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            StoreError::NoSpace { .. } => false,
        }
    }
}

/// An open write handle. Dropping it closes the entry.
pub trait StoreFile {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StoreError>;

    /// Returns once the medium has accepted everything written so far.
    fn flush(&mut self) -> Result<(), StoreError>;
}

pub trait Store {
    type File: StoreFile;

    /// Open `name` for writing, creating it or truncating an existing entry.
    fn open_write(&self, name: &str) -> Result<Self::File, StoreError>;

    /// Delete `name`. A missing entry yields [`StoreError::NotFound`].
    fn remove(&self, name: &str) -> Result<(), StoreError>;

    /// Move `from` over `to`, replacing `to` if present.
    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError>;

    fn size(&self, name: &str) -> Result<u64, StoreError>;

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    fn exists(&self, name: &str) -> bool {
        self.size(name).is_ok()
    }

    /// Delete `name` if present. Returns whether anything was removed.
    fn remove_if_exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.remove(name) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Open, write, flush, close.
pub fn write_file<S: Store>(store: &S, name: &str, data: &[u8]) -> Result<(), StoreError> {
    let mut file = store.open_write(name)?;
    file.write_all(data)?;
    file.flush()
}

/// Temporary name [`safe_write`] stages `name` under.
pub fn temp_name(name: &str) -> String {
    format!("{name}.tmp")
}

/// Write `tmp` and rename it over `name`.
///
/// `tmp` is taken from the caller so timed trials do not build it. On
/// failure `tmp` is removed and the original error is returned.
pub fn safe_write<S: Store>(store: &S, tmp: &str, name: &str, data: &[u8]) -> Result<(), StoreError> {
    let result = write_file(store, tmp, data).and_then(|()| store.rename(tmp, name));
    if result.is_err() {
        let _ = store.remove_if_exists(tmp);
    }
    result
}

/// Files under a root directory on the host file system.
#[derive(Clone, Debug)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn map_missing(e: io::Error, name: &str) -> StoreError {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(name.to_string())
        } else {
            StoreError::Io(e)
        }
    }
}

pub struct DirFile {
    file: File,
}

impl StoreFile for DirFile {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StoreError> {
        self.file.write_all(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

impl Store for DirStore {
    type File = DirFile;

    fn open_write(&self, name: &str) -> Result<DirFile, StoreError> {
        let file = File::create(self.path(name))?;
        Ok(DirFile { file })
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        fs::remove_file(self.path(name)).map_err(|e| Self::map_missing(e, name))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        fs::rename(self.path(from), self.path(to)).map_err(|e| Self::map_missing(e, from))
    }

    fn size(&self, name: &str) -> Result<u64, StoreError> {
        let meta = fs::metadata(self.path(name)).map_err(|e| Self::map_missing(e, name))?;
        Ok(meta.len())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        fs::read(self.path(name)).map_err(|e| Self::map_missing(e, name))
    }
}

#[derive(Debug, Default)]
struct MemInner {
    entries: BTreeMap<String, Vec<u8>>,
    open_handles: usize,
    capacity: Option<usize>,
}

impl MemInner {
    fn used(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// In-memory medium.
///
/// Cloning shares the same entries. With a capacity set, writes that would
/// take total usage past it fail with [`StoreError::NoSpace`].
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    inner: Rc<RefCell<MemInner>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let store = Self::default();
        store.inner.borrow_mut().capacity = Some(capacity);
        store
    }

    /// Handles currently open.
    pub fn open_handles(&self) -> usize {
        self.inner.borrow().open_handles
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }
}

pub struct MemFile {
    inner: Rc<RefCell<MemInner>>,
    name: String,
}

impl StoreFile for MemFile {
    fn write_all(&mut self, buf: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(cap) = inner.capacity {
            let after = inner.used() + buf.len();
            if after > cap {
                return Err(StoreError::NoSpace {
                    name: self.name.clone(),
                    needed: after - cap,
                });
            }
        }
        inner
            .entries
            .entry(self.name.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.inner.borrow_mut().open_handles -= 1;
    }
}

impl Store for MemStore {
    type File = MemFile;

    fn open_write(&self, name: &str) -> Result<MemFile, StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.entries.insert(name.to_string(), Vec::new());
        inner.open_handles += 1;
        Ok(MemFile {
            inner: Rc::clone(&self.inner),
            name: name.to_string(),
        })
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.inner
            .borrow_mut()
            .entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let data = inner
            .entries
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        inner.entries.insert(to.to_string(), data);
        Ok(())
    }

    fn size(&self, name: &str) -> Result<u64, StoreError> {
        self.inner
            .borrow()
            .entries
            .get(name)
            .map(|d| d.len() as u64)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        self.inner
            .borrow()
            .entries
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise<S: Store>(store: &S) {
        assert!(!store.exists("data.bin"));
        assert!(!store.remove_if_exists("data.bin").unwrap());
        assert!(store.remove("data.bin").unwrap_err().is_not_found());

        write_file(store, "data.bin", &[1, 2, 3, 4]).unwrap();
        assert_eq!(store.size("data.bin").unwrap(), 4);

        // Reopening truncates.
        write_file(store, "data.bin", &[9, 9]).unwrap();
        assert_eq!(store.read("data.bin").unwrap(), vec![9, 9]);

        safe_write(store, "data.bin.tmp", "data.bin", &[7; 16]).unwrap();
        assert_eq!(store.read("data.bin").unwrap(), vec![7; 16]);
        assert!(!store.exists("data.bin.tmp"));

        assert!(store.remove_if_exists("data.bin").unwrap());
        assert!(!store.exists("data.bin"));
    }

    #[test]
    fn test_mem_store_semantics() {
        exercise(&MemStore::new());
    }

    #[test]
    fn test_dir_store_semantics() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path().join("media")).unwrap();
        exercise(&store);
    }

    #[test]
    fn test_rename_missing_source() {
        let store = MemStore::new();
        assert!(store.rename("a", "b").unwrap_err().is_not_found());

        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path()).unwrap();
        assert!(store.rename("a", "b").unwrap_err().is_not_found());
    }

    #[test]
    fn test_handle_released_on_failed_write() {
        let store = MemStore::with_capacity(8);
        let err = write_file(&store, "big.bin", &[0u8; 32]).unwrap_err();

        assert!(matches!(err, StoreError::NoSpace { needed: 24, .. }));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_failed_safe_write_removes_temp() {
        let store = MemStore::with_capacity(12 * 1024);
        let err = safe_write(&store, &temp_name("x"), "x", &[0u8; 16 * 1024]).unwrap_err();

        assert!(matches!(err, StoreError::NoSpace { .. }));
        assert!(store.names().is_empty());
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_failed_rename_removes_temp() {
        let dir = tempdir().unwrap();
        let store = DirStore::new(dir.path()).unwrap();
        // A directory in the way makes the rename fail after the temp write.
        fs::create_dir(dir.path().join("x")).unwrap();
        fs::write(dir.path().join("x").join("keep"), b"k").unwrap();

        assert!(safe_write(&store, "x.tmp", "x", b"abc").is_err());
        assert!(!store.exists("x.tmp"));
    }

    #[test]
    fn test_temp_name() {
        assert_eq!(temp_name("data.bin"), "data.bin.tmp");
    }

    #[test]
    fn test_handle_released_after_write() {
        let store = MemStore::new();
        {
            let mut f = store.open_write("x").unwrap();
            f.write_all(b"abc").unwrap();
            assert_eq!(store.open_handles(), 1);
        }
        assert_eq!(store.open_handles(), 0);
        assert_eq!(store.read("x").unwrap(), b"abc".to_vec());
    }

    #[test]
    fn test_overwrite_does_not_count_against_capacity() {
        let store = MemStore::with_capacity(16);
        write_file(&store, "a", &[1u8; 16]).unwrap();
        write_file(&store, "a", &[2u8; 16]).unwrap();
        assert_eq!(store.size("a").unwrap(), 16);
    }
}
