use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::EngineError;

/// Durable, offset-addressable file writer rooted at the uploads directory.
///
/// Every operation opens its own file handle, so writes to disjoint offsets
/// of the same file are independent positional operations with no shared
/// cursor. Callers must not assume unwritten regions of an allocated file
/// are zeroed.
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Creates a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a stored file name to its path under the root.
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.root.join(stored_name)
    }

    /// Creates or truncates `path` to exactly `size` bytes.
    pub fn allocate(&self, path: &Path, size: u64) -> Result<(), EngineError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(())
    }

    /// Writes `data` starting at `offset`.
    ///
    /// The write must fit inside the allocated length; an out-of-range write
    /// fails without touching the file.
    pub fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> Result<(), EngineError> {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let capacity = file.metadata()?.len();
        let len = data.len() as u64;
        if offset.checked_add(len).is_none_or(|end| end > capacity) {
            return Err(EngineError::OutOfRange {
                offset,
                len,
                capacity,
            });
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Reads the full contents of `path`.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>, EngineError> {
        Ok(fs::read(path)?)
    }

    /// Current length of `path` in bytes.
    pub fn size(&self, path: &Path) -> Result<u64, EngineError> {
        Ok(fs::metadata(path)?.len())
    }

    /// Removes `path`. Missing files are not an error.
    pub fn delete(&self, path: &Path) -> Result<(), EngineError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ChunkStore) {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path().join("uploads")).unwrap();
        (dir, store)
    }

    #[test]
    fn new_creates_root() {
        let (_dir, store) = store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn allocate_sets_exact_length() {
        let (_dir, store) = store();
        let path = store.path_for("a.bin");
        store.allocate(&path, 4096).unwrap();
        assert_eq!(store.size(&path).unwrap(), 4096);

        // Re-allocating truncates to the new length.
        store.allocate(&path, 16).unwrap();
        assert_eq!(store.size(&path).unwrap(), 16);
    }

    #[test]
    fn write_at_places_bytes() {
        let (_dir, store) = store();
        let path = store.path_for("a.bin");
        store.allocate(&path, 11).unwrap();
        store.write_at(&path, 6, b"World").unwrap();
        store.write_at(&path, 0, b"Hello ").unwrap();
        assert_eq!(&store.read(&path).unwrap(), b"Hello World");
    }

    #[test]
    fn write_at_rejects_out_of_range() {
        let (_dir, store) = store();
        let path = store.path_for("a.bin");
        store.allocate(&path, 8).unwrap();
        let err = store.write_at(&path, 6, b"abc").unwrap_err();
        assert!(matches!(
            err,
            EngineError::OutOfRange {
                offset: 6,
                len: 3,
                capacity: 8
            }
        ));
        // File length untouched.
        assert_eq!(store.size(&path).unwrap(), 8);
    }

    #[test]
    fn repeated_write_is_idempotent() {
        let (_dir, store) = store();
        let path = store.path_for("a.bin");
        store.allocate(&path, 4).unwrap();
        store.write_at(&path, 0, b"data").unwrap();
        let first = store.read(&path).unwrap();
        store.write_at(&path, 0, b"data").unwrap();
        assert_eq!(store.read(&path).unwrap(), first);
    }

    #[test]
    fn concurrent_disjoint_writes() {
        use std::sync::Arc;
        use std::thread;

        let dir = TempDir::new().unwrap();
        let store = Arc::new(ChunkStore::new(dir.path().join("uploads")).unwrap());
        let path = store.path_for("big.bin");
        let region = 1024usize;
        let writers = 8usize;
        store.allocate(&path, (region * writers) as u64).unwrap();

        let mut handles = vec![];
        for i in 0..writers {
            let store = Arc::clone(&store);
            let path = path.clone();
            handles.push(thread::spawn(move || {
                let data = vec![i as u8; region];
                store.write_at(&path, (i * region) as u64, &data).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let content = store.read(&path).unwrap();
        for i in 0..writers {
            assert!(
                content[i * region..(i + 1) * region]
                    .iter()
                    .all(|&b| b == i as u8),
                "region {i} corrupted"
            );
        }
    }

    #[test]
    fn delete_is_quiet_on_missing() {
        let (_dir, store) = store();
        let path = store.path_for("gone.bin");
        store.delete(&path).unwrap();

        store.allocate(&path, 1).unwrap();
        store.delete(&path).unwrap();
        assert!(!path.exists());
    }
}
