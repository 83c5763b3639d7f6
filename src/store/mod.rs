//! JSON snapshot persistence for questbot state.
//!
//! Every persisted concern (players, spam/ban state, tic-tac-toe sessions,
//! sub-bots, the item catalog) is one JSON document on disk, loaded and saved
//! as a whole. File access is guarded with fs2 locks (shared for read,
//! exclusive for write) so a concurrent reader never observes a partial write.
//!
//! Corrupt or unreadable backing data falls back to an empty snapshot with a
//! warning rather than aborting: losing cooldown or game state is recoverable,
//! crashing the bot is not.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the snapshot persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Wrapper around IO errors (directory creation, file access).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization errors on save.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One whole-document JSON snapshot on disk.
///
/// `load` never fails: missing, empty, or corrupt files yield `T::default()`
/// (logged at warn level for the corrupt case). `save` replaces the full
/// document under an exclusive lock.
pub struct SnapshotFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> SnapshotFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current snapshot, falling back to the empty default when the
    /// file is absent or its contents cannot be parsed.
    pub fn load(&self) -> T {
        let Ok(mut f) = fs::OpenOptions::new().read(true).open(&self.path) else {
            return T::default();
        };
        let _ = f.lock_shared();
        let mut raw = String::new();
        if let Err(e) = f.read_to_string(&mut raw) {
            log::warn!("store: failed reading {:?}: {}", self.path, e);
            let _ = f.unlock();
            return T::default();
        }
        let _ = f.unlock();
        let cleaned = raw.trim_start_matches('\0');
        if cleaned.trim().is_empty() {
            return T::default();
        }
        match serde_json::from_str(cleaned) {
            Ok(value) => value,
            Err(e) => {
                log::warn!(
                    "store: corrupt snapshot {:?} ({}); starting from empty state",
                    self.path,
                    e
                );
                T::default()
            }
        }
    }

    /// Replace the on-disk document with `value`. The write happens under an
    /// exclusive lock and is fsynced before the lock is released.
    pub fn save(&self, value: &T) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }
        let data = serde_json::to_string_pretty(value)?;
        let mut f = fs::OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)?;
        f.lock_exclusive()?;
        let result = (|| -> std::io::Result<()> {
            f.seek(SeekFrom::Start(0))?;
            f.set_len(0)?;
            f.write_all(data.as_bytes())?;
            f.flush()?;
            f.sync_all()
        })();
        let _ = f.unlock();
        result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().expect("tempdir");
        let file: SnapshotFile<HashMap<String, u32>> =
            SnapshotFile::new(dir.path().join("none.json"));
        assert!(file.load().is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let file: SnapshotFile<HashMap<String, u32>> =
            SnapshotFile::new(dir.path().join("counts.json"));
        let mut data = HashMap::new();
        data.insert("alpha".to_string(), 7);
        data.insert("beta".to_string(), 0);
        file.save(&data).expect("save");
        assert_eq!(file.load(), data);
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json at all").expect("write");
        let file: SnapshotFile<HashMap<String, u32>> = SnapshotFile::new(&path);
        assert!(file.load().is_empty());
        // A later save must still succeed and replace the corrupt content.
        let mut data = HashMap::new();
        data.insert("fixed".to_string(), 1);
        file.save(&data).expect("save over corrupt file");
        assert_eq!(file.load(), data);
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = TempDir::new().expect("tempdir");
        let file: SnapshotFile<HashMap<String, u32>> =
            SnapshotFile::new(dir.path().join("nested/deeper/data.json"));
        file.save(&HashMap::new()).expect("save into new dirs");
        assert!(file.path().exists());
    }
}
