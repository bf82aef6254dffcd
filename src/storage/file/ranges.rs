//! Range documents: one JSON file per range.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use crate::domain::{RangeOutcome, SequenceRange};
use crate::error::{StorageError, StorageResult};

/// Directory of range files.
#[derive(Debug)]
pub struct RangeFiles {
    dir: PathBuf,
}

fn lock_failed(err: &std::io::Error) -> StorageError {
    StorageError::LockFailed(err.to_string())
}

fn read_locked(path: &Path) -> StorageResult<SequenceRange> {
    let file = File::open(path)?;
    file.lock_shared().map_err(|e| lock_failed(&e))?;
    let parsed = serde_json::from_reader(&file);
    FileExt::unlock(&file).map_err(|e| lock_failed(&e))?;
    Ok(parsed?)
}

impl RangeFiles {
    /// Create a handle over `dir`.
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Read one range.
    pub fn read(&self, id: Uuid) -> StorageResult<Option<SequenceRange>> {
        let path = self.path(id);
        if !path.exists() {
            return Ok(None);
        }
        read_locked(&path).map(Some)
    }

    /// Read every range, oldest first.
    pub fn read_all(&self) -> StorageResult<Vec<SequenceRange>> {
        let mut ranges = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                ranges.push(read_locked(&path)?);
            }
        }
        ranges.sort_by_key(|range| (range.created_at, range.id));
        Ok(ranges)
    }

    /// Write a new range. Fails if the file already exists.
    pub fn create(&self, range: &SequenceRange) -> StorageResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path(range.id))?;
        file.lock_exclusive().map_err(|e| lock_failed(&e))?;
        serde_json::to_writer_pretty(&file, range)?;
        file.sync_all()?;
        FileExt::unlock(&file).map_err(|e| lock_failed(&e))?;
        Ok(())
    }

    /// Read-modify-write one range under an exclusive lock.
    ///
    /// The file is rewritten whenever `update` changed the range, whether or not
    /// it returned a rejection.
    pub fn modify<T, F>(&self, id: Uuid, update: F) -> StorageResult<RangeOutcome<T>>
    where
        F: FnOnce(&mut SequenceRange) -> RangeOutcome<T>,
    {
        let path = self.path(id);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("range {id}")));
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        file.lock_exclusive().map_err(|e| lock_failed(&e))?;

        let result = Self::modify_locked(&mut file, update);

        FileExt::unlock(&file).map_err(|e| lock_failed(&e))?;
        result
    }

    fn modify_locked<T, F>(file: &mut File, update: F) -> StorageResult<RangeOutcome<T>>
    where
        F: FnOnce(&mut SequenceRange) -> RangeOutcome<T>,
    {
        let mut range: SequenceRange = serde_json::from_reader(&*file)?;
        let before = range.clone();
        let outcome = update(&mut range);

        if range != before {
            let json = serde_json::to_string_pretty(&range)?;
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        Ok(outcome)
    }

    /// Delete a range file if `check` allows it.
    pub fn remove_if<F>(&self, id: Uuid, check: F) -> StorageResult<RangeOutcome<bool>>
    where
        F: FnOnce(&SequenceRange) -> RangeOutcome<()>,
    {
        let path = self.path(id);
        if !path.exists() {
            return Ok(Ok(false));
        }

        let file = OpenOptions::new().read(true).open(&path)?;
        file.lock_exclusive().map_err(|e| lock_failed(&e))?;
        let range: StorageResult<SequenceRange> =
            serde_json::from_reader(&file).map_err(StorageError::from);

        let outcome = match range {
            Ok(range) => match check(&range) {
                Ok(()) => std::fs::remove_file(&path)
                    .map(|()| Ok(true))
                    .map_err(StorageError::from),
                Err(rejection) => Ok(Err(rejection)),
            },
            Err(e) => Err(e),
        };

        FileExt::unlock(&file).map_err(|e| lock_failed(&e))?;
        outcome
    }
}
