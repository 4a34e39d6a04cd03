//! File-backed timetable store: `<dir>/<scope>.json` per scope.
//!
//! A transaction claims `<scope>.lock` with create-new semantics, stages its
//! rows in memory and commits by writing `<scope>.json.tmp` and renaming it
//! over the live file. Readers only ever see a complete file.
//!
//! A lock left behind by a killed process is not detected; `ScopeLocked`
//! names the file so an operator can remove it.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{LessonRow, Scope, ScopeTransaction, StoreError, StoreResult, TimetableStore};

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn data_path(&self, scope: &Scope) -> PathBuf {
        self.dir.join(format!("{scope}.json"))
    }

    fn lock_path(&self, scope: &Scope) -> PathBuf {
        self.dir.join(format!("{scope}.lock"))
    }

    fn read_rows(path: &Path) -> StoreResult<Vec<LessonRow>> {
        match fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl TimetableStore for FileStore {
    fn begin<'a>(&'a self, scope: &Scope) -> StoreResult<Box<dyn ScopeTransaction + 'a>> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;

        let lock_path = self.lock_path(scope);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::ScopeLocked {
                    scope: scope.to_string(),
                    lock: lock_path,
                });
            }
            Err(e) => return Err(StoreError::io(&lock_path, e)),
        }

        // The lock is ours from here on; the transaction's Drop releases it.
        let mut tx = FileTransaction {
            scope: scope.clone(),
            data_path: self.data_path(scope),
            lock_path,
            rows: Vec::new(),
            locked: true,
        };
        tx.rows = Self::read_rows(&tx.data_path)?;
        Ok(Box::new(tx))
    }

    fn load(&self, scope: &Scope) -> StoreResult<Vec<LessonRow>> {
        Self::read_rows(&self.data_path(scope))
    }
}

struct FileTransaction {
    scope: Scope,
    data_path: PathBuf,
    lock_path: PathBuf,
    /// Staged contents of the scope.
    rows: Vec<LessonRow>,
    locked: bool,
}

impl FileTransaction {
    fn release(&mut self) -> StoreResult<()> {
        if !self.locked {
            return Ok(());
        }
        self.locked = false;
        fs::remove_file(&self.lock_path).map_err(|e| StoreError::io(&self.lock_path, e))
    }
}

impl ScopeTransaction for FileTransaction {
    fn delete_scope(&mut self) -> StoreResult<usize> {
        let removed = self.rows.len();
        self.rows.clear();
        Ok(removed)
    }

    fn insert(&mut self, row: LessonRow) -> StoreResult<()> {
        if row.scope != self.scope.as_str() {
            return Err(StoreError::ScopeMismatch {
                scope: self.scope.to_string(),
                row: row.scope,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let tmp_path = self.data_path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&self.rows)?;
        fs::write(&tmp_path, bytes).map_err(|e| StoreError::io(&tmp_path, e))?;
        if let Err(e) = fs::rename(&tmp_path, &self.data_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(&self.data_path, e));
        }
        self.release()
    }

    fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.rows.clear();
        self.release()
    }
}

impl Drop for FileTransaction {
    fn drop(&mut self) {
        if self.locked {
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}
