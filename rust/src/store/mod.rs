//! Persisted timetable storage.
//!
//! A store holds lesson rows grouped by scope (a term, a school, a class
//! group). All writes go through a [`ScopeTransaction`], which owns the
//! scope exclusively until it is committed, rolled back, or dropped.
//!
//! Backends:
//! - [`MemoryStore`]: mutex-guarded map, used by tests and dry runs
//! - [`FileStore`]: one JSON file per scope with a lock file and atomic rename

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode or decode lesson rows: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(
        "scope {scope} is locked by another regeneration; remove {} if none is running",
        .lock.display()
    )]
    ScopeLocked { scope: String, lock: PathBuf },

    #[error("insert of row {position} into scope {scope} failed: {reason}")]
    InsertFailed {
        scope: String,
        position: usize,
        reason: String,
    },

    #[error("row for scope {row} inserted in a transaction on scope {scope}")]
    ScopeMismatch { scope: String, row: String },

    #[error("no clock times configured for period {}", .period + 1)]
    MissingPeriodTime { period: u8 },

    #[error("invalid scope identifier {0:?}: use letters, digits, '-', '_' or '.'")]
    InvalidScope(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Identifier of an independently regenerated set of lesson rows.
///
/// Scopes double as file names in the file store, so they are restricted to
/// ASCII letters, digits, `-`, `_` and `.`, and may not start with a dot.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope(String);

impl Scope {
    pub fn new(id: impl Into<String>) -> StoreResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Scope(id))
        } else {
            Err(StoreError::InvalidScope(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scope {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::new(s)
    }
}

/// One persisted lesson, as read by attendance and calendar views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRow {
    pub scope: String,
    pub class_id: String,
    pub subject: String,
    pub teacher_id: String,
    pub day: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Backend holding lesson rows per scope.
pub trait TimetableStore {
    /// Open an exclusive write transaction on `scope`.
    ///
    /// # Errors
    /// `ScopeLocked` when another transaction holds the scope and the
    /// backend cannot wait for it.
    fn begin<'a>(&'a self, scope: &Scope) -> StoreResult<Box<dyn ScopeTransaction + 'a>>;

    /// Committed rows of `scope`; empty if the scope was never written.
    fn load(&self, scope: &Scope) -> StoreResult<Vec<LessonRow>>;
}

/// Exclusive write access to one scope.
///
/// Changes become visible only on [`commit`](ScopeTransaction::commit).
/// Dropping a transaction without committing rolls it back.
pub trait ScopeTransaction {
    /// Remove every row of the scope. Returns how many rows were removed.
    fn delete_scope(&mut self) -> StoreResult<usize>;

    fn insert(&mut self, row: LessonRow) -> StoreResult<()>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[cfg(test)]
pub(crate) fn sample_row(scope: &str, class_id: &str, day: Weekday, hour: u32) -> LessonRow {
    LessonRow {
        scope: scope.to_string(),
        class_id: class_id.to_string(),
        subject: "MATH".to_string(),
        teacher_id: "t1".to_string(),
        day,
        start: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        end: NaiveTime::from_hms_opt(hour, 40, 0).unwrap(),
    }
}
