//! In-memory timetable store.

use parking_lot::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;

use super::{LessonRow, Scope, ScopeTransaction, StoreError, StoreResult, TimetableStore};

type Scopes = FxHashMap<String, Vec<LessonRow>>;

/// Mutex-guarded rows per scope.
///
/// A transaction holds the store's lock until it ends, so readers never see
/// a half-written scope. Insert failures can be injected for tests of the
/// rollback path.
#[derive(Default)]
pub struct MemoryStore {
    scopes: Mutex<Scopes>,
    fail_on_insert: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th insert (1-based) of the next transaction fail.
    pub fn fail_on_nth_insert(&self, n: usize) {
        *self.fail_on_insert.lock() = Some(n);
    }

    /// Replace the committed rows of `scope` without a transaction.
    pub fn seed(&self, scope: &Scope, rows: Vec<LessonRow>) {
        self.scopes.lock().insert(scope.as_str().to_string(), rows);
    }
}

impl TimetableStore for MemoryStore {
    fn begin<'a>(&'a self, scope: &Scope) -> StoreResult<Box<dyn ScopeTransaction + 'a>> {
        let fail_on_insert = self.fail_on_insert.lock().take();
        let guard = self.scopes.lock();
        let snapshot = guard.get(scope.as_str()).cloned();
        Ok(Box::new(MemoryTransaction {
            guard,
            scope: scope.clone(),
            snapshot,
            fail_on_insert,
            inserted: 0,
            finished: false,
        }))
    }

    fn load(&self, scope: &Scope) -> StoreResult<Vec<LessonRow>> {
        Ok(self
            .scopes
            .lock()
            .get(scope.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, Scopes>,
    scope: Scope,
    /// Rows of the scope when the transaction began.
    snapshot: Option<Vec<LessonRow>>,
    fail_on_insert: Option<usize>,
    inserted: usize,
    finished: bool,
}

impl MemoryTransaction<'_> {
    fn restore(&mut self) {
        let key = self.scope.as_str().to_string();
        match self.snapshot.take() {
            Some(rows) => {
                self.guard.insert(key, rows);
            }
            None => {
                self.guard.remove(&key);
            }
        }
        self.finished = true;
    }
}

impl ScopeTransaction for MemoryTransaction<'_> {
    fn delete_scope(&mut self) -> StoreResult<usize> {
        Ok(self
            .guard
            .remove(self.scope.as_str())
            .map_or(0, |rows| rows.len()))
    }

    fn insert(&mut self, row: LessonRow) -> StoreResult<()> {
        if row.scope != self.scope.as_str() {
            return Err(StoreError::ScopeMismatch {
                scope: self.scope.to_string(),
                row: row.scope,
            });
        }
        self.inserted += 1;
        if self.fail_on_insert == Some(self.inserted) {
            return Err(StoreError::InsertFailed {
                scope: self.scope.to_string(),
                position: self.inserted,
                reason: "injected failure".to_string(),
            });
        }
        self.guard
            .entry(self.scope.as_str().to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.finished = true;
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.restore();
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.restore();
        }
    }
}
