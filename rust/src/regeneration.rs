//! All-or-nothing replacement of a scope's persisted timetable.

use serde::Serialize;

use crate::config::PeriodClock;
use crate::logging::AUDIT_TARGET;
use crate::models::Timetable;
use crate::store::{LessonRow, Scope, StoreError, TimetableStore};

/// Row counts of one committed regeneration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub replaced: usize,
    pub inserted: usize,
}

/// The only writer of committed timetable state.
pub struct RegenerationManager<'a, S: TimetableStore + ?Sized> {
    store: &'a S,
    clock: &'a PeriodClock,
}

impl<'a, S: TimetableStore + ?Sized> RegenerationManager<'a, S> {
    pub fn new(store: &'a S, clock: &'a PeriodClock) -> Self {
        Self { store, clock }
    }

    /// Turn timetable entries into lesson rows with clock times.
    pub fn to_rows(&self, scope: &Scope, timetable: &Timetable) -> Result<Vec<LessonRow>, StoreError> {
        timetable
            .entries()
            .iter()
            .map(|entry| {
                let times = self
                    .clock
                    .times(entry.slot.period)
                    .ok_or(StoreError::MissingPeriodTime {
                        period: entry.slot.period,
                    })?;
                Ok(LessonRow {
                    scope: scope.to_string(),
                    class_id: entry.class_id.clone(),
                    subject: entry.subject.clone(),
                    teacher_id: entry.teacher_id.clone(),
                    day: entry.slot.weekday(),
                    start: times.start,
                    end: times.end,
                })
            })
            .collect()
    }

    /// Replace every row of `scope` with `timetable`.
    ///
    /// Rows are built before the transaction opens, so a clock gap never
    /// touches the store. Any failed insert rolls the scope back to its
    /// previous rows and the error is returned.
    pub fn regenerate(
        &self,
        scope: &Scope,
        timetable: &Timetable,
    ) -> Result<RegenerationReport, StoreError> {
        let rows = self.to_rows(scope, timetable)?;
        let inserted = rows.len();

        let mut tx = self.store.begin(scope)?;
        let replaced = tx.delete_scope()?;
        for row in rows {
            if let Err(err) = tx.insert(row) {
                tracing::warn!(
                    target: AUDIT_TARGET,
                    scope = %scope,
                    error = %err,
                    "Regeneration rolled back"
                );
                tx.rollback()?;
                return Err(err);
            }
        }
        tx.commit()?;

        tracing::info!(
            target: AUDIT_TARGET,
            scope = %scope,
            replaced,
            inserted,
            "Timetable regenerated"
        );
        Ok(RegenerationReport { replaced, inserted })
    }
}
