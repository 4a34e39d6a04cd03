//! Weekly slot grid with teacher and class occupancy.

use crate::error::TimetableError;
use crate::interner::{ClassIdx, TeacherIdx};
use crate::models::TimeSlot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TeacherCell {
    Free,
    /// Declared unavailable before search.
    Blocked,
    Teaching,
}

/// Occupancy bookkeeping for one run.
///
/// Slots are addressed by their position in the day-major slot list. The
/// grid knows nothing about subjects; it only answers who is busy when.
#[derive(Clone, Debug)]
pub struct SlotGrid {
    slots: Vec<TimeSlot>,
    teacher_cells: Vec<TeacherCell>,
    class_busy: Vec<bool>,
    teacher_count: usize,
    class_count: usize,
}

impl SlotGrid {
    /// Create an empty grid. `slots` is sorted into iteration order.
    pub fn new(mut slots: Vec<TimeSlot>, teacher_count: usize, class_count: usize) -> Self {
        slots.sort();
        slots.dedup();
        let n = slots.len();
        Self {
            slots,
            teacher_cells: vec![TeacherCell::Free; teacher_count * n],
            class_busy: vec![false; class_count * n],
            teacher_count,
            class_count,
        }
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<TimeSlot> {
        self.slots.get(index).copied()
    }

    /// Position of `slot` in iteration order.
    pub fn index_of(&self, slot: TimeSlot) -> Option<usize> {
        self.slots.binary_search(&slot).ok()
    }

    fn teacher_cell(&self, teacher: TeacherIdx, slot: usize) -> Option<usize> {
        let t = teacher as usize;
        (t < self.teacher_count && slot < self.slots.len()).then(|| t * self.slots.len() + slot)
    }

    fn class_cell(&self, class: ClassIdx, slot: usize) -> Option<usize> {
        let c = class as usize;
        (c < self.class_count && slot < self.slots.len()).then(|| c * self.slots.len() + slot)
    }

    #[inline]
    pub fn is_teacher_free(&self, teacher: TeacherIdx, slot: usize) -> bool {
        self.teacher_cell(teacher, slot)
            .is_some_and(|i| self.teacher_cells[i] == TeacherCell::Free)
    }

    #[inline]
    pub fn is_class_free(&self, class: ClassIdx, slot: usize) -> bool {
        self.class_cell(class, slot)
            .is_some_and(|i| !self.class_busy[i])
    }

    /// Mark a teacher unavailable at a slot before search starts.
    pub fn block_teacher(&mut self, teacher: TeacherIdx, slot: usize) -> Result<(), TimetableError> {
        let i = self.teacher_cell(teacher, slot).ok_or_else(|| {
            TimetableError::invariant(format!("block of teacher {teacher} outside the grid"))
        })?;
        match self.teacher_cells[i] {
            TeacherCell::Teaching => Err(TimetableError::invariant(format!(
                "teacher {teacher} blocked at slot {slot} while teaching"
            ))),
            _ => {
                self.teacher_cells[i] = TeacherCell::Blocked;
                Ok(())
            }
        }
    }

    /// Occupy `(teacher, class)` at `slot`. Either side already busy is an engine bug.
    pub fn mark_busy(
        &mut self,
        teacher: TeacherIdx,
        class: ClassIdx,
        slot: usize,
    ) -> Result<(), TimetableError> {
        let (ti, ci) = self.cells(teacher, class, slot)?;
        if self.teacher_cells[ti] != TeacherCell::Free {
            return Err(TimetableError::invariant(format!(
                "teacher {teacher} double-booked at slot {slot}"
            )));
        }
        if self.class_busy[ci] {
            return Err(TimetableError::invariant(format!(
                "class {class} double-booked at slot {slot}"
            )));
        }
        self.teacher_cells[ti] = TeacherCell::Teaching;
        self.class_busy[ci] = true;
        Ok(())
    }

    /// Undo [`mark_busy`](Self::mark_busy).
    pub fn release(
        &mut self,
        teacher: TeacherIdx,
        class: ClassIdx,
        slot: usize,
    ) -> Result<(), TimetableError> {
        let (ti, ci) = self.cells(teacher, class, slot)?;
        if self.teacher_cells[ti] != TeacherCell::Teaching || !self.class_busy[ci] {
            return Err(TimetableError::invariant(format!(
                "release of teacher {teacher} / class {class} at slot {slot} that was not placed"
            )));
        }
        self.teacher_cells[ti] = TeacherCell::Free;
        self.class_busy[ci] = false;
        Ok(())
    }

    fn cells(
        &self,
        teacher: TeacherIdx,
        class: ClassIdx,
        slot: usize,
    ) -> Result<(usize, usize), TimetableError> {
        match (self.teacher_cell(teacher, slot), self.class_cell(class, slot)) {
            (Some(ti), Some(ci)) => Ok((ti, ci)),
            _ => Err(TimetableError::invariant(format!(
                "cell teacher {teacher} / class {class} / slot {slot} outside the grid"
            ))),
        }
    }
}
