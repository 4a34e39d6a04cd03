//! Mutable search state with an undo journal.

use crate::demand::DemandTable;
use crate::error::TimetableError;
use crate::interner::{ClassIdx, SubjectIdx, TeacherIdx};

use super::grid::SlotGrid;

/// One placed lesson, identified by its placement sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub seq: u64,
    pub class: ClassIdx,
    pub subject: SubjectIdx,
    pub teacher: TeacherIdx,
    /// Position in the grid's slot list.
    pub slot: usize,
}

#[derive(Clone, Copy, Debug)]
enum JournalOp {
    Placed { seq: u64 },
    Removed { index: usize, placement: Placement },
}

/// Grid, demand and placement log of one run.
///
/// Every mutation is journaled so a failed ejection chain can be rolled
/// back to an exact earlier state, including placement order.
#[derive(Clone, Debug)]
pub struct SearchState {
    pub grid: SlotGrid,
    pub demand: DemandTable,
    /// Placements in placement order.
    placements: Vec<Placement>,
    journal: Vec<JournalOp>,
    teacher_load: Vec<usize>,
    next_seq: u64,
}

impl SearchState {
    pub fn new(grid: SlotGrid, demand: DemandTable, teacher_count: usize) -> Self {
        Self {
            grid,
            demand,
            placements: Vec::new(),
            journal: Vec::new(),
            teacher_load: vec![0; teacher_count],
            next_seq: 0,
        }
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn teacher_load(&self, teacher: TeacherIdx) -> usize {
        self.teacher_load.get(teacher as usize).copied().unwrap_or(0)
    }

    /// Place a lesson: occupy the grid, count it against demand, log it.
    pub fn place(
        &mut self,
        class: ClassIdx,
        subject: SubjectIdx,
        teacher: TeacherIdx,
        slot: usize,
    ) -> Result<Placement, TimetableError> {
        self.demand.decrement(class, subject)?;
        if let Err(err) = self.grid.mark_busy(teacher, class, slot) {
            self.demand.restore(class, subject)?;
            return Err(err);
        }
        let placement = Placement {
            seq: self.next_seq,
            class,
            subject,
            teacher,
            slot,
        };
        self.next_seq += 1;
        self.placements.push(placement);
        self.bump_load(teacher, true)?;
        self.journal.push(JournalOp::Placed { seq: placement.seq });
        Ok(placement)
    }

    /// Undo a placement: free the grid cells and give the hour back to demand.
    pub fn unplace(&mut self, seq: u64) -> Result<Placement, TimetableError> {
        let index = self
            .placements
            .iter()
            .position(|p| p.seq == seq)
            .ok_or_else(|| TimetableError::invariant(format!("unplace of unknown placement {seq}")))?;
        let placement = self.placements.remove(index);
        self.grid
            .release(placement.teacher, placement.class, placement.slot)?;
        self.demand.restore(placement.class, placement.subject)?;
        self.bump_load(placement.teacher, false)?;
        self.journal.push(JournalOp::Removed { index, placement });
        Ok(placement)
    }

    /// Journal position to roll back to.
    pub fn checkpoint(&self) -> usize {
        self.journal.len()
    }

    /// Revert every mutation made since `checkpoint`, newest first.
    pub fn rollback_to(&mut self, checkpoint: usize) -> Result<(), TimetableError> {
        while self.journal.len() > checkpoint {
            let Some(op) = self.journal.pop() else {
                break;
            };
            match op {
                JournalOp::Placed { seq } => {
                    let placement = match self.placements.pop() {
                        Some(p) if p.seq == seq => p,
                        _ => {
                            return Err(TimetableError::invariant(format!(
                                "journal out of order while rolling back placement {seq}"
                            )))
                        }
                    };
                    self.grid
                        .release(placement.teacher, placement.class, placement.slot)?;
                    self.demand.restore(placement.class, placement.subject)?;
                    self.bump_load(placement.teacher, false)?;
                }
                JournalOp::Removed { index, placement } => {
                    self.grid
                        .mark_busy(placement.teacher, placement.class, placement.slot)?;
                    self.demand.decrement(placement.class, placement.subject)?;
                    if index > self.placements.len() {
                        return Err(TimetableError::invariant(format!(
                            "journal out of order while restoring placement {}",
                            placement.seq
                        )));
                    }
                    self.placements.insert(index, placement);
                    self.bump_load(placement.teacher, true)?;
                }
            }
        }
        Ok(())
    }

    /// Forget the journal; the current state becomes the new base.
    pub fn commit(&mut self) {
        self.journal.clear();
    }

    fn bump_load(&mut self, teacher: TeacherIdx, up: bool) -> Result<(), TimetableError> {
        let load = self
            .teacher_load
            .get_mut(teacher as usize)
            .ok_or_else(|| TimetableError::invariant(format!("unknown teacher index {teacher}")))?;
        if up {
            *load += 1;
        } else {
            *load = load.checked_sub(1).ok_or_else(|| {
                TimetableError::invariant(format!("negative load for teacher index {teacher}"))
            })?;
        }
        Ok(())
    }
}
