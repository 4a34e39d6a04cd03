//! Bounded backtracking for requirements the greedy pass could not place.
//!
//! Repair works in two phases, both charged to one [`Budget`].
//!
//! Ejection chains come first. Lessons blocking a cell (the class's own
//! lesson, the qualified teacher's lesson, or both at once) are lifted out,
//! the stranded requirement takes the cell, and the lifted lessons are
//! re-placed elsewhere, possibly by ejecting further lessons. Every step
//! goes through the [`SearchState`] journal, so a chain that dead-ends is
//! rolled back exactly.
//!
//! If chains leave requirements unmet, the week is cleared and searched
//! depth-first, fewest open cells first. With enough budget this finds a
//! timetable whenever one exists; otherwise the state before the search is
//! restored.

use std::cmp::Reverse;

use rustc_hash::FxHashSet;

use crate::error::TimetableError;
use crate::interner::{ClassIdx, SubjectIdx, TeacherIdx};
use crate::{log_changes, log_debug};

use super::core::AssignmentEngine;
use super::state::{Placement, SearchState};

/// Counts search steps against a fixed limit.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    limit: usize,
    used: usize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// Take one step. Returns false once the limit is reached.
    pub fn spend(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }

    /// A fresh budget of at most `cap` of the steps still available here.
    pub fn share(&self, cap: usize) -> Budget {
        Budget::new(self.remaining().min(cap))
    }

    /// Count the steps spent from a [`share`](Self::share) against this budget.
    pub fn charge(&mut self, spent: &Budget) {
        self.used = (self.used + spent.used).min(self.limit);
    }
}

/// Lessons to lift out of `slot` so the stranded requirement fits there.
struct Ejection {
    slot: usize,
    /// One or two lessons, the class's own first.
    lessons: Vec<Placement>,
}

impl Ejection {
    fn newest(&self) -> u64 {
        self.lessons.iter().map(|p| p.seq).max().unwrap_or(0)
    }
}

enum Search {
    Found,
    DeadEnd,
    OutOfBudget,
}

impl AssignmentEngine<'_> {
    /// Repair unmet requirements: ejection chains on up to half of the
    /// budget, then exhaustive search on what is left.
    pub(super) fn repair_all(
        &self,
        state: &mut SearchState,
        budget: &mut Budget,
    ) -> Result<(), TimetableError> {
        let mut chains = budget.share(budget.remaining().div_ceil(2));
        self.eject_all(state, &mut chains)?;
        budget.charge(&chains);

        if state.demand.is_satisfied() || budget.exhausted() {
            return Ok(());
        }
        log_changes!(
            self.verbosity,
            "Ejection chains left {} requirement(s) unmet; searching the whole week ({} steps left)",
            state.demand.unmet().len(),
            budget.remaining()
        );
        self.exhaustive(state, budget)
    }

    /// Run ejection chains until all requirements are placed, nothing moves,
    /// or the budget runs out.
    fn eject_all(&self, state: &mut SearchState, budget: &mut Budget) -> Result<(), TimetableError> {
        loop {
            let unmet = state.demand.unmet();
            if unmet.is_empty() || budget.exhausted() {
                return Ok(());
            }

            let mut progressed = false;
            for (class, subject, _) in unmet {
                if state.demand.remaining(class, subject) == 0 {
                    continue;
                }
                if let Some(placed) = self.place_anywhere(state, class, subject)? {
                    self.log_placement("Placed free", &placed);
                    state.commit();
                    progressed = true;
                    continue;
                }

                let checkpoint = state.checkpoint();
                let mut locked = FxHashSet::default();
                if self.repair(state, class, subject, 0, &mut locked, budget)? {
                    log_changes!(
                        self.verbosity,
                        "  Repaired class {} / {} ({} steps used)",
                        self.problem.classes.name(class),
                        self.problem.subjects.name(subject),
                        budget.used()
                    );
                    progressed = true;
                } else {
                    state.rollback_to(checkpoint)?;
                }
                state.commit();

                if budget.exhausted() {
                    break;
                }
            }

            if !progressed {
                return Ok(());
            }
        }
    }

    /// Try to place one hour of `(class, subject)` by ejecting lessons.
    ///
    /// Lessons placed during this chain are `locked` and never ejected again.
    /// Sequence numbers are never reused, so locks of rolled-back placements
    /// are inert. On `Ok(false)` the caller rolls back.
    fn repair(
        &self,
        state: &mut SearchState,
        class: ClassIdx,
        subject: SubjectIdx,
        depth: usize,
        locked: &mut FxHashSet<u64>,
        budget: &mut Budget,
    ) -> Result<bool, TimetableError> {
        if depth > self.max_chain_depth {
            return Ok(false);
        }

        for ejection in self.ejections(state, class, subject, locked) {
            if !budget.spend() {
                return Ok(false);
            }
            let checkpoint = state.checkpoint();

            for lesson in &ejection.lessons {
                state.unplace(lesson.seq)?;
            }
            let teacher = self
                .free_teachers(state, subject, class, ejection.slot)
                .first()
                .copied();
            let Some(teacher) = teacher else {
                state.rollback_to(checkpoint)?;
                continue;
            };
            let placed = state.place(class, subject, teacher, ejection.slot)?;
            locked.insert(placed.seq);
            for lesson in &ejection.lessons {
                log_debug!(
                    self.verbosity,
                    "    [depth {}] Ejected class {} / {} from {} for class {} / {}",
                    depth,
                    self.problem.classes.name(lesson.class),
                    self.problem.subjects.name(lesson.subject),
                    self.slot_label(ejection.slot),
                    self.problem.classes.name(class),
                    self.problem.subjects.name(subject)
                );
            }

            if self.replace_all(state, &ejection.lessons, depth, locked, budget)? {
                return Ok(true);
            }
            state.rollback_to(checkpoint)?;
        }

        Ok(false)
    }

    /// Re-place every ejected lesson, recursing for those with no free cell.
    fn replace_all(
        &self,
        state: &mut SearchState,
        lessons: &[Placement],
        depth: usize,
        locked: &mut FxHashSet<u64>,
        budget: &mut Budget,
    ) -> Result<bool, TimetableError> {
        for lesson in lessons {
            if let Some(replaced) = self.place_anywhere(state, lesson.class, lesson.subject)? {
                locked.insert(replaced.seq);
                continue;
            }
            if !self.repair(state, lesson.class, lesson.subject, depth + 1, locked, budget)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Candidate ejections for `(class, subject)`, cheapest first.
    ///
    /// At each slot the class's own lesson blocks the class, and the lesson
    /// of a busy qualified teacher blocks that teacher. A candidate lifts
    /// whichever of the two are in the way. Single ejections come before
    /// compound ones, newer lessons before older ones.
    fn ejections(
        &self,
        state: &SearchState,
        class: ClassIdx,
        subject: SubjectIdx,
        locked: &FxHashSet<u64>,
    ) -> Vec<Ejection> {
        let qualified = self.problem.eligibility.qualified(subject, class);
        let lesson_of = |slot: usize, teacher: TeacherIdx| {
            state
                .placements()
                .iter()
                .find(|p| p.slot == slot && p.teacher == teacher)
                .copied()
        };

        let mut out: Vec<Ejection> = Vec::new();
        for slot in 0..state.grid.slot_count() {
            let own = state
                .placements()
                .iter()
                .find(|p| p.slot == slot && p.class == class)
                .copied();
            if let Some(own) = own {
                if own.subject == subject || locked.contains(&own.seq) {
                    continue;
                }
            }

            let mut seen: Vec<Vec<u64>> = Vec::new();
            for &teacher in qualified {
                let blocker = if state.grid.is_teacher_free(teacher, slot) {
                    None
                } else {
                    // Busy but not teaching means declared unavailable.
                    match lesson_of(slot, teacher) {
                        Some(p) if !locked.contains(&p.seq) => Some(p),
                        _ => continue,
                    }
                };

                let mut lessons: Vec<Placement> = own.into_iter().collect();
                if let Some(p) = blocker.filter(|p| Some(p.seq) != own.map(|o| o.seq)) {
                    lessons.push(p);
                }
                let key: Vec<u64> = lessons.iter().map(|p| p.seq).collect();
                if lessons.is_empty() || seen.contains(&key) {
                    continue;
                }
                seen.push(key);
                out.push(Ejection { slot, lessons });
            }
        }

        out.sort_by_key(|e| (e.lessons.len(), Reverse(e.newest()), e.slot));
        out
    }

    /// Clear the week and search it depth-first. Keeps the result only when
    /// every requirement is placed.
    fn exhaustive(&self, state: &mut SearchState, budget: &mut Budget) -> Result<(), TimetableError> {
        let checkpoint = state.checkpoint();
        let placed: Vec<u64> = state.placements().iter().map(|p| p.seq).collect();
        for seq in placed {
            state.unplace(seq)?;
        }

        match self.search(state, budget)? {
            Search::Found => {
                log_changes!(
                    self.verbosity,
                    "  Exhaustive search placed every lesson ({} steps used)",
                    budget.used()
                );
            }
            Search::DeadEnd => {
                log_changes!(self.verbosity, "  Exhaustive search proved the week infeasible");
                state.rollback_to(checkpoint)?;
            }
            Search::OutOfBudget => {
                log_changes!(self.verbosity, "  Exhaustive search ran out of budget");
                state.rollback_to(checkpoint)?;
            }
        }
        state.commit();
        Ok(())
    }

    /// Place the requirement with the fewest open cells, then recurse.
    /// Leaves the state unchanged on `DeadEnd`.
    fn search(&self, state: &mut SearchState, budget: &mut Budget) -> Result<Search, TimetableError> {
        let mut best: Option<(ClassIdx, SubjectIdx, Vec<(usize, TeacherIdx)>)> = None;
        for (class, subject, missing) in state.demand.unmet() {
            let cells = self.open_cells(state, class, subject);
            if distinct_slots(&cells) < missing as usize {
                return Ok(Search::DeadEnd);
            }
            if best.as_ref().map_or(true, |(_, _, b)| cells.len() < b.len()) {
                best = Some((class, subject, cells));
            }
        }
        let Some((class, subject, cells)) = best else {
            return Ok(Search::Found);
        };

        for (slot, teacher) in cells {
            if !budget.spend() {
                return Ok(Search::OutOfBudget);
            }
            let placed = state.place(class, subject, teacher, slot)?;
            match self.search(state, budget)? {
                Search::DeadEnd => {
                    state.unplace(placed.seq)?;
                }
                done => return Ok(done),
            }
        }
        Ok(Search::DeadEnd)
    }

    /// `(slot, teacher)` cells where the next hour of `(class, subject)` may go.
    ///
    /// Hours of one requirement are interchangeable, so they are placed in
    /// increasing slot order.
    fn open_cells(
        &self,
        state: &SearchState,
        class: ClassIdx,
        subject: SubjectIdx,
    ) -> Vec<(usize, TeacherIdx)> {
        let after = state
            .placements()
            .iter()
            .filter(|p| p.class == class && p.subject == subject)
            .map(|p| p.slot + 1)
            .max()
            .unwrap_or(0);

        (after..state.grid.slot_count())
            .filter(|&slot| state.grid.is_class_free(class, slot))
            .flat_map(|slot| {
                self.free_teachers(state, subject, class, slot)
                    .into_iter()
                    .map(move |teacher| (slot, teacher))
            })
            .collect()
    }
}

/// Number of different slots in slot-ordered `cells`.
fn distinct_slots(cells: &[(usize, TeacherIdx)]) -> usize {
    let mut count = 0;
    let mut last = None;
    for &(slot, _) in cells {
        if last != Some(slot) {
            count += 1;
            last = Some(slot);
        }
    }
    count
}
