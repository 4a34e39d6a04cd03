//! Core assignment engine: slot-by-slot greedy pass with most-constrained-first
//! class selection, followed by bounded backtracking repair.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::EngineConfig;
use crate::error::TimetableError;
use crate::interner::{ClassIdx, SubjectIdx, TeacherIdx};
use crate::models::{GenerationOutcome, ScheduleEntry, SearchStats, Shortfall, Timetable};
use crate::preflight::Problem;
use crate::sorting::{most_constrained, rank_teachers, ClassKey, TeacherKey};
use crate::{log_changes, log_checks, log_debug};

use super::backtrack::Budget;
use super::state::{Placement, SearchState};

/// Produces a complete weekly timetable for a prepared [`Problem`].
///
/// The engine is single-threaded and deterministic: identical problems and
/// configuration always yield identical timetables.
pub struct AssignmentEngine<'p> {
    pub(super) problem: &'p Problem,
    pub(super) verbosity: u8,
    budget_limit: usize,
    pub(super) max_chain_depth: usize,
}

impl<'p> AssignmentEngine<'p> {
    pub fn new(problem: &'p Problem, config: &EngineConfig) -> Self {
        let slots = problem.slot_count();
        Self {
            problem,
            verbosity: config.verbosity,
            budget_limit: config.budget_for(slots, problem.classes.len()),
            max_chain_depth: config.chain_depth_for(slots),
        }
    }

    /// Run the search.
    ///
    /// # Errors
    /// * `InfeasibleSchedule` with every unmet `(class, subject, hours)` when the
    ///   backtracking budget runs out
    /// * `InvariantViolation` when the engine corrupts its own state
    pub fn run(&self) -> Result<GenerationOutcome, TimetableError> {
        let mut state = SearchState::new(
            self.problem.new_grid()?,
            self.problem.demand.clone(),
            self.problem.teachers.len(),
        );

        let pending_cells = self.greedy_pass(&mut state)?;
        state.commit();

        let stranded_after_pass = state.demand.unmet().len();
        let mut budget = Budget::new(self.budget_limit);
        if stranded_after_pass > 0 {
            log_changes!(
                self.verbosity,
                "First pass left {} requirement(s) unmet, {} pending cell(s); backtracking with budget {}",
                stranded_after_pass,
                pending_cells,
                self.budget_limit
            );
            self.repair_all(&mut state, &mut budget)?;
        }

        if !state.demand.is_satisfied() {
            let shortfalls = self.shortfalls(&state);
            log_changes!(
                self.verbosity,
                "Backtracking used {} of {} steps; {} requirement(s) still unmet",
                budget.used(),
                budget.limit(),
                shortfalls.len()
            );
            return Err(TimetableError::InfeasibleSchedule { shortfalls });
        }

        let timetable = self.build_timetable(&state)?;
        log_changes!(
            self.verbosity,
            "Placed {} lessons ({} backtracking steps)",
            timetable.len(),
            budget.used()
        );

        Ok(GenerationOutcome {
            timetable,
            stats: SearchStats {
                pending_cells,
                stranded_after_pass,
                backtrack_steps: budget.used(),
                backtrack_budget: budget.limit(),
            },
        })
    }

    /// One pass over the grid. Returns the number of pending cells.
    fn greedy_pass(&self, state: &mut SearchState) -> Result<usize, TimetableError> {
        let class_count = self.problem.classes.len();
        let mut pending_cells = 0;

        for slot in 0..state.grid.slot_count() {
            let mut visited = vec![false; class_count];

            loop {
                let candidates = (0..class_count as ClassIdx)
                    .filter(|&c| !visited[c as usize])
                    .filter(|&c| state.grid.is_class_free(c, slot))
                    .filter_map(|c| {
                        let remaining = state.demand.remaining_total(c);
                        (remaining > 0)
                            .then(|| ClassKey::new(c, self.count_options(state, c, slot), remaining))
                    });
                let Some(key) = most_constrained(candidates) else {
                    break;
                };
                visited[key.class as usize] = true;

                log_checks!(
                    self.verbosity,
                    "  {} considering class {} (options={}, remaining={})",
                    self.slot_label(slot),
                    self.problem.classes.name(key.class),
                    key.options,
                    key.remaining.0
                );

                match self.best_pair(state, key.class, slot) {
                    Some((subject, teacher)) => {
                        let placed = state.place(key.class, subject, teacher, slot)?;
                        self.log_placement("Placed", &placed);
                    }
                    None => {
                        pending_cells += 1;
                        log_checks!(
                            self.verbosity,
                            "  Pending cell: class {} at {}",
                            self.problem.classes.name(key.class),
                            self.slot_label(slot)
                        );
                    }
                }
            }
        }

        Ok(pending_cells)
    }

    /// Placeable `(subject, teacher)` pairs for `class` at `slot`.
    fn count_options(&self, state: &SearchState, class: ClassIdx, slot: usize) -> usize {
        state
            .demand
            .open_subjects(class)
            .into_iter()
            .map(|subject| {
                self.problem
                    .eligibility
                    .qualified(subject, class)
                    .iter()
                    .filter(|&&t| state.grid.is_teacher_free(t, slot))
                    .count()
            })
            .sum()
    }

    /// First subject in rank order that has a free qualified teacher.
    fn best_pair(
        &self,
        state: &SearchState,
        class: ClassIdx,
        slot: usize,
    ) -> Option<(SubjectIdx, TeacherIdx)> {
        state
            .demand
            .open_subjects(class)
            .into_iter()
            .find_map(|subject| {
                self.free_teachers(state, subject, class, slot)
                    .first()
                    .map(|&teacher| (subject, teacher))
            })
    }

    /// Qualified teachers free at `slot`, preferred first.
    pub(super) fn free_teachers(
        &self,
        state: &SearchState,
        subject: SubjectIdx,
        class: ClassIdx,
        slot: usize,
    ) -> Vec<TeacherIdx> {
        rank_teachers(
            self.problem
                .eligibility
                .qualified(subject, class)
                .iter()
                .filter(|&&t| state.grid.is_teacher_free(t, slot))
                .map(|&teacher| TeacherKey {
                    load: state.teacher_load(teacher),
                    teacher,
                }),
        )
    }

    /// Place `(class, subject)` in the first slot where the class and a
    /// qualified teacher are both free.
    pub(super) fn place_anywhere(
        &self,
        state: &mut SearchState,
        class: ClassIdx,
        subject: SubjectIdx,
    ) -> Result<Option<Placement>, TimetableError> {
        for slot in 0..state.grid.slot_count() {
            if !state.grid.is_class_free(class, slot) {
                continue;
            }
            if let Some(&teacher) = self.free_teachers(state, subject, class, slot).first() {
                let placed = state.place(class, subject, teacher, slot)?;
                log_debug!(
                    self.verbosity,
                    "    Re-placed class {} / {} at {}",
                    self.problem.classes.name(class),
                    self.problem.subjects.name(subject),
                    self.slot_label(slot)
                );
                return Ok(Some(placed));
            }
        }
        Ok(None)
    }

    fn shortfalls(&self, state: &SearchState) -> Vec<Shortfall> {
        state
            .demand
            .unmet()
            .into_iter()
            .map(|(class, subject, missing)| Shortfall {
                class_id: self.problem.classes.name(class).to_string(),
                subject: self.problem.subjects.name(subject).to_string(),
                missing,
            })
            .collect()
    }

    /// Check all four timetable invariants and resolve identifiers.
    fn build_timetable(&self, state: &SearchState) -> Result<Timetable, TimetableError> {
        let problem = self.problem;
        let mut class_cells: FxHashSet<(ClassIdx, usize)> = FxHashSet::default();
        let mut teacher_cells: FxHashSet<(TeacherIdx, usize)> = FxHashSet::default();
        let mut counts: FxHashMap<(ClassIdx, SubjectIdx), u32> = FxHashMap::default();
        let mut entries = Vec::with_capacity(state.placements().len());

        for p in state.placements() {
            if !class_cells.insert((p.class, p.slot)) {
                return Err(TimetableError::invariant(format!(
                    "class {} has two lessons at {}",
                    problem.classes.name(p.class),
                    self.slot_label(p.slot)
                )));
            }
            if !teacher_cells.insert((p.teacher, p.slot)) {
                return Err(TimetableError::invariant(format!(
                    "teacher {} has two lessons at {}",
                    problem.teachers.name(p.teacher),
                    self.slot_label(p.slot)
                )));
            }
            if !problem.eligibility.is_eligible(p.teacher, p.subject, p.class) {
                return Err(TimetableError::invariant(format!(
                    "teacher {} is not eligible for {} in class {}",
                    problem.teachers.name(p.teacher),
                    problem.subjects.name(p.subject),
                    problem.classes.name(p.class)
                )));
            }
            *counts.entry((p.class, p.subject)).or_insert(0) += 1;

            let slot = state.grid.slot(p.slot).ok_or_else(|| {
                TimetableError::invariant(format!("placement in unknown slot {}", p.slot))
            })?;
            entries.push(ScheduleEntry {
                class_id: problem.classes.name(p.class).to_string(),
                subject: problem.subjects.name(p.subject).to_string(),
                teacher_id: problem.teachers.name(p.teacher).to_string(),
                slot,
            });
        }

        for (class, subject, quota) in problem.demand.requirements() {
            let placed = counts.remove(&(class, subject)).unwrap_or(0);
            if placed != quota {
                return Err(TimetableError::invariant(format!(
                    "class {} has {} lessons of {} but a quota of {}",
                    problem.classes.name(class),
                    placed,
                    problem.subjects.name(subject),
                    quota
                )));
            }
        }
        if !counts.is_empty() {
            return Err(TimetableError::invariant(
                "lessons placed for subjects the class never demanded",
            ));
        }

        Ok(Timetable::from_verified(entries))
    }

    pub(super) fn log_placement(&self, action: &str, p: &Placement) {
        log_changes!(
            self.verbosity,
            "  {} class {} / {} with {} at {}",
            action,
            self.problem.classes.name(p.class),
            self.problem.subjects.name(p.subject),
            self.problem.teachers.name(p.teacher),
            self.slot_label(p.slot)
        );
    }

    pub(super) fn slot_label(&self, slot: usize) -> String {
        self.problem
            .slots
            .get(slot)
            .map_or_else(|| format!("slot #{slot}"), |s| s.to_string())
    }
}
