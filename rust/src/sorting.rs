//! Ranking rules used by the assignment engine.
//!
//! Three orderings drive the search:
//! - classes: fewest placeable options first, then most remaining hours, then identifier
//! - subjects: most remaining hours first, then code (see `DemandTable::open_subjects`)
//! - teachers: fewest lessons placed so far, then registry order
//!
//! Every key ends in an index, so the orderings are total and runs are reproducible.

use std::cmp::Reverse;

use crate::interner::{ClassIdx, TeacherIdx};

/// Sort key for picking the next class at a slot (lower = more constrained).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassKey {
    /// Placeable `(subject, teacher)` pairs at this slot.
    pub options: usize,
    pub remaining: Reverse<u64>,
    pub class: ClassIdx,
}

impl ClassKey {
    pub fn new(class: ClassIdx, options: usize, remaining: u64) -> Self {
        Self {
            options,
            remaining: Reverse(remaining),
            class,
        }
    }
}

/// Sort key for picking among free qualified teachers (lower = preferred).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TeacherKey {
    pub load: usize,
    pub teacher: TeacherIdx,
}

/// The most constrained class among `candidates`.
pub fn most_constrained(candidates: impl IntoIterator<Item = ClassKey>) -> Option<ClassKey> {
    candidates.into_iter().min()
}

/// Order teachers by preference.
pub fn rank_teachers(candidates: impl IntoIterator<Item = TeacherKey>) -> Vec<TeacherIdx> {
    let mut keys: Vec<TeacherKey> = candidates.into_iter().collect();
    keys.sort_unstable();
    keys.into_iter().map(|k| k.teacher).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fewest_options_wins() {
        let picked = most_constrained([
            ClassKey::new(0, 3, 5),
            ClassKey::new(1, 1, 1),
            ClassKey::new(2, 2, 9),
        ]);
        assert_eq!(picked.map(|k| k.class), Some(1));
    }

    #[test]
    fn test_ties_prefer_more_remaining_then_index() {
        let picked = most_constrained([
            ClassKey::new(0, 1, 2),
            ClassKey::new(1, 1, 3),
            ClassKey::new(2, 1, 3),
        ]);
        assert_eq!(picked.map(|k| k.class), Some(1));
        assert_eq!(most_constrained(Vec::<ClassKey>::new()), None);
    }

    #[test]
    fn test_rank_teachers_by_load() {
        let ranked = rank_teachers([
            TeacherKey { load: 2, teacher: 0 },
            TeacherKey { load: 0, teacher: 3 },
            TeacherKey { load: 0, teacher: 1 },
        ]);
        assert_eq!(ranked, vec![1, 3, 0]);
    }
}
