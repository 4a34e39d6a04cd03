//! Which teacher may teach which subject to which class.

use rustc_hash::FxHashMap;

use crate::demand::DemandTable;
use crate::interner::{ClassIdx, SubjectIdx, TeacherIdx};

/// Static `(subject, class) -> teachers` lookup.
///
/// Teacher lists are kept sorted by index. Teachers are interned in
/// identifier order, so the lists are in identifier order as well.
#[derive(Clone, Debug, Default)]
pub struct EligibilityRegistry {
    by_pair: FxHashMap<(SubjectIdx, ClassIdx), Vec<TeacherIdx>>,
}

impl EligibilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `teacher` may teach `subject` to `class`.
    pub fn grant(&mut self, teacher: TeacherIdx, subject: SubjectIdx, class: ClassIdx) {
        let teachers = self.by_pair.entry((subject, class)).or_default();
        if let Err(pos) = teachers.binary_search(&teacher) {
            teachers.insert(pos, teacher);
        }
    }

    /// Teachers qualified to teach `subject` to `class`, in registry order.
    pub fn qualified(&self, subject: SubjectIdx, class: ClassIdx) -> &[TeacherIdx] {
        self.by_pair
            .get(&(subject, class))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_eligible(&self, teacher: TeacherIdx, subject: SubjectIdx, class: ClassIdx) -> bool {
        self.qualified(subject, class).binary_search(&teacher).is_ok()
    }

    /// Demanded `(class, subject)` pairs that no teacher can cover.
    pub fn uncovered(&self, demand: &DemandTable) -> Vec<(ClassIdx, SubjectIdx)> {
        demand
            .requirements()
            .filter(|&(class, subject, quota)| {
                quota > 0 && self.qualified(subject, class).is_empty()
            })
            .map(|(class, subject, _)| (class, subject))
            .collect()
    }
}
