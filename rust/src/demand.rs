//! Per-class weekly-hour quotas and their remaining counters.

use crate::error::TimetableError;
use crate::interner::{ClassIdx, SubjectIdx};

#[derive(Clone, Debug, PartialEq, Eq)]
struct Counter {
    subject: SubjectIdx,
    quota: u32,
    remaining: u32,
}

/// Remaining hours per `(class, subject)`.
///
/// Counters of a class are kept sorted by subject index. Subjects are
/// interned in code order, so index order doubles as the code tie-break.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DemandTable {
    per_class: Vec<Vec<Counter>>,
}

impl DemandTable {
    pub fn new(class_count: usize) -> Self {
        Self {
            per_class: vec![Vec::new(); class_count],
        }
    }

    /// Register the weekly quota of `subject` for `class`.
    pub fn add(
        &mut self,
        class: ClassIdx,
        subject: SubjectIdx,
        hours: u32,
    ) -> Result<(), TimetableError> {
        let counters = self.per_class.get_mut(class as usize).ok_or_else(|| {
            TimetableError::invariant(format!("demand for unknown class index {class}"))
        })?;
        match counters.binary_search_by_key(&subject, |c| c.subject) {
            Ok(_) => Err(TimetableError::configuration(format!(
                "duplicate demand for subject index {subject} in class index {class}"
            ))),
            Err(pos) => {
                counters.insert(
                    pos,
                    Counter {
                        subject,
                        quota: hours,
                        remaining: hours,
                    },
                );
                Ok(())
            }
        }
    }

    fn counter(&self, class: ClassIdx, subject: SubjectIdx) -> Option<&Counter> {
        let counters = self.per_class.get(class as usize)?;
        counters
            .binary_search_by_key(&subject, |c| c.subject)
            .ok()
            .map(|i| &counters[i])
    }

    fn counter_mut(
        &mut self,
        class: ClassIdx,
        subject: SubjectIdx,
    ) -> Result<&mut Counter, TimetableError> {
        let counters = self.per_class.get_mut(class as usize).ok_or_else(|| {
            TimetableError::invariant(format!("unknown class index {class}"))
        })?;
        match counters.binary_search_by_key(&subject, |c| c.subject) {
            Ok(i) => Ok(&mut counters[i]),
            Err(_) => Err(TimetableError::invariant(format!(
                "class index {class} has no demand for subject index {subject}"
            ))),
        }
    }

    pub fn quota(&self, class: ClassIdx, subject: SubjectIdx) -> u32 {
        self.counter(class, subject).map_or(0, |c| c.quota)
    }

    pub fn remaining(&self, class: ClassIdx, subject: SubjectIdx) -> u32 {
        self.counter(class, subject).map_or(0, |c| c.remaining)
    }

    /// Count one placed lesson against the quota.
    ///
    /// Returns the hours still open. Placing past the quota is an engine bug.
    pub fn decrement(&mut self, class: ClassIdx, subject: SubjectIdx) -> Result<u32, TimetableError> {
        let counter = self.counter_mut(class, subject)?;
        if counter.remaining == 0 {
            return Err(TimetableError::invariant(format!(
                "demand of class index {class} for subject index {subject} would go below zero"
            )));
        }
        counter.remaining -= 1;
        Ok(counter.remaining)
    }

    /// Give back one hour after a placement is undone.
    pub fn restore(&mut self, class: ClassIdx, subject: SubjectIdx) -> Result<u32, TimetableError> {
        let counter = self.counter_mut(class, subject)?;
        if counter.remaining >= counter.quota {
            return Err(TimetableError::invariant(format!(
                "demand of class index {class} for subject index {subject} would exceed its quota"
            )));
        }
        counter.remaining += 1;
        Ok(counter.remaining)
    }

    /// Subjects of `class` with hours left, most remaining first, ties by code.
    pub fn open_subjects(&self, class: ClassIdx) -> Vec<SubjectIdx> {
        let mut open: Vec<&Counter> = self
            .per_class
            .get(class as usize)
            .map(|counters| counters.iter().filter(|c| c.remaining > 0).collect())
            .unwrap_or_default();
        // Stable sort keeps subject order for equal remaining hours.
        open.sort_by(|a, b| b.remaining.cmp(&a.remaining));
        open.into_iter().map(|c| c.subject).collect()
    }

    /// Hours of `class` still unplaced. Summed wide: quotas are `u32` each.
    pub fn remaining_total(&self, class: ClassIdx) -> u64 {
        self.per_class.get(class as usize).map_or(0, |counters| {
            counters.iter().map(|c| u64::from(c.remaining)).sum()
        })
    }

    pub fn demanded_total(&self, class: ClassIdx) -> u64 {
        self.per_class.get(class as usize).map_or(0, |counters| {
            counters.iter().map(|c| u64::from(c.quota)).sum()
        })
    }

    pub fn is_satisfied(&self) -> bool {
        self.per_class
            .iter()
            .all(|counters| counters.iter().all(|c| c.remaining == 0))
    }

    /// `(class, subject, missing hours)` for every requirement still open.
    pub fn unmet(&self) -> Vec<(ClassIdx, SubjectIdx, u32)> {
        self.per_class
            .iter()
            .enumerate()
            .flat_map(|(class, counters)| {
                counters
                    .iter()
                    .filter(|c| c.remaining > 0)
                    .map(move |c| (class as ClassIdx, c.subject, c.remaining))
            })
            .collect()
    }

    /// All registered `(class, subject, quota)` triples.
    pub fn requirements(&self) -> impl Iterator<Item = (ClassIdx, SubjectIdx, u32)> + '_ {
        self.per_class
            .iter()
            .enumerate()
            .flat_map(|(class, counters)| {
                counters
                    .iter()
                    .map(move |c| (class as ClassIdx, c.subject, c.quota))
            })
    }
}
