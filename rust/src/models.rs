//! Core data types for timetable generation.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A subject in the catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    /// Stable code, used for deterministic tie-breaks.
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Weekly-hour quota of one subject for a class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demand {
    pub subject: String,
    pub hours: u32,
}

/// A class (student group) and its weekly demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: String,
    #[serde(default)]
    pub grade: u8,
    #[serde(default)]
    pub demands: Vec<Demand>,
}

/// A subject a teacher may teach, restricted to the listed classes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub subject: String,
    pub classes: Vec<String>,
}

/// A teacher with explicit per-class qualifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qualifications: Vec<Qualification>,
    /// Slots where the teacher cannot be scheduled.
    #[serde(default)]
    pub unavailable: Vec<TimeSlot>,
}

/// One `(day, period)` coordinate of the weekly grid.
///
/// `day` 0 is Monday and `period` 0 is the first lesson of the day. The
/// derived ordering is day-major, which is the grid iteration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub day: u8,
    pub period: u8,
}

impl TimeSlot {
    pub fn new(day: u8, period: u8) -> Self {
        Self { day, period }
    }

    /// Calendar weekday of this slot. Days past Sunday wrap around.
    pub fn weekday(&self) -> Weekday {
        match self.day % 7 {
            0 => Weekday::Mon,
            1 => Weekday::Tue,
            2 => Weekday::Wed,
            3 => Weekday::Thu,
            4 => Weekday::Fri,
            5 => Weekday::Sat,
            _ => Weekday::Sun,
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} P{}", self.weekday(), self.period + 1)
    }
}

/// One lesson: a class taught a subject by a teacher in a slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub class_id: String,
    pub subject: String,
    pub teacher_id: String,
    pub slot: TimeSlot,
}

/// The complete set of entries produced by one engine run.
///
/// Only the assignment engine builds timetables, after verifying that no
/// class or teacher is double-booked, every quota is met exactly and every
/// teacher is eligible for the lessons they hold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Timetable {
    entries: Vec<ScheduleEntry>,
}

impl Timetable {
    /// Entries are stored sorted by `(slot, class)`.
    pub(crate) fn from_verified(mut entries: Vec<ScheduleEntry>) -> Self {
        entries.sort_by(|a, b| {
            a.slot
                .cmp(&b.slot)
                .then_with(|| a.class_id.cmp(&b.class_id))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lessons per teacher, keyed by teacher identifier.
    pub fn teacher_load(&self) -> BTreeMap<String, usize> {
        let mut load = BTreeMap::new();
        for entry in &self.entries {
            *load.entry(entry.teacher_id.clone()).or_insert(0) += 1;
        }
        load
    }

    /// Entries of one class in slot order.
    pub fn for_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a ScheduleEntry> {
        self.entries.iter().filter(move |e| e.class_id == class_id)
    }
}

/// A requirement the engine could not satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub class_id: String,
    pub subject: String,
    /// Hours still missing from the quota.
    pub missing: u32,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.class_id, self.subject, self.missing)
    }
}

/// A class whose weekly demand cannot fit in the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OverAllocation {
    pub class_id: String,
    pub demanded: u64,
    pub available: u64,
}

impl fmt::Display for OverAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} demands {}h but the week has {} slots",
            self.class_id, self.demanded, self.available
        )
    }
}

/// Search statistics reported alongside a timetable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    /// `(class, slot)` cells left empty by the first pass while the class still had demand.
    pub pending_cells: usize,
    /// Requirements still unmet after the first pass.
    pub stranded_after_pass: usize,
    /// Undo operations spent by backtracking.
    pub backtrack_steps: usize,
    pub backtrack_budget: usize,
}

/// Result of a successful engine run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub timetable: Timetable,
    pub stats: SearchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(class_id: &str, teacher_id: &str, day: u8, period: u8) -> ScheduleEntry {
        ScheduleEntry {
            class_id: class_id.to_string(),
            subject: "MATH".to_string(),
            teacher_id: teacher_id.to_string(),
            slot: TimeSlot::new(day, period),
        }
    }

    #[test]
    fn test_slot_order_is_day_major() {
        let mut slots = vec![
            TimeSlot::new(1, 0),
            TimeSlot::new(0, 6),
            TimeSlot::new(0, 1),
        ];
        slots.sort();
        assert_eq!(
            slots,
            vec![TimeSlot::new(0, 1), TimeSlot::new(0, 6), TimeSlot::new(1, 0)]
        );
    }

    #[test]
    fn test_slot_display() {
        assert_eq!(TimeSlot::new(0, 0).to_string(), "Mon P1");
        assert_eq!(TimeSlot::new(4, 6).to_string(), "Fri P7");
        assert_eq!(TimeSlot::new(2, 0).weekday(), Weekday::Wed);
    }

    #[test]
    fn test_timetable_sorted_and_load() {
        let timetable = Timetable::from_verified(vec![
            entry("7B", "t2", 0, 1),
            entry("7A", "t1", 0, 1),
            entry("7A", "t1", 0, 0),
        ]);

        let order: Vec<(&str, TimeSlot)> = timetable
            .entries()
            .iter()
            .map(|e| (e.class_id.as_str(), e.slot))
            .collect();
        assert_eq!(
            order,
            vec![
                ("7A", TimeSlot::new(0, 0)),
                ("7A", TimeSlot::new(0, 1)),
                ("7B", TimeSlot::new(0, 1)),
            ]
        );

        let load = timetable.teacher_load();
        assert_eq!(load.get("t1"), Some(&2));
        assert_eq!(load.get("t2"), Some(&1));
        assert_eq!(timetable.for_class("7B").count(), 1);
    }
}
