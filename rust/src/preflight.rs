//! Pre-flight pass: turn a catalogue into an indexed problem, or reject it.
//!
//! All checks run before the search starts:
//! 1. Structural checks (duplicate identifiers, unknown references, slots outside the grid)
//! 2. Per-class arithmetic (total weekly hours vs. slots in the week)
//! 3. Coverage (every demanded pair has at least one qualified teacher)

use rustc_hash::FxHashSet;

use crate::catalogue::Catalogue;
use crate::config::GridConfig;
use crate::demand::DemandTable;
use crate::eligibility::EligibilityRegistry;
use crate::error::TimetableError;
use crate::interner::{IdInterner, TeacherIdx};
use crate::models::{OverAllocation, TimeSlot};

use crate::scheduler::SlotGrid;

/// Indexed, validated input of one engine run.
///
/// Classes and teachers are interned in identifier order and subjects in
/// code order, so index order is the deterministic tie-break order.
#[derive(Clone, Debug)]
pub struct Problem {
    pub classes: IdInterner,
    pub teachers: IdInterner,
    pub subjects: IdInterner,
    pub demand: DemandTable,
    pub eligibility: EligibilityRegistry,
    pub slots: Vec<TimeSlot>,
    pub unavailable: Vec<(TeacherIdx, TimeSlot)>,
}

impl Problem {
    /// Fresh occupancy grid with declared teacher unavailability applied.
    pub fn new_grid(&self) -> Result<SlotGrid, TimetableError> {
        let mut grid = SlotGrid::new(self.slots.clone(), self.teachers.len(), self.classes.len());
        for &(teacher, slot) in &self.unavailable {
            let index = grid.index_of(slot).ok_or_else(|| {
                TimetableError::invariant(format!("unavailable slot {slot} outside the grid"))
            })?;
            grid.block_teacher(teacher, index)?;
        }
        Ok(grid)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

fn check_identifiers<'a>(kind: &str, ids: impl Iterator<Item = &'a str>, issues: &mut Vec<String>) {
    let mut seen = FxHashSet::default();
    for id in ids {
        if id.trim().is_empty() {
            issues.push(format!("{kind} with an empty identifier"));
        } else if !seen.insert(id) {
            issues.push(format!("duplicate {kind} identifier {id:?}"));
        }
    }
}

/// Validate `catalogue` against `grid` and build the indexed problem.
///
/// # Errors
/// * `Configuration` for structural problems or demand no teacher can cover
/// * `OverAllocatedDemand` when a class needs more hours than the week has slots
pub fn prepare(catalogue: &Catalogue, grid: &GridConfig) -> Result<Problem, TimetableError> {
    let mut issues = Vec::new();

    check_identifiers(
        "subject",
        catalogue.subjects.iter().map(|s| s.code.as_str()),
        &mut issues,
    );
    check_identifiers(
        "class",
        catalogue.classes.iter().map(|c| c.id.as_str()),
        &mut issues,
    );
    check_identifiers(
        "teacher",
        catalogue.teachers.iter().map(|t| t.id.as_str()),
        &mut issues,
    );

    let subjects = IdInterner::sorted(catalogue.subjects.iter().map(|s| s.code.as_str()));
    let classes = IdInterner::sorted(catalogue.classes.iter().map(|c| c.id.as_str()));
    let teachers = IdInterner::sorted(catalogue.teachers.iter().map(|t| t.id.as_str()));

    let mut demand = DemandTable::new(classes.len());
    for class in &catalogue.classes {
        let Some(class_idx) = classes.get(&class.id) else {
            continue;
        };
        for d in &class.demands {
            match subjects.get(&d.subject) {
                None => issues.push(format!(
                    "class {:?} demands unknown subject {:?}",
                    class.id, d.subject
                )),
                Some(subject_idx) => {
                    if demand.add(class_idx, subject_idx, d.hours).is_err() {
                        issues.push(format!(
                            "class {:?} lists subject {:?} more than once",
                            class.id, d.subject
                        ));
                    }
                }
            }
        }
    }

    let mut eligibility = EligibilityRegistry::new();
    let mut unavailable = Vec::new();
    for teacher in &catalogue.teachers {
        let Some(teacher_idx) = teachers.get(&teacher.id) else {
            continue;
        };
        for q in &teacher.qualifications {
            let Some(subject_idx) = subjects.get(&q.subject) else {
                issues.push(format!(
                    "teacher {:?} is qualified for unknown subject {:?}",
                    teacher.id, q.subject
                ));
                continue;
            };
            for class_id in &q.classes {
                match classes.get(class_id) {
                    Some(class_idx) => eligibility.grant(teacher_idx, subject_idx, class_idx),
                    None => issues.push(format!(
                        "teacher {:?} is qualified for {:?} in unknown class {:?}",
                        teacher.id, q.subject, class_id
                    )),
                }
            }
        }
        for &slot in &teacher.unavailable {
            if grid.contains(slot) {
                unavailable.push((teacher_idx, slot));
            } else {
                issues.push(format!(
                    "teacher {:?} is unavailable at {slot}, which is outside the grid",
                    teacher.id
                ));
            }
        }
    }

    if !issues.is_empty() {
        return Err(TimetableError::Configuration { issues });
    }

    let available = grid.slot_count() as u64;
    let over: Vec<OverAllocation> = classes
        .iter()
        .filter_map(|(class_idx, class_id)| {
            let demanded = demand.demanded_total(class_idx);
            (demanded > available).then(|| OverAllocation {
                class_id: class_id.to_string(),
                demanded,
                available,
            })
        })
        .collect();
    if !over.is_empty() {
        return Err(TimetableError::OverAllocatedDemand { classes: over });
    }

    let uncovered = eligibility.uncovered(&demand);
    if !uncovered.is_empty() {
        let issues = uncovered
            .into_iter()
            .map(|(class_idx, subject_idx)| {
                format!(
                    "no teacher is qualified for {:?} in class {:?}",
                    subjects.name(subject_idx),
                    classes.name(class_idx)
                )
            })
            .collect();
        return Err(TimetableError::Configuration { issues });
    }

    Ok(Problem {
        classes,
        teachers,
        subjects,
        demand,
        eligibility,
        slots: grid.slots(),
        unavailable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Class, Demand, Qualification, Subject, Teacher};

    fn subject(code: &str) -> Subject {
        Subject {
            code: code.to_string(),
            name: String::new(),
        }
    }

    fn class(id: &str, demands: &[(&str, u32)]) -> Class {
        Class {
            id: id.to_string(),
            grade: 7,
            demands: demands
                .iter()
                .map(|(s, h)| Demand {
                    subject: s.to_string(),
                    hours: *h,
                })
                .collect(),
        }
    }

    fn teacher(id: &str, quals: &[(&str, &[&str])]) -> Teacher {
        Teacher {
            id: id.to_string(),
            name: String::new(),
            qualifications: quals
                .iter()
                .map(|(s, classes)| Qualification {
                    subject: s.to_string(),
                    classes: classes.iter().map(|c| c.to_string()).collect(),
                })
                .collect(),
            unavailable: vec![],
        }
    }

    #[test]
    fn test_prepare_interns_in_sorted_order() {
        let catalogue = Catalogue {
            subjects: vec![subject("MATH"), subject("ART")],
            classes: vec![class("7B", &[("MATH", 2)]), class("7A", &[("ART", 1)])],
            teachers: vec![
                teacher("t2", &[("MATH", &["7B"])]),
                teacher("t1", &[("ART", &["7A"])]),
            ],
        };

        let problem = prepare(&catalogue, &GridConfig::new(1, 4)).unwrap();
        assert_eq!(problem.subjects.get("ART"), Some(0));
        assert_eq!(problem.classes.get("7A"), Some(0));
        assert_eq!(problem.teachers.get("t1"), Some(0));
        assert_eq!(problem.demand.quota(1, 1), 2);
        assert!(problem.eligibility.is_eligible(1, 1, 1));
        assert_eq!(problem.slot_count(), 4);
    }

    #[test]
    fn test_structural_issues_are_collected() {
        let mut bad = teacher("t1", &[("MATH", &["7A", "9Z"]), ("GEO", &["7A"])]);
        bad.unavailable = vec![TimeSlot::new(6, 0)];
        let catalogue = Catalogue {
            subjects: vec![subject("MATH"), subject("MATH")],
            classes: vec![class("7A", &[("MATH", 1), ("MATH", 1), ("BIO", 1)])],
            teachers: vec![bad],
        };

        let err = prepare(&catalogue, &GridConfig::new(5, 7)).unwrap_err();
        match err {
            TimetableError::Configuration { issues } => {
                assert_eq!(issues.len(), 6, "{issues:?}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_over_allocation_is_reported_before_coverage() {
        let catalogue = Catalogue {
            subjects: vec![subject("MATH")],
            classes: vec![class("7A", &[("MATH", 6)]), class("7B", &[("MATH", 2)])],
            teachers: vec![],
        };

        let err = prepare(&catalogue, &GridConfig::new(1, 5)).unwrap_err();
        assert_eq!(
            err,
            TimetableError::OverAllocatedDemand {
                classes: vec![OverAllocation {
                    class_id: "7A".to_string(),
                    demanded: 6,
                    available: 5,
                }]
            }
        );
    }

    #[test]
    fn test_weekly_total_beyond_u32_is_over_allocation() {
        let catalogue = Catalogue {
            subjects: vec![subject("ART"), subject("MATH")],
            classes: vec![class("7A", &[("MATH", u32::MAX), ("ART", 2)])],
            teachers: vec![teacher("t1", &[("MATH", &["7A"]), ("ART", &["7A"])])],
        };

        let err = prepare(&catalogue, &GridConfig::new(1, 5)).unwrap_err();
        assert_eq!(
            err,
            TimetableError::OverAllocatedDemand {
                classes: vec![OverAllocation {
                    class_id: "7A".to_string(),
                    demanded: u64::from(u32::MAX) + 2,
                    available: 5,
                }]
            }
        );
    }

    #[test]
    fn test_uncovered_demand_is_configuration_error() {
        let catalogue = Catalogue {
            subjects: vec![subject("MATH")],
            classes: vec![class("7A", &[("MATH", 2)]), class("7B", &[("MATH", 2)])],
            teachers: vec![teacher("t1", &[("MATH", &["7A"])])],
        };

        let err = prepare(&catalogue, &GridConfig::new(1, 5)).unwrap_err();
        assert_eq!(
            err,
            TimetableError::Configuration {
                issues: vec!["no teacher is qualified for \"MATH\" in class \"7B\"".to_string()]
            }
        );
    }

    #[test]
    fn test_unavailable_slots_block_grid() {
        let mut t = teacher("t1", &[("MATH", &["7A"])]);
        t.unavailable = vec![TimeSlot::new(0, 1)];
        let catalogue = Catalogue {
            subjects: vec![subject("MATH")],
            classes: vec![class("7A", &[("MATH", 1)])],
            teachers: vec![t],
        };

        let problem = prepare(&catalogue, &GridConfig::new(1, 3)).unwrap();
        let grid = problem.new_grid().unwrap();
        assert!(grid.is_teacher_free(0, 0));
        assert!(!grid.is_teacher_free(0, 1));
    }
}
