use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use crate::catalogue::Catalogue;
use crate::config::{EngineConfig, GridConfig};
use crate::error::TimetableError;
use crate::models::{Class, Demand, GenerationOutcome, Qualification, Subject, Teacher, TimeSlot};
use crate::preflight::prepare;

use super::AssignmentEngine;

#[derive(Clone, Debug)]
struct Input {
    catalogue: Catalogue,
    grid: GridConfig,
}

#[allow(clippy::too_many_arguments)]
fn build(
    days: u8,
    periods: u8,
    n_classes: usize,
    n_subjects: usize,
    n_teachers: usize,
    hours: Vec<u32>,
    quals: Vec<bool>,
    away: Vec<bool>,
) -> Input {
    let subjects = (0..n_subjects)
        .map(|s| Subject {
            code: format!("S{s}"),
            name: String::new(),
        })
        .collect();
    let classes = (0..n_classes)
        .map(|c| Class {
            id: format!("C{c}"),
            grade: 7,
            demands: (0..n_subjects)
                .map(|s| Demand {
                    subject: format!("S{s}"),
                    hours: hours[c * n_subjects + s],
                })
                .collect(),
        })
        .collect();
    let slots = GridConfig::new(days, periods).slots();
    let teachers = (0..n_teachers)
        .map(|t| Teacher {
            id: format!("T{t}"),
            name: String::new(),
            qualifications: (0..n_subjects)
                .map(|s| Qualification {
                    subject: format!("S{s}"),
                    classes: (0..n_classes)
                        .filter(|c| quals[(t * n_subjects + s) * n_classes + c])
                        .map(|c| format!("C{c}"))
                        .collect(),
                })
                .collect(),
            unavailable: slots
                .iter()
                .enumerate()
                .filter(|(i, _)| away[t * slots.len() + i])
                .map(|(_, slot)| *slot)
                .collect(),
        })
        .collect();

    Input {
        catalogue: Catalogue {
            subjects,
            classes,
            teachers,
        },
        grid: GridConfig::new(days, periods),
    }
}

fn arb_input() -> impl Strategy<Value = Input> {
    (1u8..=2, 2u8..=5, 1usize..=3, 1usize..=3, 1usize..=3).prop_flat_map(
        |(days, periods, n_classes, n_subjects, n_teachers)| {
            let n_slots = days as usize * periods as usize;
            (
                prop::collection::vec(0u32..=2, n_classes * n_subjects),
                prop::collection::vec(prop::bool::weighted(0.6), n_teachers * n_subjects * n_classes),
                prop::collection::vec(prop::bool::weighted(0.15), n_teachers * n_slots),
            )
                .prop_map(move |(hours, quals, away)| {
                    build(
                        days, periods, n_classes, n_subjects, n_teachers, hours, quals, away,
                    )
                })
        },
    )
}

/// One day of at most four periods and at most six lessons: small enough to
/// solve by brute force.
fn arb_small_input() -> impl Strategy<Value = Input> {
    (2u8..=4, 1usize..=3, 1usize..=2, 1usize..=3).prop_flat_map(
        |(periods, n_classes, n_subjects, n_teachers)| {
            let n_slots = periods as usize;
            (
                prop::collection::vec(0u32..=1, n_classes * n_subjects),
                prop::collection::vec(prop::bool::weighted(0.5), n_teachers * n_subjects * n_classes),
                prop::collection::vec(prop::bool::weighted(0.25), n_teachers * n_slots),
            )
                .prop_map(move |(hours, quals, away)| {
                    build(1, periods, n_classes, n_subjects, n_teachers, hours, quals, away)
                })
        },
    )
}

fn run(input: &Input) -> Result<GenerationOutcome, TimetableError> {
    run_with(input, &EngineConfig::default())
}

fn run_with(input: &Input, config: &EngineConfig) -> Result<GenerationOutcome, TimetableError> {
    let problem = prepare(&input.catalogue, &input.grid)?;
    AssignmentEngine::new(&problem, config).run()
}

/// Reference solver: tries every (slot, teacher) for every demanded hour.
fn solvable(input: &Input) -> bool {
    let lessons: Vec<(&str, &str)> = input
        .catalogue
        .classes
        .iter()
        .flat_map(|class| {
            class.demands.iter().flat_map(move |d| {
                (0..d.hours).map(move |_| (class.id.as_str(), d.subject.as_str()))
            })
        })
        .collect();
    let slots = input.grid.slots();
    fill(input, &slots, &lessons, &mut HashSet::new(), &mut HashSet::new())
}

fn fill<'a>(
    input: &'a Input,
    slots: &[TimeSlot],
    lessons: &[(&'a str, &'a str)],
    classes_busy: &mut HashSet<(&'a str, TimeSlot)>,
    teachers_busy: &mut HashSet<(&'a str, TimeSlot)>,
) -> bool {
    let Some((&(class_id, subject), rest)) = lessons.split_first() else {
        return true;
    };
    for &slot in slots {
        if classes_busy.contains(&(class_id, slot)) {
            continue;
        }
        for teacher in &input.catalogue.teachers {
            let qualified = teacher
                .qualifications
                .iter()
                .any(|q| q.subject == subject && q.classes.iter().any(|c| c == class_id));
            if !qualified
                || teacher.unavailable.contains(&slot)
                || teachers_busy.contains(&(teacher.id.as_str(), slot))
            {
                continue;
            }
            classes_busy.insert((class_id, slot));
            teachers_busy.insert((teacher.id.as_str(), slot));
            if fill(input, slots, rest, classes_busy, teachers_busy) {
                return true;
            }
            classes_busy.remove(&(class_id, slot));
            teachers_busy.remove(&(teacher.id.as_str(), slot));
        }
    }
    false
}

fn check_timetable(input: &Input, outcome: &GenerationOutcome) -> Result<(), TestCaseError> {
    let mut class_cells = HashSet::new();
    let mut teacher_cells = HashSet::new();
    let mut counts: HashMap<(&str, &str), u32> = HashMap::new();

    for e in outcome.timetable.entries() {
        prop_assert!(class_cells.insert((e.class_id.as_str(), e.slot)));
        prop_assert!(teacher_cells.insert((e.teacher_id.as_str(), e.slot)));
        *counts.entry((e.class_id.as_str(), e.subject.as_str())).or_insert(0) += 1;

        let teacher = input
            .catalogue
            .teachers
            .iter()
            .find(|t| t.id == e.teacher_id)
            .ok_or_else(|| TestCaseError::fail("unknown teacher"))?;
        prop_assert!(teacher
            .qualifications
            .iter()
            .any(|q| q.subject == e.subject && q.classes.contains(&e.class_id)));
        prop_assert!(!teacher.unavailable.contains(&e.slot));
        prop_assert!(input.grid.contains(e.slot));
    }

    for class in &input.catalogue.classes {
        for d in &class.demands {
            let placed = counts
                .get(&(class.id.as_str(), d.subject.as_str()))
                .copied()
                .unwrap_or(0);
            prop_assert_eq!(placed, d.hours);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_outcome_respects_all_constraints(input in arb_input()) {
        match run(&input) {
            Ok(outcome) => check_timetable(&input, &outcome)?,
            Err(TimetableError::InfeasibleSchedule { shortfalls }) => {
                prop_assert!(!shortfalls.is_empty());
                prop_assert!(shortfalls.iter().all(|s| s.missing > 0));
            }
            Err(TimetableError::InvariantViolation(msg)) => {
                return Err(TestCaseError::fail(msg));
            }
            Err(_) => {}
        }
    }

    #[test]
    fn prop_small_solvable_weeks_are_always_found(input in arb_small_input()) {
        let config = EngineConfig {
            backtrack_budget: Some(1_000_000),
            ..EngineConfig::default()
        };
        let result = run_with(&input, &config);
        if solvable(&input) {
            prop_assert!(result.is_ok(), "engine failed on a solvable week: {:?}", result.as_ref().err());
        }
        if let Ok(outcome) = &result {
            check_timetable(&input, outcome)?;
        }
    }

    #[test]
    fn prop_runs_are_deterministic(input in arb_input()) {
        let first = run(&input).map(|o| serde_json::to_string(&o.timetable).unwrap_or_default());
        let second = run(&input).map(|o| serde_json::to_string(&o.timetable).unwrap_or_default());
        prop_assert_eq!(first, second);
    }
}

#[test]
fn test_one_slot_per_demanded_hour_fills_the_week() {
    // Every class demands exactly the week; a dedicated teacher per class.
    let input = build(1, 3, 2, 1, 2, vec![3, 3], vec![true, false, false, true], vec![false; 6]);
    let outcome = run(&input).unwrap();
    check_timetable(&input, &outcome).unwrap();
    assert_eq!(outcome.timetable.len(), 6);
    let slots: HashSet<TimeSlot> = outcome.timetable.entries().iter().map(|e| e.slot).collect();
    assert_eq!(slots.len(), 3);
}

#[test]
fn test_two_independent_conflicts_are_both_cleared() {
    // Two copies of one conflict on disjoint classes and teachers. C0 S0 and
    // C2 S0 can only use the first period, where T0 and T3 are busy and the
    // class already has S1.
    let (n_classes, n_subjects, n_teachers) = (4, 2, 6);
    let qual = |t: usize, s: usize, c: usize| (t * n_subjects + s) * n_classes + c;
    let mut quals = vec![false; n_teachers * n_subjects * n_classes];
    for (t, s, c) in [
        (0, 0, 0),
        (0, 0, 1),
        (0, 1, 0),
        (0, 1, 1),
        (1, 1, 0),
        (2, 0, 1),
        (2, 1, 0),
        (2, 1, 1),
    ] {
        quals[qual(t, s, c)] = true;
        quals[qual(t + 3, s, c + 2)] = true;
    }
    let mut away = vec![false; n_teachers * 2];
    away[1] = true;
    away[3 * 2 + 1] = true;
    let hours = vec![1, 1, 0, 1, 1, 1, 0, 1];
    let input = build(1, 2, n_classes, n_subjects, n_teachers, hours, quals, away);

    let outcome = run(&input).unwrap();
    check_timetable(&input, &outcome).unwrap();
    assert_eq!(outcome.stats.stranded_after_pass, 2);
    assert_eq!(outcome.stats.pending_cells, 2);
    assert_eq!(outcome.stats.backtrack_steps, 2);
    assert_eq!(outcome.timetable.len(), 6);

    for (class_id, teacher_id) in [("C0", "T0"), ("C2", "T3")] {
        let lesson = outcome
            .timetable
            .entries()
            .iter()
            .find(|e| e.class_id == class_id && e.subject == "S0")
            .unwrap();
        assert_eq!(lesson.slot, TimeSlot::new(0, 0));
        assert_eq!(lesson.teacher_id, teacher_id);
    }
}
