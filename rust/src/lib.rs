//! Weekly school timetable generation.
//!
//! A run goes through three stages:
//! 1. Pre-flight: the catalogue is validated and indexed ([`preflight::prepare`])
//! 2. Search: greedy placement plus bounded backtracking ([`scheduler::AssignmentEngine`])
//! 3. Regeneration: the scope's persisted rows are replaced in one
//!    transaction ([`regeneration::RegenerationManager`])
//!
//! Either the whole week is placed and persisted, or the run fails and the
//! previously persisted timetable stays as it was.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

pub mod catalogue;
pub mod config;
pub mod demand;
pub mod eligibility;
pub mod error;
pub mod interner;
pub mod logging;
pub mod models;
pub mod preflight;
pub mod regeneration;
pub mod scheduler;
pub mod sorting;
pub mod store;

pub use catalogue::{Catalogue, CatalogueError};
pub use config::{ConfigError, EngineConfig, GridConfig, PeriodClock, TimetableConfig};
pub use error::TimetableError;
pub use models::{
    Class, Demand, GenerationOutcome, ScheduleEntry, SearchStats, Shortfall, Subject, Teacher,
    TimeSlot, Timetable,
};
pub use regeneration::{RegenerationManager, RegenerationReport};
pub use store::{FileStore, LessonRow, MemoryStore, Scope, StoreError, TimetableStore};

/// Any failure of a full generate-and-persist run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Timetable(#[from] TimetableError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
}

impl RunError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::Timetable(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// What a run produced, for display.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub scope: String,
    pub entry_count: usize,
    /// Rows removed from the scope; `None` when nothing was persisted.
    pub replaced_count: Option<usize>,
    pub teacher_load: BTreeMap<String, usize>,
    pub stats: SearchStats,
}

impl RunSummary {
    pub fn new(scope: &Scope, outcome: &GenerationOutcome, replaced_count: Option<usize>) -> Self {
        Self {
            scope: scope.to_string(),
            entry_count: outcome.timetable.len(),
            replaced_count,
            teacher_load: outcome.timetable.teacher_load(),
            stats: outcome.stats.clone(),
        }
    }
}

/// Validate the catalogue and search for a complete timetable.
///
/// Nothing is persisted.
pub fn generate(
    catalogue: &Catalogue,
    config: &TimetableConfig,
) -> Result<GenerationOutcome, TimetableError> {
    let problem = preflight::prepare(catalogue, &config.grid)?;
    log_changes!(
        config.engine.verbosity,
        "Prepared {} classes, {} teachers, {} subjects over {} slots",
        problem.classes.len(),
        problem.teachers.len(),
        problem.subjects.len(),
        problem.slot_count()
    );
    scheduler::AssignmentEngine::new(&problem, &config.engine).run()
}

/// Generate a timetable and atomically replace `scope` in `store` with it.
///
/// The period clock is resolved before the search, so a bad clock never
/// costs a search and never touches the store.
pub fn regenerate_scope<S: TimetableStore + ?Sized>(
    store: &S,
    scope: &Scope,
    catalogue: &Catalogue,
    config: &TimetableConfig,
) -> Result<RunSummary, RunError> {
    let clock = config.period_clock()?;
    let outcome = generate(catalogue, config)?;
    let report = RegenerationManager::new(store, &clock).regenerate(scope, &outcome.timetable)?;
    Ok(RunSummary::new(scope, &outcome, Some(report.replaced)))
}
