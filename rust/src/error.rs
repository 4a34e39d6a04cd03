//! Error types for timetable generation.

use thiserror::Error;

use crate::models::{OverAllocation, Shortfall};

/// Errors that can end an engine run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimetableError {
    /// Structural catalogue problem, found before search starts.
    #[error("Configuration error: {}", .issues.join("; "))]
    Configuration { issues: Vec<String> },

    /// At least one class demands more weekly hours than the grid has slots.
    #[error("Over-allocated demand: {}", join_display(.classes))]
    OverAllocatedDemand { classes: Vec<OverAllocation> },

    /// Engine defect (double placement, negative demand). The run is aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The backtracking budget ran out with quotas still unmet.
    #[error("Infeasible schedule, unmet (class, subject, hours): {}", join_display(.shortfalls))]
    InfeasibleSchedule { shortfalls: Vec<Shortfall> },
}

impl TimetableError {
    pub(crate) fn configuration(issue: impl Into<String>) -> Self {
        Self::Configuration {
            issues: vec![issue.into()],
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Process exit status for operator tooling.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration { .. } => 2,
            Self::OverAllocatedDemand { .. } => 3,
            Self::InfeasibleSchedule { .. } => 4,
            // EX_SOFTWARE
            Self::InvariantViolation(_) => 70,
        }
    }

    /// Total missing hours across all shortfalls (0 for other variants).
    pub fn missing_hours(&self) -> u64 {
        match self {
            Self::InfeasibleSchedule { shortfalls } => {
                shortfalls.iter().map(|s| u64::from(s.missing)).sum()
            }
            _ => 0,
        }
    }
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
