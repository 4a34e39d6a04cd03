//! Logging macros for the timetable engine with verbosity level control.
//!
//! Events go through `tracing`; the verbosity gate is checked first so a
//! silent run never formats its arguments.
//! - 0: SILENT (only errors)
//! - 1: CHANGES (placements, undo steps, pass summaries)
//! - 2: CHECKS (class and subject consideration, pending cells)
//! - 3: DEBUG (full search internals)

/// Verbosity level constants.
pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Target used for the regeneration audit trail.
pub const AUDIT_TARGET: &str = "timetabler::audit";

/// Log at CHANGES level (verbosity >= 1).
///
/// Used for: lesson placements, backtracking undo steps, pass summaries.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHANGES {
            ::tracing::info!($($arg)*);
        }
    };
}

/// Log at CHECKS level (verbosity >= 2).
///
/// Used for: class ranking, subject consideration, pending cells.
#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_CHECKS {
            ::tracing::debug!($($arg)*);
        }
    };
}

/// Log at DEBUG level (verbosity >= 3).
///
/// Used for: ejection chain internals, candidate scans.
#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= $crate::logging::VERBOSITY_DEBUG {
            ::tracing::trace!($($arg)*);
        }
    };
}
