//! Weekly timetable search.
//!
//! A single greedy pass walks the grid slot by slot, filling each slot with
//! the most constrained class first. Requirements it strands are handed to a
//! bounded backtracking repair built on ejection chains.

mod backtrack;
mod core;
mod grid;
mod state;

#[cfg(test)]
mod property_tests;

pub use backtrack::Budget;
pub use core::AssignmentEngine;
pub use grid::SlotGrid;
pub use state::{Placement, SearchState};
