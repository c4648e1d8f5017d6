//! The three operations: dump, restore and compare.
//!
//! Each walks its entries in order, one command at a time, and records a
//! per-entry outcome instead of failing the run. Only fatal errors (log or
//! file trouble) stop early.

pub mod compare;
pub mod dump;
pub mod restore;

pub use compare::{compare, compare_values, format_delta, CompareOutcome, CompareSummary, Comparison};
pub use dump::{dump, DumpOutcome, DumpSummary};
pub use restore::{restore, RestoreSummary};
