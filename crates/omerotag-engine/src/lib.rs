//! omerotag engine - tree walking, name matching, tag reconciliation and the run loop

pub mod evaluate;
pub mod memory;
pub mod names;
pub mod reconcile;
pub mod report;
pub mod runner;

pub use evaluate::{Evaluator, TagDecision};
pub use memory::{MemoryStore, Snapshot};
pub use names::{match_name, strip_extension};
pub use reconcile::{Reconciliation, TagCache, TagReconciler, DEFAULT_TAG_DESCRIPTION};
pub use report::DryRunReport;
pub use runner::{Engine, ObjectOutcome, RunMode, RunSummary};
