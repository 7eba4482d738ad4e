//! The History Store, per spec.md §4.10: an append-only log of Run Records
//! under `<root>/.zr/history/`, plus a duration estimator over it.
//!
//! Grounded in `run/summary/` (`task.rs`, `execution.rs`, `duration.rs`),
//! which model a single run's per-task records and duration bookkeeping;
//! generalized here into a durable, cross-run log that outlives any one
//! invocation. `chrono`'s calendar types aren't needed for a monotonic
//! append-only log, so timestamps are raw Unix milliseconds instead.

mod error;
mod estimate;
mod record;
mod store;

pub use error::HistoryError;
pub use estimate::{estimate, DurationEstimate, DEFAULT_LIMIT};
pub use record::{RunRecord, RunStatus};
pub use store::HistoryStore;
