//! Resolves a flat task map into a DAG of Task Nodes grouped into parallel
//! levels (spec.md §4.5): template materialization, matrix expansion,
//! dependency resolution, cycle detection, transitive closure, and leveling.
//!
//! Grounded in `turborepo-lib`'s `engine/` module: the `Engine<Building>` /
//! `Engine<Built>` typestate and `petgraph`-backed task graph carry over
//! directly; template inheritance generalizes `engine/task_inheritance.rs`'s
//! `extends` chain resolution to a simpler one-level template reference.

mod builder;
mod matrix;
mod template;
mod types;

pub use builder::{BuilderError, Built, Building, Graph, GraphBuilder, TaskNode};
pub use types::{BackoffKind, CacheSpec, MaterializedTask, RawTask, RetryPolicy};
