//! Spawns a task's command via the platform shell and captures its output,
//! per spec.md §4.7. Grounded in `process/child.rs`'s `ChildHandle` actor
//! shape, trimmed of its PTY backend (spec.md's Non-goals exclude
//! interactive TUI rendering, so only buffered stdout/stderr capture is
//! needed) and its command builder generalized from a fixed program+args
//! pair to the single `cmd` string spec.md's Task Node carries.

mod cancel;
mod child;
mod command;

pub use cancel::CancellationToken;
pub use child::{Child, ChildExit, RunOutcome};
pub use command::Command;
