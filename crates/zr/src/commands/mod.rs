//! One module per subcommand (spec.md §6), plus `common` for wiring shared
//! across several of them (cache/history store selection, run/workflow
//! summaries).

pub mod affected;
mod common;
pub mod cache;
pub mod estimate;
pub mod run;
pub mod validate;
pub mod workflow;
