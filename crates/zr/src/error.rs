//! The top-level error type every command returns, per spec.md §7's error
//! kinds. `exit_code` maps each variant onto spec.md §6's exit-code table:
//! `0` success, `1` user-visible failure, `>=128` signal-terminated (handled
//! separately in `main.rs`, since a signal never surfaces as a `Result::Err`
//! here).

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("workspace root not found: no zr.toml in {0} or any parent directory")]
    WorkspaceRootNotFound(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("task {0:?} is not defined")]
    TaskNotFound(String),

    #[error("workflow {0:?} is not defined")]
    WorkflowNotFound(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] zr_graph::BuilderError),

    #[error("one or more tasks failed")]
    RunFailed,

    #[error("one or more workflow stages failed")]
    WorkflowFailed,

    #[error("git repository unavailable: {0}")]
    Vcs(#[from] zr_scm::ScmError),

    #[error("history store unavailable: {0}")]
    History(#[from] zr_history::HistoryError),

    #[error("cache store unavailable: {0}")]
    Cache(#[from] zr_cache::CacheError),

    #[error(transparent)]
    Format(#[from] crate::format::FormatError),

    #[error("failed to write {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Every non-signal failure this CLI can report exits `1` (spec.md §6);
    /// there is no finer-grained exit-code table to map into.
    pub fn exit_code(&self) -> i32 {
        1
    }
}
