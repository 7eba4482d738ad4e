use miette::Diagnostic;
use thiserror::Error;

/// A single semantic violation found during validation (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task name {0:?} is invalid: {1}")]
    BadTaskName(String, String),
    #[error("task {0:?} has an empty or whitespace-only command")]
    EmptyCommand(String),
    #[error("task {task:?} depends on unknown task {dep:?}")]
    UnknownDependency { task: String, dep: String },
    #[error("task {task:?} references unknown template {template:?}")]
    UnknownTemplate { task: String, template: String },
    #[error("workflow {workflow:?} stage references unknown task {task:?}")]
    UnknownWorkflowTask { workflow: String, task: String },
    #[error("workflow {workflow:?} stage {stage:?} redirects to unknown stage {target:?}")]
    UnknownRedirectTarget {
        workflow: String,
        stage: String,
        target: String,
    },
    #[error("task {task:?} matrix axis {axis:?} has no values")]
    EmptyMatrixAxis { task: String, axis: String },
    #[error("workflow {0:?} stage graph has a cycle: {}", .1.join(" -> "))]
    StageCycle(String, Vec<String>),
}

/// A non-fatal observation reported only under `validate --strict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    MissingDescription(String),
    ExplicitEmptyDeps(String),
    UnknownField { task: String, field: String },
}

#[derive(Debug, Error)]
#[error("configuration is invalid:\n{}", .0.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n"))]
pub struct ValidationErrors(pub Vec<ValidationError>);

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    #[diagnostic(help("check the TOML syntax near the reported location"))]
    Parse {
        path: String,
        message: String,
        #[label("{message}")]
        span: Option<miette::SourceSpan>,
        #[source_code]
        source_code: String,
    },
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("graph construction failed: {0}")]
    Graph(#[from] zr_graph::BuilderError),
}
