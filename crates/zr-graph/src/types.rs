//! The task shapes the Graph Builder consumes and produces. `RawTask` is the
//! pre-expansion view a config loader hands in (one per declared task and one
//! per declared template, same shape); `MaterializedTask` is the
//! fully-resolved, per-node view the builder hands back after template
//! merge, matrix expansion, and dependency resolution.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use zr_task_id::{TaskName, TaskNodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackoffKind {
    #[default]
    None,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub count: u32,
    pub backoff: BackoffKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheSpec {
    pub enabled: bool,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub key: Option<String>,
}

/// A task or template as declared in configuration, before template merge
/// and matrix expansion. Every field is `Option`/absent-by-default so the
/// merge step in `template.rs` can tell "not set" apart from "set to the
/// default value".
#[derive(Debug, Clone, Default)]
pub struct RawTask {
    pub description: Option<String>,
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub deps: Option<Vec<String>>,
    pub deps_serial: Option<Vec<String>>,
    pub env: Option<BTreeMap<String, String>>,
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetryPolicy>,
    pub allow_failure: Option<bool>,
    pub cache: Option<CacheSpec>,
    pub max_concurrent: Option<u32>,
    pub max_cpu: Option<u32>,
    pub max_memory: Option<u64>,
    pub tags: Option<BTreeSet<String>>,
    pub toolchain: Option<Vec<String>>,
    pub condition: Option<String>,
    pub matrix: Option<BTreeMap<String, Vec<String>>>,
    pub template: Option<String>,
    pub template_params: Option<BTreeMap<String, String>>,
}

/// A fully-resolved Task Node, one per (task name, matrix coordinate) pair,
/// per spec.md §3's Task Node definition. Consumed by the Fingerprinter and
/// Scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializedTask {
    pub id: TaskNodeId,
    pub description: Option<String>,
    pub cmd: Option<String>,
    pub cwd: Option<String>,
    pub deps: Vec<TaskName>,
    pub deps_serial: Vec<TaskName>,
    pub env: BTreeMap<String, String>,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    pub allow_failure: bool,
    pub cache: CacheSpec,
    pub max_concurrent: Option<u32>,
    pub max_cpu: Option<u32>,
    pub max_memory: Option<u64>,
    pub tags: BTreeSet<String>,
    pub toolchain: Vec<String>,
    pub condition: Option<String>,
    pub template_params: BTreeMap<String, String>,
}
