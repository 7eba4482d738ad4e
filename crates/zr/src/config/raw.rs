//! The directly-deserialized view of a `zr.toml` file: every field optional,
//! nothing validated or defaulted yet. Grounded in `turbo_json/raw.rs`'s
//! `RawTurboJson`, generalized from `turbo.json`'s JSON/JSONC shape to our
//! TOML one and from a package-task pipeline to a flat task table.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub workspace: Option<RawWorkspace>,
    #[serde(default)]
    pub tasks: BTreeMap<String, RawTaskToml>,
    #[serde(default)]
    pub templates: BTreeMap<String, RawTaskToml>,
    #[serde(default)]
    pub cache: Option<RawCacheConfig>,
    #[serde(default)]
    pub workflows: BTreeMap<String, RawWorkflow>,
    #[serde(default)]
    pub profiles: BTreeMap<String, RawProfile>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Recognized but otherwise inert: consumed by the out-of-scope
    /// schedule-persistence/upgrade subsystems. We only have to accept
    /// well-formed TOML here, not interpret it.
    #[serde(default)]
    pub versioning: Option<toml::Value>,
    #[serde(default)]
    pub schedules: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawWorkspace {
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawTaskToml {
    pub cmd: Option<String>,
    pub description: Option<String>,
    pub cwd: Option<String>,
    #[serde(default)]
    pub deps: Option<Vec<String>>,
    #[serde(default)]
    pub deps_serial: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    pub timeout: Option<u64>,
    pub retry: Option<RawRetry>,
    pub allow_failure: Option<bool>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    pub max_concurrent: Option<u32>,
    pub max_cpu: Option<u32>,
    pub max_memory: Option<u64>,
    pub condition: Option<String>,
    #[serde(default)]
    pub matrix: Option<BTreeMap<String, Vec<String>>>,
    pub template: Option<String>,
    #[serde(default)]
    pub template_params: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub toolchain: Option<Vec<String>>,
    #[serde(default)]
    pub cache: Option<RawCacheSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawRetry {
    pub count: u32,
    #[serde(default)]
    pub backoff: RawBackoff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawBackoff {
    #[default]
    None,
    Linear,
    Exponential,
}

/// `cache` is either a bare boolean or a table, per spec.md §6.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawCacheSpec {
    Enabled(bool),
    Table {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        inputs: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
        #[serde(default)]
        key: Option<String>,
    },
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawCacheConfig {
    pub enabled: Option<bool>,
    pub local_dir: Option<String>,
    pub remote: Option<RawRemoteCache>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawRemoteCache {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawWorkflow {
    #[serde(default)]
    pub stages: Vec<RawStage>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawStage {
    pub name: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    pub approval: Option<bool>,
    pub fail_fast: Option<bool>,
    pub condition: Option<String>,
    pub on_failure: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct RawProfile {
    #[serde(default)]
    pub cache_enabled: Option<bool>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}
