//! Merges layered [`RawConfig`]s into the fully-resolved view the rest of the
//! engine consumes: a flat task/template map (handed to
//! [`zr_graph::GraphBuilder`]), a workflow table, and cache/env settings.
//!
//! Grounded in `turbo_json/processed.rs`'s raw-to-resolved step, generalized
//! from `extends`-chain merging to the precedence chain of spec.md §4.1:
//! defaults -> workspace root -> active member -> profile -> CLI overrides.
//! "Mappings merge key-wise; sequences replace" (spec.md §4.1) is applied at
//! the field level within a task definition: a higher-precedence layer
//! overrides only the fields it actually sets.

use std::collections::BTreeMap;
use std::path::PathBuf;

use zr_graph::{BackoffKind, CacheSpec, RawTask, RetryPolicy};
use zr_task_id::{MemberName, TaskName};

use super::raw::{
    RawBackoff, RawCacheConfig, RawCacheSpec, RawConfig, RawProfile, RawStage, RawTaskToml,
    RawWorkflow,
};

#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    pub tasks: Vec<String>,
    pub approval: bool,
    pub fail_fast: bool,
    pub condition: Option<String>,
    pub on_failure: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Workflow {
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub struct RemoteCacheConfig {
    pub kind: String,
    pub url: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub local_dir: PathBuf,
    pub remote: Option<RemoteCacheConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            local_dir: PathBuf::from(".zr/cache"),
            remote: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: MemberName,
    pub root: PathBuf,
}

/// The fully merged, ready-to-build configuration tree.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub tasks: BTreeMap<TaskName, RawTask>,
    pub templates: BTreeMap<String, RawTask>,
    pub workflows: BTreeMap<String, Workflow>,
    pub cache: CacheConfig,
    pub env: BTreeMap<String, String>,
    pub members: Vec<MemberInfo>,
}

/// Scalar, flag-driven adjustments applied after every file-based layer, per
/// spec.md §4.1's "command-line overrides" precedence step.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_enabled: Option<bool>,
}

fn merge_task(base: Option<RawTaskToml>, overlay: RawTaskToml) -> RawTaskToml {
    let base = base.unwrap_or_default();
    RawTaskToml {
        cmd: overlay.cmd.or(base.cmd),
        description: overlay.description.or(base.description),
        cwd: overlay.cwd.or(base.cwd),
        deps: overlay.deps.or(base.deps),
        deps_serial: overlay.deps_serial.or(base.deps_serial),
        env: match (base.env, overlay.env) {
            (Some(mut b), Some(o)) => {
                b.extend(o);
                Some(b)
            }
            (b, o) => o.or(b),
        },
        timeout: overlay.timeout.or(base.timeout),
        retry: overlay.retry.or(base.retry),
        allow_failure: overlay.allow_failure.or(base.allow_failure),
        tags: overlay.tags.or(base.tags),
        max_concurrent: overlay.max_concurrent.or(base.max_concurrent),
        max_cpu: overlay.max_cpu.or(base.max_cpu),
        max_memory: overlay.max_memory.or(base.max_memory),
        condition: overlay.condition.or(base.condition),
        matrix: overlay.matrix.or(base.matrix),
        template: overlay.template.or(base.template),
        template_params: overlay.template_params.or(base.template_params),
        toolchain: overlay.toolchain.or(base.toolchain),
        cache: overlay.cache.or(base.cache),
    }
}

fn merge_task_maps(
    base: BTreeMap<String, RawTaskToml>,
    overlay: BTreeMap<String, RawTaskToml>,
) -> BTreeMap<String, RawTaskToml> {
    let mut result = base;
    for (name, overlay_task) in overlay {
        let existing = result.remove(&name);
        result.insert(name, merge_task(existing, overlay_task));
    }
    result
}

fn merge_workflows(
    mut base: BTreeMap<String, RawWorkflow>,
    overlay: BTreeMap<String, RawWorkflow>,
) -> BTreeMap<String, RawWorkflow> {
    base.extend(overlay);
    base
}

fn merge_cache(base: Option<RawCacheConfig>, overlay: Option<RawCacheConfig>) -> RawCacheConfig {
    let base = base.unwrap_or_default();
    match overlay {
        None => base,
        Some(overlay) => RawCacheConfig {
            enabled: overlay.enabled.or(base.enabled),
            local_dir: overlay.local_dir.or(base.local_dir),
            remote: overlay.remote.or(base.remote),
        },
    }
}

/// One precedence layer's worth of raw configuration, already parsed.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub tasks: BTreeMap<String, RawTaskToml>,
    pub templates: BTreeMap<String, RawTaskToml>,
    pub cache: Option<RawCacheConfig>,
    pub workflows: BTreeMap<String, RawWorkflow>,
    pub env: BTreeMap<String, String>,
}

impl From<RawConfig> for Layer {
    fn from(raw: RawConfig) -> Self {
        Self {
            tasks: raw.tasks,
            templates: raw.templates,
            cache: raw.cache,
            workflows: raw.workflows,
            env: raw.env,
        }
    }
}

/// Applies a profile's overrides as one more precedence layer: its `env`
/// entries merge key-wise, and `cache_enabled` (if set) overrides the
/// `[cache] enabled` field of everything merged so far.
fn apply_profile(mut layer: Layer, profile: Option<&RawProfile>) -> Layer {
    let Some(profile) = profile else { return layer };
    layer.env.extend(profile.env.clone());
    if let Some(enabled) = profile.cache_enabled {
        let mut cache = layer.cache.unwrap_or_default();
        cache.enabled = Some(enabled);
        layer.cache = Some(cache);
    }
    layer
}

fn to_backoff(raw: RawBackoff) -> BackoffKind {
    match raw {
        RawBackoff::None => BackoffKind::None,
        RawBackoff::Linear => BackoffKind::Linear,
        RawBackoff::Exponential => BackoffKind::Exponential,
    }
}

fn to_cache_spec(raw: Option<RawCacheSpec>) -> Option<CacheSpec> {
    raw.map(|spec| match spec {
        RawCacheSpec::Enabled(enabled) => CacheSpec {
            enabled,
            ..Default::default()
        },
        RawCacheSpec::Table {
            enabled,
            inputs,
            outputs,
            key,
        } => CacheSpec {
            enabled: enabled.unwrap_or(false),
            inputs,
            outputs,
            key,
        },
    })
}

pub fn to_raw_task(toml_task: &RawTaskToml) -> RawTask {
    RawTask {
        description: toml_task.description.clone(),
        cmd: toml_task.cmd.clone(),
        cwd: toml_task.cwd.clone(),
        deps: toml_task.deps.clone(),
        deps_serial: toml_task.deps_serial.clone(),
        env: toml_task.env.clone(),
        timeout_ms: toml_task.timeout,
        retry: toml_task.retry.as_ref().map(|r| RetryPolicy {
            count: r.count,
            backoff: to_backoff(r.backoff),
        }),
        allow_failure: toml_task.allow_failure,
        cache: to_cache_spec(toml_task.cache.clone()),
        max_concurrent: toml_task.max_concurrent,
        max_cpu: toml_task.max_cpu,
        max_memory: toml_task.max_memory,
        tags: toml_task.tags.clone(),
        toolchain: toml_task.toolchain.clone(),
        condition: toml_task.condition.clone(),
        matrix: toml_task.matrix.clone(),
        template: toml_task.template.clone(),
        template_params: toml_task.template_params.clone(),
    }
}

/// Folds the `[env]` table in as the lowest-precedence layer of a task's own
/// `env` map (spec.md §4.1: global env entries are overridable per-task).
fn with_global_env(mut task: RawTask, global_env: &BTreeMap<String, String>) -> RawTask {
    if global_env.is_empty() {
        return task;
    }
    let mut merged = global_env.clone();
    merged.extend(task.env.unwrap_or_default());
    task.env = Some(merged);
    task
}

fn to_stage(raw: RawStage, index: usize) -> Stage {
    Stage {
        name: raw.name.unwrap_or_else(|| format!("stage-{index}")),
        tasks: raw.tasks,
        approval: raw.approval.unwrap_or(false),
        fail_fast: raw.fail_fast.unwrap_or(false),
        condition: raw.condition,
        on_failure: raw.on_failure,
    }
}

/// Folds layers in precedence order (lowest first) and resolves the result
/// into the engine's consumable [`Config`]. Task/template name validity is
/// enforced by `TaskName::new`; malformed names are silently dropped here —
/// the validator (run separately) is responsible for surfacing them as
/// errors, so loading never partially-fails on a single bad name.
pub fn resolve(
    layers: Vec<Layer>,
    profile: Option<&RawProfile>,
    overrides: &ConfigOverrides,
    members: Vec<MemberInfo>,
) -> Config {
    let mut merged = Layer::default();
    for layer in layers {
        merged.tasks = merge_task_maps(merged.tasks, layer.tasks);
        merged.templates = merge_task_maps(merged.templates, layer.templates);
        merged.cache = Some(merge_cache(merged.cache, layer.cache));
        merged.workflows = merge_workflows(merged.workflows, layer.workflows);
        merged.env.extend(layer.env);
    }
    merged = apply_profile(merged, profile);

    let mut cache_raw = merged.cache.unwrap_or_default();
    if let Some(enabled) = overrides.cache_enabled {
        cache_raw.enabled = Some(enabled);
    }

    let cache = CacheConfig {
        enabled: cache_raw.enabled.unwrap_or(true),
        local_dir: cache_raw
            .local_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".zr/cache")),
        remote: cache_raw.remote.and_then(|r| {
            r.kind.map(|kind| RemoteCacheConfig {
                kind,
                url: r.url,
                auth: r.auth,
            })
        }),
    };

    let tasks = merged
        .tasks
        .iter()
        .filter_map(|(name, task)| {
            TaskName::new(name.clone())
                .ok()
                .map(|name| (name, with_global_env(to_raw_task(task), &merged.env)))
        })
        .collect();

    let templates = merged
        .templates
        .iter()
        .map(|(name, task)| (name.clone(), to_raw_task(task)))
        .collect();

    let workflows = merged
        .workflows
        .into_iter()
        .map(|(name, workflow)| {
            let stages = workflow
                .stages
                .into_iter()
                .enumerate()
                .map(|(i, s)| to_stage(s, i))
                .collect();
            (name, Workflow { stages })
        })
        .collect();

    Config {
        tasks,
        templates,
        workflows,
        cache,
        env: merged.env,
        members,
    }
}
