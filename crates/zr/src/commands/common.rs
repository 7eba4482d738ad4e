//! Wiring shared by every subcommand: merged process environment, cache/
//! history store selection, and an [`ExecutionReport`] rendering shared
//! between `run` and `workflow`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use zr_cache::{CacheStore, LocalCacheStore, NullCacheStore};
use zr_history::HistoryStore;
use zr_scheduler::{ExecutionReport, NodeStatus};
use zr_workflow::{StageStatus, WorkflowReport};

use crate::context::CommandContext;
use crate::error::CliError;
use crate::format::Render;

/// The process environment merged with `[env]`/profile entries from config,
/// lowest precedence first so a task's own `env` (applied later, inside the
/// Scheduler) still wins.
pub fn merged_env(ctx: &CommandContext) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();
    env.extend(ctx.config.env.clone());
    env
}

/// Resolved Open Question (SPEC_FULL.md §9): `[cache] enabled=false`
/// overrides a per-task `cache=true`, so the whole run degrades to
/// uncached rather than honoring individual tasks' opt-in.
pub fn cache_store(ctx: &CommandContext) -> Arc<dyn CacheStore + Send + Sync> {
    if ctx.config.cache.enabled {
        Arc::new(LocalCacheStore::new(ctx.cache_dir()))
    } else {
        Arc::new(NullCacheStore::default())
    }
}

/// History failures are diagnostics, not aborts (spec.md §7's propagation
/// policy: "cache and history errors are reported as diagnostics and do not
/// fail the run"), so a store that fails to open degrades to "no history"
/// instead of bubbling up through every command.
pub fn history_store(ctx: &CommandContext) -> Option<Arc<HistoryStore>> {
    match HistoryStore::open(ctx.history_dir()) {
        Ok(store) => Some(Arc::new(store)),
        Err(err) => {
            tracing::warn!(%err, "history store unavailable, runs will not be recorded");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub status: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
    pub cache_hit: bool,
    pub retries_used: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub tasks: BTreeMap<String, TaskSummary>,
    pub failed: bool,
}

impl RunSummary {
    pub fn from_report(report: &ExecutionReport) -> Self {
        let tasks = report
            .outcomes
            .iter()
            .map(|(id, outcome)| {
                (
                    id.to_string(),
                    TaskSummary {
                        status: status_label(outcome.status).to_string(),
                        exit_code: outcome.exit_code,
                        duration_ms: outcome.duration_ms(),
                        cache_hit: outcome.cache_hit,
                        retries_used: outcome.retries_used,
                    },
                )
            })
            .collect();
        Self { tasks, failed: report.failed() }
    }
}

impl Render for RunSummary {
    fn render_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.tasks.len());
        for (id, summary) in &self.tasks {
            let suffix = match summary.exit_code {
                Some(code) if summary.status == "failed" => format!(" (exit {code})"),
                _ => String::new(),
            };
            lines.push(format!("{id:<30} {:<20}{suffix}", summary.status));
        }
        lines.join("\n")
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Succeeded => "succeeded",
        NodeStatus::SucceededWithWarning => "succeeded (warning)",
        NodeStatus::Cached => "cached",
        NodeStatus::Failed => "failed",
        NodeStatus::Skipped => "skipped",
        NodeStatus::Planned => "planned",
    }
}

/// Returns [`CliError::RunFailed`] if the report has any unrecovered task
/// failure, so every run-shaped command maps to exit code 1 uniformly.
pub fn fail_if_run_failed(report: &ExecutionReport) -> Result<(), CliError> {
    if report.failed() {
        Err(CliError::RunFailed)
    } else {
        Ok(())
    }
}

/// Returns [`CliError::WorkflowFailed`] if any stage in the report ended
/// `Failed` (a `Redirected` stage is not itself a failure; the stage it
/// redirected to carries the final verdict).
pub fn fail_if_workflow_failed(report: &WorkflowReport) -> Result<(), CliError> {
    if report.failed() {
        Err(CliError::WorkflowFailed)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub status: String,
    pub tasks: Option<RunSummary>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkflowSummary {
    pub order: Vec<String>,
    pub stages: BTreeMap<String, StageSummary>,
    pub failed: bool,
}

impl WorkflowSummary {
    pub fn from_report(report: &WorkflowReport) -> Self {
        let stages = report
            .stages
            .iter()
            .map(|(name, outcome)| {
                let status = match outcome.status {
                    StageStatus::Succeeded => "succeeded",
                    StageStatus::Failed => "failed",
                    StageStatus::Skipped => "skipped",
                    StageStatus::Redirected => "redirected",
                }
                .to_string();
                let tasks = outcome.report.as_ref().map(RunSummary::from_report);
                (name.clone(), StageSummary { status, tasks })
            })
            .collect();
        Self { order: report.order.clone(), stages, failed: report.failed() }
    }
}

impl Render for WorkflowSummary {
    fn render_text(&self) -> String {
        let mut lines = Vec::new();
        for name in &self.order {
            let Some(stage) = self.stages.get(name) else { continue };
            lines.push(format!("{name:<20} {}", stage.status));
            if let Some(tasks) = &stage.tasks {
                for line in tasks.render_text().lines() {
                    lines.push(format!("  {line}"));
                }
            }
        }
        lines.join("\n")
    }
}
