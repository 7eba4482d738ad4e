//! `zr cache {status|clear [--selective=<task>]}`, per spec.md §4.4 / §6.

use zr_cache::{ClearSummary, StatusSummary};
use zr_graph::GraphBuilder;
use zr_scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
use zr_task_id::TaskName;

use crate::cli::{CacheAction, CacheArgs};
use crate::commands::common::{cache_store, merged_env};
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format::{self, Render};

impl Render for StatusSummary {
    fn render_text(&self) -> String {
        format!(
            "entries: {}\nbytes: {}\noldest: {}\nnewest: {}",
            self.entries,
            self.bytes,
            self.oldest.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
            self.newest.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()),
        )
    }
}

impl Render for ClearSummary {
    fn render_text(&self) -> String {
        let verb = if self.dry_run { "would remove" } else { "removed" };
        format!("{verb} {} entries ({} bytes)", self.entries_removed, self.bytes_removed)
    }
}

pub async fn cache(ctx: &CommandContext, args: &CacheArgs) -> Result<(), CliError> {
    let store = cache_store(ctx);

    match &args.action {
        CacheAction::Status => {
            let status = store.status()?;
            println!("{}", format::render(&status, ctx.format)?);
            Ok(())
        }
        CacheAction::Clear { selective: None } => {
            let summary = store.clear(ctx.dry_run)?;
            println!("{}", format::render(&summary, ctx.format)?);
            Ok(())
        }
        CacheAction::Clear { selective: Some(task) } => {
            let fingerprints = current_fingerprints(ctx, task).await?;
            let mut total = ClearSummary { dry_run: ctx.dry_run, ..Default::default() };
            for fingerprint in fingerprints {
                let removed = store.remove(&fingerprint, ctx.dry_run)?;
                total.entries_removed += removed.entries_removed;
                total.bytes_removed += removed.bytes_removed;
            }
            println!("{}", format::render(&total, ctx.format)?);
            Ok(())
        }
    }
}

/// The cache store only indexes entries by fingerprint, not by task name, so
/// "selective" clearing by name runs the task's subgraph in `--dry-run`
/// (computing fingerprints without executing anything) and collects the
/// fingerprints its own node(s) — not its dependencies' — currently resolve
/// to.
async fn current_fingerprints(ctx: &CommandContext, task: &str) -> Result<Vec<String>, CliError> {
    let name = TaskName::new(task.to_string()).map_err(|_| CliError::TaskNotFound(task.to_string()))?;
    let graph = GraphBuilder::new(&ctx.config.tasks, &ctx.config.templates)
        .with_requested(vec![name.clone()])
        .build()?;

    let options = SchedulerOptions { dry_run: true, ..SchedulerOptions::default() };
    let scheduler = Scheduler::new(cache_store(ctx), None, options);
    let exec_ctx = ExecutionContext { root: ctx.root.clone(), env: merged_env(ctx), changed_paths: None };
    let report = scheduler.execute(&graph, &exec_ctx).await;

    Ok(report
        .outcomes
        .iter()
        .filter(|(id, _)| id.task == name)
        .filter_map(|(_, outcome)| outcome.fingerprint.clone())
        .collect())
}
