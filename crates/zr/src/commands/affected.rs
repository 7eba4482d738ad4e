//! `zr affected <task> [--base REF] [--list] ...`, per spec.md §4.9 / §6.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use zr_graph::GraphBuilder;
use zr_scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
use zr_scm::{affected_task_names, expand, ExpansionFlags, Scm};
use zr_task_id::TaskName;

use crate::cli::AffectedArgs;
use crate::commands::common::{cache_store, fail_if_run_failed, history_store, merged_env, RunSummary};
use crate::config;
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format::{self, Render};

/// `--list`'s shape, matching spec.md §4.9's `--format json` example
/// verbatim: `{affected: [...], base: "...", changed_paths: [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct AffectedList {
    pub affected: Vec<String>,
    pub base: String,
    pub changed_paths: Vec<String>,
}

impl Render for AffectedList {
    fn render_text(&self) -> String {
        self.affected.join("\n")
    }
}

pub async fn affected(ctx: &CommandContext, args: &AffectedArgs) -> Result<(), CliError> {
    let requested_task =
        TaskName::new(args.task.clone()).map_err(|_| CliError::TaskNotFound(args.task.clone()))?;

    let scm = Scm::discover(&ctx.root)?;
    let changed = scm.changed_paths(&args.base)?;

    // Build the graph over every task, not just the requested one: expanding
    // by `--include-dependents` needs the full reverse-dependency edge set to
    // walk, even though the seed below is scoped to the single named task.
    let all_tasks: Vec<TaskName> = ctx.config.tasks.keys().cloned().collect();
    let graph = GraphBuilder::new(&ctx.config.tasks, &ctx.config.templates)
        .with_requested(all_tasks)
        .build()?;

    let owners = config::member_task_owners(&ctx.config.members);
    let seed: BTreeSet<TaskName> = if affected_task_names(&graph, &owners, &changed).contains(&requested_task) {
        [requested_task].into()
    } else {
        BTreeSet::new()
    };

    let flags = ExpansionFlags {
        include_dependents: args.include_dependents,
        include_dependencies: args.include_dependencies,
        exclude_self: args.exclude_self,
    };
    let affected_names = expand(&graph, seed, flags);

    if args.list {
        let list = AffectedList {
            affected: affected_names.iter().map(|n| n.to_string()).collect(),
            base: args.base.clone(),
            changed_paths: changed.iter().map(|p| p.display().to_string()).collect(),
        };
        println!("{}", format::render(&list, ctx.format)?);
        return Ok(());
    }

    if affected_names.is_empty() {
        println!("{}", format::render(&RunSummary::default(), ctx.format)?);
        return Ok(());
    }

    let requested: Vec<TaskName> = affected_names.into_iter().collect();
    let run_graph = GraphBuilder::new(&ctx.config.tasks, &ctx.config.templates)
        .with_requested(requested)
        .build()?;

    let options = SchedulerOptions {
        jobs: ctx.jobs,
        dry_run: ctx.dry_run,
        ..SchedulerOptions::default()
    };
    let scheduler = Scheduler::new(cache_store(ctx), history_store(ctx), options);
    let exec_ctx = ExecutionContext {
        root: ctx.root.clone(),
        env: merged_env(ctx),
        changed_paths: Some(changed.into_iter().collect::<HashSet<_>>()),
    };

    let report = scheduler.execute(&run_graph, &exec_ctx).await;
    let summary = RunSummary::from_report(&report);
    println!("{}", format::render(&summary, ctx.format)?);
    fail_if_run_failed(&report)?;
    Ok(())
}
