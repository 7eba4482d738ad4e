//! `zr run <task>... [--jobs N] [--keep-going]`, per spec.md §6.

use std::sync::Arc;

use zr_graph::GraphBuilder;
use zr_scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
use zr_task_id::TaskName;

use crate::cli::RunArgs;
use crate::commands::common::{cache_store, fail_if_run_failed, history_store, merged_env, RunSummary};
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format;

pub async fn run(ctx: &CommandContext, args: &RunArgs) -> Result<(), CliError> {
    let requested = args
        .tasks
        .iter()
        .map(|name| TaskName::new(name.clone()).map_err(|_| CliError::TaskNotFound(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;

    let graph = GraphBuilder::new(&ctx.config.tasks, &ctx.config.templates)
        .with_requested(requested)
        .build()?;

    let options = SchedulerOptions {
        jobs: args.jobs.unwrap_or(ctx.jobs),
        keep_going: args.keep_going,
        dry_run: ctx.dry_run,
        ..SchedulerOptions::default()
    };

    let scheduler = Scheduler::new(cache_store(ctx), history_store(ctx), options);
    let cancel = scheduler.cancellation_token();
    if let Some(handler) = &ctx.signals {
        if let Some(subscriber) = handler.subscribe() {
            tokio::spawn(async move {
                let _guard = subscriber.listen().await;
                cancel.cancel();
            });
        }
    }

    let exec_ctx = ExecutionContext {
        root: ctx.root.clone(),
        env: merged_env(ctx),
        changed_paths: None,
    };

    let report = scheduler.execute(&graph, &exec_ctx).await;
    let summary = RunSummary::from_report(&report);
    println!("{}", format::render(&summary, ctx.format)?);
    fail_if_run_failed(&report)?;
    Ok(())
}
