//! `zr workflow <name> [--jobs N] [--dry-run]`, per spec.md §4.8 / §6.

use zr_scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
use zr_workflow::{Stage as EngineStage, Workflow as EngineWorkflow, WorkflowEngine, WorkflowOptions};

use crate::cli::WorkflowArgs;
use crate::commands::common::{cache_store, fail_if_workflow_failed, history_store, merged_env, WorkflowSummary};
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format;

pub async fn workflow(ctx: &CommandContext, args: &WorkflowArgs) -> Result<(), CliError> {
    let configured = ctx
        .config
        .workflows
        .get(&args.name)
        .ok_or_else(|| CliError::WorkflowNotFound(args.name.clone()))?;

    let engine_workflow = EngineWorkflow {
        stages: configured
            .stages
            .iter()
            .map(|stage| EngineStage {
                name: stage.name.clone(),
                tasks: stage.tasks.clone(),
                approval: stage.approval,
                fail_fast: stage.fail_fast,
                condition: stage.condition.clone(),
                on_failure: stage.on_failure.clone(),
            })
            .collect(),
    };

    let options = SchedulerOptions {
        jobs: args.jobs.unwrap_or(ctx.jobs),
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

    let engine = WorkflowEngine::new(scheduler, WorkflowOptions { dry_run: ctx.dry_run });

    let exec_ctx = ExecutionContext { root: ctx.root.clone(), env: merged_env(ctx), changed_paths: None };

    let report = engine
        .run(&engine_workflow, &ctx.config.tasks, &ctx.config.templates, &exec_ctx)
        .await;

    let summary = WorkflowSummary::from_report(&report);
    println!("{}", format::render(&summary, ctx.format)?);
    fail_if_workflow_failed(&report)?;
    Ok(())
}
