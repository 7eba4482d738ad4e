//! Drives a [`Workflow`] stage by stage, per spec.md §4.8.
//!
//! Grounded in `engine/execute.rs`'s overall run shape (build a graph, hand
//! it to the scheduler, collect a report) generalized one level up: each
//! stage is its own small [`zr_graph::Graph`] submitted as one batch to the
//! same [`zr_scheduler::Scheduler`], so every stage shares the run's global
//! admission semantics and its cancellation token (a `fail_fast` failure or
//! an external SIGINT drains every later stage exactly the way a Task Node
//! failure drains later graph levels).

use std::collections::BTreeMap;
use std::sync::Arc;

use zr_graph::{GraphBuilder, RawTask};
use zr_scheduler::{ExecutionContext, Scheduler};
use zr_task_id::TaskName;

use crate::gate::{AlwaysApprove, ApprovalGate, EnvApprovalGate};
use crate::status::{StageOutcome, StageStatus, WorkflowReport};
use crate::types::{Stage, Workflow};

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    pub dry_run: bool,
}

pub struct WorkflowEngine {
    scheduler: Scheduler,
    gate: Arc<dyn ApprovalGate>,
    options: WorkflowOptions,
}

impl WorkflowEngine {
    pub fn new(scheduler: Scheduler, options: WorkflowOptions) -> Self {
        let gate: Arc<dyn ApprovalGate> =
            if options.dry_run { Arc::new(AlwaysApprove) } else { Arc::new(EnvApprovalGate) };
        Self { scheduler, gate, options }
    }

    /// Overrides the default approval gate (env-var based, or always-approve
    /// under `--dry-run`) with one a front-end supplies, e.g. an interactive
    /// prompt.
    pub fn with_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.gate = gate;
        self
    }

    pub async fn run(
        &self,
        workflow: &Workflow,
        tasks: &BTreeMap<TaskName, RawTask>,
        templates: &BTreeMap<String, RawTask>,
        ctx: &ExecutionContext,
    ) -> WorkflowReport {
        let mut report = WorkflowReport::default();
        if workflow.stages.is_empty() {
            return report;
        }

        let mut draining = false;
        let mut next: Option<String> = Some(workflow.stages[0].name.clone());

        while let Some(stage_name) = next.take() {
            if report.order.contains(&stage_name) {
                tracing::warn!(stage = %stage_name, "on_failure redirect re-entered an already-executed stage, stopping");
                break;
            }
            let Some(stage) = workflow.stage(&stage_name) else {
                tracing::warn!(stage = %stage_name, "on_failure redirect target is not a defined stage");
                break;
            };
            report.order.push(stage_name.clone());

            if draining || self.scheduler.cancellation_token().is_cancelled() {
                report.stages.insert(stage_name, StageOutcome { status: StageStatus::Skipped, report: None });
                continue;
            }

            if !self.stage_condition_holds(stage, ctx) {
                report.stages.insert(stage_name, StageOutcome { status: StageStatus::Skipped, report: None });
                next = self.successor(workflow, &stage.name);
                continue;
            }

            if stage.approval && !self.options.dry_run && !self.gate.approve(&stage.name).await {
                tracing::info!(stage = %stage.name, "stage gate was not approved, skipping");
                report.stages.insert(stage_name, StageOutcome { status: StageStatus::Skipped, report: None });
                next = self.successor(workflow, &stage.name);
                continue;
            }

            let graph = match build_stage_graph(stage, tasks, templates) {
                Ok(graph) => graph,
                Err(err) => {
                    tracing::error!(stage = %stage.name, error = %err, "stage graph could not be built");
                    report.stages.insert(stage_name, StageOutcome { status: StageStatus::Failed, report: None });
                    draining = true;
                    continue;
                }
            };

            let exec_report = self.scheduler.execute(&graph, ctx).await;
            let failed = exec_report.failed();
            let (status, advance_to) = if !failed {
                (StageStatus::Succeeded, self.successor(workflow, &stage.name))
            } else if stage.fail_fast {
                draining = true;
                (StageStatus::Failed, None)
            } else if let Some(target) = &stage.on_failure {
                (StageStatus::Redirected, Some(target.clone()))
            } else {
                draining = true;
                (StageStatus::Failed, None)
            };

            report.stages.insert(stage_name, StageOutcome { status, report: Some(exec_report) });
            next = advance_to;
        }

        report
    }

    fn stage_condition_holds(&self, stage: &Stage, ctx: &ExecutionContext) -> bool {
        let Some(src) = &stage.condition else { return true };
        let runtime = zr_expr::Runtime { task: stage.name.clone(), hash: None, iteration: None };
        let mut eval_ctx = zr_expr::Context::new(ctx.env.clone(), runtime);
        if let Some(changed) = &ctx.changed_paths {
            eval_ctx = eval_ctx.with_changed_paths(changed.clone());
        }
        match zr_expr::eval_condition(src, &eval_ctx) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(stage = %stage.name, error = %err, "stage condition failed to evaluate, treating as false");
                false
            }
        }
    }

    fn successor(&self, workflow: &Workflow, current: &str) -> Option<String> {
        let idx = workflow.stages.iter().position(|s| s.name == current)?;
        workflow.stages.get(idx + 1).map(|s| s.name.clone())
    }
}

fn build_stage_graph(
    stage: &Stage,
    tasks: &BTreeMap<TaskName, RawTask>,
    templates: &BTreeMap<String, RawTask>,
) -> Result<zr_graph::Graph<zr_graph::Built>, zr_graph::BuilderError> {
    let requested = stage
        .tasks
        .iter()
        .map(|name| TaskName::new(name.clone()).map_err(|_| zr_graph::BuilderError::UnknownTask(name.clone())))
        .collect::<Result<Vec<_>, _>>()?;
    GraphBuilder::new(tasks, templates).with_requested(requested).build()
}
