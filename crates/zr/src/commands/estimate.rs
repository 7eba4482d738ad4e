//! `zr estimate <task> [--limit N]`, per spec.md §4.10 / §6.

use serde::Serialize;
use zr_history::{DurationEstimate, HistoryError};
use zr_task_id::TaskName;

use crate::cli::EstimateArgs;
use crate::commands::common::history_store;
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format::{self, Render};

#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub task: String,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub sample_count: usize,
}

impl Render for EstimateReport {
    fn render_text(&self) -> String {
        format!(
            "{}: {:.1}ms +/- {:.1}ms (n={})",
            self.task, self.mean_ms, self.stddev_ms, self.sample_count
        )
    }
}

/// `NoHistory` is a graceful empty result (spec.md §4.10), not a failure: it
/// renders as a message and the command still exits `0`.
pub async fn estimate(ctx: &CommandContext, args: &EstimateArgs) -> Result<(), CliError> {
    let name = TaskName::new(args.task.clone()).map_err(|_| CliError::TaskNotFound(args.task.clone()))?;

    let Some(store) = history_store(ctx) else {
        println!("no history available for {:?}", args.task);
        return Ok(());
    };

    let records = store.for_task(&name, args.limit)?;
    match zr_history::estimate(name.as_str(), &records) {
        Ok(DurationEstimate { mean_ms, stddev_ms, sample_count }) => {
            let report = EstimateReport {
                task: args.task.clone(),
                mean_ms,
                stddev_ms,
                sample_count,
            };
            println!("{}", format::render(&report, ctx.format)?);
            Ok(())
        }
        Err(HistoryError::NoHistory(task)) => {
            println!("no history available for {task:?}");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
