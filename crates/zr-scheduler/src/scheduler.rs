//! Drives a [`Graph<Built>`] to completion level by level, per spec.md §4.6.
//!
//! Grounded in `engine/execute.rs`'s `Engine::execute`: that walker drives
//! one node at a time off a channel as its dependencies finish and admits
//! work through a single global `Semaphore`. Our Graph Builder already
//! assigns each node a level such that every dependency sits in a strictly
//! earlier level (Kahn's algorithm), so a node's dependencies are always
//! fully settled before its own level starts — the channel-and-walker
//! machinery collapses into "run one level's nodes concurrently, then move
//! to the next level". We keep the teacher's global `Semaphore` admission
//! and add the per-task-name semaphore and [`ResourceBudget`] spec.md §4.6
//! layers on top.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use tokio::sync::Semaphore;
use zr_cache::{CacheStore, Entry};
use zr_graph::{BackoffKind, Built, Graph, MaterializedTask};
use zr_history::{HistoryStore, RunRecord, RunStatus};
use zr_process::{CancellationToken, Child, Command};
use zr_task_id::{TaskName, TaskNodeId};

use crate::budget::ResourceBudget;
use crate::status::{ExecutionReport, NodeStatus, TaskOutcome};

/// Sentinel folded into a dependency's fingerprint slot when that dependency
/// was skipped rather than executed, so a fingerprint still varies between
/// "dependency ran and produced X" and "dependency was skipped".
const SKIPPED_FINGERPRINT: &str = "SKIPPED";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub jobs: usize,
    pub keep_going: bool,
    pub dry_run: bool,
    pub output_ceiling: usize,
    pub max_cpu_total: Option<u32>,
    pub max_memory_total: Option<u64>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
            keep_going: false,
            dry_run: false,
            output_ceiling: 1 << 20,
            max_cpu_total: None,
            max_memory_total: None,
        }
    }
}

/// Everything a run needs beyond the graph itself: where the workspace
/// lives, the environment tasks execute with, and the VCS-derived changed
/// path set `file.changed` conditions evaluate against.
pub struct ExecutionContext {
    pub root: PathBuf,
    pub env: HashMap<String, String>,
    pub changed_paths: Option<HashSet<PathBuf>>,
}

/// Level-based executor: admits Ready nodes one level at a time under a
/// global jobs semaphore, a per-task-name semaphore, and an advisory
/// resource budget, per spec.md §4.6.
pub struct Scheduler {
    cache: Arc<dyn CacheStore + Send + Sync>,
    history: Option<Arc<HistoryStore>>,
    options: SchedulerOptions,
    budget: ResourceBudget,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(
        cache: Arc<dyn CacheStore + Send + Sync>,
        history: Option<Arc<HistoryStore>>,
        options: SchedulerOptions,
    ) -> Self {
        let budget = ResourceBudget::new(options.max_cpu_total, options.max_memory_total);
        Self {
            cache,
            history,
            options,
            budget,
            cancel: CancellationToken::new(),
        }
    }

    /// A token the caller can cancel (e.g. from a SIGINT handler) to trigger
    /// the same draining behavior as an in-run task failure.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn execute(&self, graph: &Graph<Built>, ctx: &ExecutionContext) -> ExecutionReport {
        let global_permits = Arc::new(Semaphore::new(self.options.jobs.max(1)));
        let mut per_task_name: HashMap<TaskName, Arc<Semaphore>> = HashMap::new();

        let mut report = ExecutionReport::default();
        let mut fingerprints: HashMap<TaskNodeId, String> = HashMap::new();
        let mut draining = self.cancel.is_cancelled();

        for level in graph.levels() {
            if draining || self.cancel.is_cancelled() {
                draining = true;
                for id in level {
                    report.outcomes.insert(id.clone(), skipped_outcome());
                }
                continue;
            }

            let mut futures = Vec::with_capacity(level.len());
            for id in level {
                let Some(task) = graph.task(id) else { continue };

                let dep_blocked = graph
                    .dependencies(id)
                    .into_iter()
                    .any(|dep| report.outcomes.get(dep).is_some_and(|o| !o.status.unblocks_dependents()));
                if dep_blocked {
                    futures.push(Either::Skipped(id.clone()));
                    continue;
                }

                let dep_fingerprints: Vec<String> = graph
                    .dependencies(id)
                    .into_iter()
                    .map(|dep| {
                        fingerprints
                            .get(dep)
                            .cloned()
                            .unwrap_or_else(|| SKIPPED_FINGERPRINT.to_string())
                    })
                    .collect();

                let name_semaphore = task.max_concurrent.map(|max| {
                    per_task_name
                        .entry(id.task.clone())
                        .or_insert_with(|| Arc::new(Semaphore::new(max.max(1) as usize)))
                        .clone()
                });

                let run_id = id.clone();
                let run_task = task.clone();
                let global_permits = Arc::clone(&global_permits);
                futures.push(Either::Run(async move {
                    let outcome = self
                        .run_node(run_id.clone(), run_task, ctx, dep_fingerprints, global_permits, name_semaphore)
                        .await;
                    (run_id, outcome)
                }));
            }

            let resolved = join_all(futures).await;
            for (id, outcome) in resolved {
                if outcome.status == NodeStatus::Failed && !self.options.keep_going {
                    draining = true;
                    self.cancel.cancel();
                }
                fingerprints.insert(
                    id.clone(),
                    outcome
                        .fingerprint
                        .clone()
                        .unwrap_or_else(|| SKIPPED_FINGERPRINT.to_string()),
                );
                report.outcomes.insert(id, outcome);
            }
        }

        report
    }

    async fn run_node(
        &self,
        id: TaskNodeId,
        task: MaterializedTask,
        ctx: &ExecutionContext,
        dep_fingerprints: Vec<String>,
        global_permits: Arc<Semaphore>,
        name_semaphore: Option<Arc<Semaphore>>,
    ) -> TaskOutcome {
        let start = now_ms();

        if let Some(condition) = &task.condition {
            let eval_ctx = condition_context(ctx, &id);
            match zr_expr::eval_condition(condition, &eval_ctx) {
                Ok(true) => {}
                Ok(false) => return skipped_outcome_at(start),
                Err(err) => {
                    tracing::warn!(task = %id, %err, "condition failed to evaluate, skipping task");
                    return skipped_outcome_at(start);
                }
            }
        }

        let Some(cmd) = task.cmd.clone() else {
            // Pure aggregator: no command, nothing to fingerprint or run.
            return TaskOutcome {
                status: NodeStatus::Succeeded,
                exit_code: None,
                fingerprint: None,
                cache_hit: false,
                retries_used: 0,
                start_unix_ms: start,
                end_unix_ms: now_ms(),
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
        };

        let _global_permit = global_permits.acquire_owned().await.expect("global semaphore never closes");
        let _name_permit = match &name_semaphore {
            Some(sem) => Some(sem.clone().acquire_owned().await.expect("per-task semaphore never closes")),
            None => None,
        };
        let _budget_guard = self.budget.acquire(task.max_cpu, task.max_memory).await;

        let fingerprint = match zr_fingerprint::fingerprint(&task, &ctx.env, &ctx.root, &dep_fingerprints) {
            Ok(fp) => fp,
            Err(err) => {
                tracing::warn!(task = %id, %err, "failed to compute fingerprint, running uncached");
                String::new()
            }
        };

        if self.options.dry_run {
            tracing::info!(task = %id, %fingerprint, cmd = %cmd, "planned");
            return TaskOutcome {
                status: NodeStatus::Planned,
                exit_code: None,
                fingerprint: Some(fingerprint),
                cache_hit: false,
                retries_used: 0,
                start_unix_ms: start,
                end_unix_ms: now_ms(),
                stdout: Vec::new(),
                stderr: Vec::new(),
            };
        }

        if task.cache.enabled && !fingerprint.is_empty() {
            match self.cache.lookup(&fingerprint) {
                Ok(Some(entry)) => {
                    let cwd = task_cwd(&ctx.root, &task);
                    if let Err(err) = self.cache.replay(&entry, &cwd) {
                        tracing::warn!(task = %id, %err, "failed to replay cached outputs");
                    } else {
                        self.record_history(&id, start, now_ms(), RunStatus::Succeeded, &fingerprint, true);
                        return TaskOutcome {
                            status: NodeStatus::Cached,
                            exit_code: Some(entry.exit_code),
                            fingerprint: Some(fingerprint),
                            cache_hit: true,
                            retries_used: 0,
                            start_unix_ms: start,
                            end_unix_ms: now_ms(),
                            stdout: entry.stdout,
                            stderr: entry.stderr,
                        };
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(task = %id, %err, "cache lookup failed, running uncached"),
            }
        }

        let (outcome, attempts) = self.run_with_retries(&id, &task, ctx, &cmd).await;
        let end = now_ms();

        let final_status = if outcome.exit == zr_process::ChildExit::Finished(0) {
            NodeStatus::Succeeded
        } else if task.allow_failure {
            NodeStatus::SucceededWithWarning
        } else {
            NodeStatus::Failed
        };

        let succeeded = matches!(final_status, NodeStatus::Succeeded);
        if succeeded && task.cache.enabled && !fingerprint.is_empty() {
            let entry = Entry {
                fingerprint: fingerprint.clone(),
                stdout: outcome.stdout.clone(),
                stderr: outcome.stderr.clone(),
                exit_code: exit_code_of(&outcome),
                outputs: collect_outputs(&ctx.root, &task),
            };
            if let Err(err) = self.cache.store(&entry) {
                tracing::warn!(task = %id, %err, "failed to store cache entry");
            }
        }

        let run_status = match final_status {
            NodeStatus::Succeeded => RunStatus::Succeeded,
            NodeStatus::SucceededWithWarning => RunStatus::SucceededWithWarning,
            _ => RunStatus::Failed,
        };
        self.record_history(&id, start, end, run_status, &fingerprint, false);

        if final_status.is_failure() {
            tracing::error!(task = %id, attempts, "task failed");
        }

        TaskOutcome {
            status: final_status,
            exit_code: Some(exit_code_of(&outcome)),
            fingerprint: Some(fingerprint),
            cache_hit: false,
            retries_used: attempts.saturating_sub(1),
            start_unix_ms: start,
            end_unix_ms: end,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        }
    }

    /// Runs `cmd` up to `task.retry.count + 1` times, applying the
    /// configured backoff between attempts. Retries reuse the already
    /// computed fingerprint; only the final attempt's outcome is cached
    /// (spec.md §4.6 rule 3).
    async fn run_with_retries(
        &self,
        id: &TaskNodeId,
        task: &MaterializedTask,
        ctx: &ExecutionContext,
        cmd: &str,
    ) -> (zr_process::RunOutcome, u32) {
        let timeout = (task.timeout_ms > 0).then(|| Duration::from_millis(task.timeout_ms));
        let cwd = task_cwd(&ctx.root, task);
        let mut attempt = 0u32;

        loop {
            let mut command = Command::new(cmd).cwd(cwd.clone()).env(merged_env(ctx, task));
            command.set_label(id.to_string());

            let run_result = match Child::spawn(command) {
                Ok(child) => child.run_cancellable(timeout, self.options.output_ceiling, self.cancel.clone()).await,
                Err(err) => {
                    tracing::error!(task = %id, %err, "failed to spawn process");
                    Err(err)
                }
            };

            let outcome = run_result.unwrap_or(zr_process::RunOutcome {
                exit: zr_process::ChildExit::Failed,
                stdout: Vec::new(),
                stderr: Vec::new(),
                stdout_truncated: false,
                stderr_truncated: false,
                timed_out: false,
            });

            attempt += 1;
            let succeeded = outcome.exit == zr_process::ChildExit::Finished(0);
            let exhausted = attempt > task.retry.count || self.cancel.is_cancelled();
            if succeeded || exhausted {
                return (outcome, attempt);
            }

            let delay = backoff_delay(task.retry.backoff, attempt);
            tracing::warn!(task = %id, attempt, delay_ms = delay.as_millis() as u64, "retrying after failure");
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }
    }

    fn record_history(
        &self,
        id: &TaskNodeId,
        start: u128,
        end: u128,
        status: RunStatus,
        fingerprint: &str,
        cache_hit: bool,
    ) {
        let Some(history) = &self.history else { return };
        let record = RunRecord {
            task: id.task.clone(),
            coordinate: id.coordinate.clone(),
            start_unix_ms: start,
            end_unix_ms: end,
            status,
            fingerprint: fingerprint.to_string(),
            cache_hit,
        };
        if let Err(err) = history.append(&record) {
            tracing::warn!(task = %id, %err, "failed to append history record");
        }
    }
}

/// A level's node either runs through the full admission pipeline or is
/// already known to be skipped (a dependency failed); kept as a plain enum
/// instead of boxing so `join_all` can resolve both arms uniformly.
enum Either<F> {
    Run(F),
    Skipped(TaskNodeId),
}

async fn join_all<F>(futures: Vec<Either<F>>) -> Vec<(TaskNodeId, TaskOutcome)>
where
    F: std::future::Future<Output = (TaskNodeId, TaskOutcome)>,
{
    let mut running = Vec::new();
    let mut results = Vec::with_capacity(futures.len());
    for item in futures {
        match item {
            Either::Run(fut) => running.push(fut),
            Either::Skipped(id) => results.push((id, skipped_outcome())),
        }
    }
    results.extend(futures::future::join_all(running).await);
    results
}

fn skipped_outcome() -> TaskOutcome {
    skipped_outcome_at(now_ms())
}

fn skipped_outcome_at(at: u128) -> TaskOutcome {
    TaskOutcome {
        status: NodeStatus::Skipped,
        exit_code: None,
        fingerprint: None,
        cache_hit: false,
        retries_used: 0,
        start_unix_ms: at,
        end_unix_ms: at,
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn backoff_delay(kind: BackoffKind, attempt: u32) -> Duration {
    const BASE: Duration = Duration::from_millis(500);
    match kind {
        BackoffKind::None => Duration::ZERO,
        BackoffKind::Linear => BASE * attempt,
        BackoffKind::Exponential => BASE * 2u32.saturating_pow(attempt.saturating_sub(1)),
    }
}

fn task_cwd(root: &std::path::Path, task: &MaterializedTask) -> PathBuf {
    match &task.cwd {
        Some(rel) => root.join(rel),
        None => root.to_path_buf(),
    }
}

fn merged_env(ctx: &ExecutionContext, task: &MaterializedTask) -> std::collections::BTreeMap<String, String> {
    let mut env: std::collections::BTreeMap<String, String> = ctx.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    env.extend(task.env.clone());
    env
}

fn collect_outputs(root: &std::path::Path, task: &MaterializedTask) -> zr_cache::Outputs {
    let cwd = task_cwd(root, task);
    let mut outputs = zr_cache::Outputs::new();
    for pattern in &task.cache.outputs {
        let Ok(glob) = wax::Glob::new(pattern) else { continue };
        walk_outputs(&cwd, &cwd, &glob, &mut outputs);
    }
    outputs
}

fn walk_outputs(root: &std::path::Path, dir: &std::path::Path, glob: &wax::Glob, out: &mut zr_cache::Outputs) {
    use wax::Pattern;

    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else { continue };
        if file_type.is_dir() {
            walk_outputs(root, &path, glob, out);
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(&path);
        if glob.is_match(rel) {
            if let Ok(bytes) = std::fs::read(&path) {
                out.insert(rel.to_string_lossy().replace('\\', "/"), bytes);
            }
        }
    }
}

fn exit_code_of(outcome: &zr_process::RunOutcome) -> i32 {
    match outcome.exit {
        zr_process::ChildExit::Finished(code) => code,
        zr_process::ChildExit::Failed => -1,
    }
}

fn condition_context(ctx: &ExecutionContext, id: &TaskNodeId) -> zr_expr::Context {
    let runtime = zr_expr::Runtime {
        task: id.task.to_string(),
        hash: None,
        iteration: (!id.coordinate.is_empty()).then(|| id.coordinate.suffix()),
    };
    let mut eval_ctx = zr_expr::Context::new(ctx.env.clone(), runtime);
    if let Some(changed) = &ctx.changed_paths {
        eval_ctx = eval_ctx.with_changed_paths(changed.clone());
    }
    eval_ctx
}
