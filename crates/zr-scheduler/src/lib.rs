//! Level-based execution of a materialized [`zr_graph::Graph`], per
//! spec.md §4.6: admission under a global jobs semaphore, a per-task-name
//! semaphore, and an advisory resource budget; fingerprinting and cache
//! consultation before every run; retry with backoff; cancellation and
//! draining on an unrecoverable failure.
//!
//! Grounded in `engine/execute.rs`'s walker-driven `Engine::execute` —
//! generalized from a one-node-at-a-time channel walk (needed there because
//! the teacher's graph has no precomputed levels) into a level-batch driver,
//! since our Graph Builder already assigns levels via Kahn's algorithm.

mod budget;
mod scheduler;
mod status;

pub use budget::{BudgetGuard, ResourceBudget};
pub use scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
pub use status::{ExecutionReport, NodeStatus, TaskOutcome};

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use zr_graph::{GraphBuilder, RawTask};
    use zr_task_id::TaskName;

    use super::*;

    fn name(s: &str) -> TaskName {
        TaskName::new(s).unwrap()
    }

    fn task(cmd: &str, deps: &[&str]) -> RawTask {
        RawTask {
            cmd: Some(cmd.to_string()),
            deps: Some(deps.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn context(root: &std::path::Path) -> ExecutionContext {
        ExecutionContext {
            root: root.to_path_buf(),
            env: std::collections::HashMap::new(),
            changed_paths: None,
        }
    }

    #[tokio::test]
    async fn runs_independent_tasks_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("a"), task("echo a", &[]));
        tasks.insert(name("b"), task("echo b", &[]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("a"), name("b")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert!(!report.failed());
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("a"))).unwrap().status,
            NodeStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn failed_task_drains_and_skips_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("fails"), task("exit 1", &[]));
        tasks.insert(name("downstream"), task("echo never", &["fails"]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("downstream")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert!(report.failed());
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("downstream"))).unwrap().status,
            NodeStatus::Skipped
        );
    }

    #[tokio::test]
    async fn allow_failure_propagates_as_warning_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(
            name("flaky"),
            RawTask {
                cmd: Some("exit 1".to_string()),
                allow_failure: Some(true),
                ..Default::default()
            },
        );
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("flaky")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert!(!report.failed());
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("flaky"))).unwrap().status,
            NodeStatus::SucceededWithWarning
        );
    }

    #[tokio::test]
    async fn keep_going_runs_independent_branch_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("fails"), task("exit 1", &[]));
        tasks.insert(name("independent"), task("echo ok", &[]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("fails"), name("independent")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let options = SchedulerOptions { keep_going: true, ..SchedulerOptions::default() };
        let scheduler = Scheduler::new(cache, None, options);
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("independent"))).unwrap().status,
            NodeStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn keep_going_skip_cascades_past_direct_dependents() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("fails"), task("exit 1", &[]));
        tasks.insert(name("child"), task("echo never", &["fails"]));
        tasks.insert(name("grandchild"), task("echo never", &["child"]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("grandchild")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let options = SchedulerOptions { keep_going: true, ..SchedulerOptions::default() };
        let scheduler = Scheduler::new(cache, None, options);
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert!(report.failed());
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("child"))).unwrap().status,
            NodeStatus::Skipped
        );
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("grandchild"))).unwrap().status,
            NodeStatus::Skipped
        );
    }

    #[tokio::test]
    async fn cache_hit_skips_reexecution() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(
            name("build"),
            RawTask {
                cmd: Some("echo built".to_string()),
                cache: Some(zr_graph::CacheSpec {
                    enabled: true,
                    inputs: vec![],
                    outputs: vec![],
                    key: None,
                }),
                ..Default::default()
            },
        );
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::LocalCacheStore::new(cache_dir.path()));
        let scheduler = Scheduler::new(cache.clone(), None, SchedulerOptions::default());
        let first = scheduler.execute(&graph, &context(dir.path())).await;
        assert_eq!(
            first.get(&zr_task_id::TaskNodeId::unexpanded(name("build"))).unwrap().status,
            NodeStatus::Succeeded
        );

        let second = scheduler.execute(&graph, &context(dir.path())).await;
        let outcome = second.get(&zr_task_id::TaskNodeId::unexpanded(name("build"))).unwrap();
        assert_eq!(outcome.status, NodeStatus::Cached);
        assert!(outcome.cache_hit);
    }

    #[tokio::test]
    async fn dry_run_plans_without_executing() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("build"), task("echo should-not-run", &[]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let options = SchedulerOptions { dry_run: true, ..SchedulerOptions::default() };
        let scheduler = Scheduler::new(cache, None, options);
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        let outcome = report.get(&zr_task_id::TaskNodeId::unexpanded(name("build"))).unwrap();
        assert_eq!(outcome.status, NodeStatus::Planned);
        assert!(outcome.fingerprint.is_some());
    }

    #[tokio::test]
    async fn pure_aggregator_with_no_command_trivially_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("build"), task("echo leaf", &[]));
        tasks.insert(
            name("ci"),
            RawTask {
                deps: Some(vec!["build".to_string()]),
                ..Default::default()
            },
        );
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("ci")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert!(!report.failed());
        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("ci"))).unwrap().status,
            NodeStatus::Succeeded
        );
    }

    #[tokio::test]
    async fn false_condition_skips_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(
            name("maybe"),
            RawTask {
                cmd: Some("echo should-not-run".to_string()),
                condition: Some(r#"env.CI == "true""#.to_string()),
                ..Default::default()
            },
        );
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("maybe")])
            .build()
            .unwrap();

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let report = scheduler.execute(&graph, &context(dir.path())).await;

        assert_eq!(
            report.get(&zr_task_id::TaskNodeId::unexpanded(name("maybe"))).unwrap().status,
            NodeStatus::Skipped
        );
    }
}
