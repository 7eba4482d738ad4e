//! Stage-ordered execution of a [`Workflow`], per spec.md §4.8: each stage's
//! tasks are submitted as one batch to a [`zr_scheduler::Scheduler`], gated
//! by an optional condition and an optional approval gate, with
//! `fail_fast`/`on_failure` controlling what happens after a stage's tasks
//! don't all succeed.

mod engine;
mod gate;
mod status;
mod types;

pub use engine::{WorkflowEngine, WorkflowOptions};
pub use gate::{AlwaysApprove, ApprovalGate, EnvApprovalGate, NeverApprove};
pub use status::{StageOutcome, StageStatus, WorkflowReport};
pub use types::{Stage, Workflow};

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use zr_graph::RawTask;
    use zr_scheduler::{ExecutionContext, Scheduler, SchedulerOptions};
    use zr_task_id::TaskName;

    use super::*;

    fn name(s: &str) -> TaskName {
        TaskName::new(s).unwrap()
    }

    fn task(cmd: &str) -> RawTask {
        RawTask { cmd: Some(cmd.to_string()), ..Default::default() }
    }

    fn ctx(root: &std::path::Path) -> ExecutionContext {
        ExecutionContext { root: root.to_path_buf(), env: std::collections::HashMap::new(), changed_paths: None }
    }

    fn stage(name: &str, tasks: &[&str]) -> Stage {
        Stage {
            name: name.to_string(),
            tasks: tasks.iter().map(|s| s.to_string()).collect(),
            approval: false,
            fail_fast: false,
            condition: None,
            on_failure: None,
        }
    }

    #[tokio::test]
    async fn runs_all_stages_in_order_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("build"), task("echo build"));
        tasks.insert(name("test"), task("echo test"));
        let templates = BTreeMap::new();

        let workflow = Workflow { stages: vec![stage("build", &["build"]), stage("test", &["test"])] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default());

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert!(!report.failed());
        assert_eq!(report.order, vec!["build".to_string(), "test".to_string()]);
        assert_eq!(report.get("build").unwrap().status, StageStatus::Succeeded);
        assert_eq!(report.get("test").unwrap().status, StageStatus::Succeeded);
    }

    #[tokio::test]
    async fn fail_fast_stops_the_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("broken"), task("exit 1"));
        tasks.insert(name("never"), task("echo never"));
        let templates = BTreeMap::new();

        let mut first = stage("broken", &["broken"]);
        first.fail_fast = true;
        let workflow = Workflow { stages: vec![first, stage("later", &["never"])] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default());

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert!(report.failed());
        assert_eq!(report.get("broken").unwrap().status, StageStatus::Failed);
        assert_eq!(report.get("later").unwrap().status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn on_failure_redirects_instead_of_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("broken"), task("exit 1"));
        tasks.insert(name("cleanup"), task("echo cleanup"));
        let templates = BTreeMap::new();

        let mut first = stage("broken", &["broken"]);
        first.on_failure = Some("cleanup".to_string());
        let workflow = Workflow { stages: vec![first, stage("cleanup", &["cleanup"])] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default());

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert_eq!(report.get("broken").unwrap().status, StageStatus::Redirected);
        assert_eq!(report.get("cleanup").unwrap().status, StageStatus::Succeeded);
        assert_eq!(report.order, vec!["broken".to_string(), "cleanup".to_string()]);
    }

    #[tokio::test]
    async fn false_condition_skips_stage_but_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("maybe"), task("echo should-not-run"));
        tasks.insert(name("after"), task("echo after"));
        let templates = BTreeMap::new();

        let mut first = stage("maybe", &["maybe"]);
        first.condition = Some(r#"env.CI == "true""#.to_string());
        let workflow = Workflow { stages: vec![first, stage("after", &["after"])] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default());

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert!(!report.failed());
        assert_eq!(report.get("maybe").unwrap().status, StageStatus::Skipped);
        assert_eq!(report.get("after").unwrap().status, StageStatus::Succeeded);
    }

    #[tokio::test]
    async fn ungated_gate_defaults_to_skipped_without_approve_all() {
        std::env::remove_var("APPROVE_ALL");
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("deploy"), task("echo deploying"));
        let templates = BTreeMap::new();

        let mut gated = stage("deploy", &["deploy"]);
        gated.approval = true;
        let workflow = Workflow { stages: vec![gated] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default());

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert_eq!(report.get("deploy").unwrap().status, StageStatus::Skipped);
    }

    #[tokio::test]
    async fn always_approve_gate_lets_a_gated_stage_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("deploy"), task("echo deploying"));
        let templates = BTreeMap::new();

        let mut gated = stage("deploy", &["deploy"]);
        gated.approval = true;
        let workflow = Workflow { stages: vec![gated] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let scheduler = Scheduler::new(cache, None, SchedulerOptions::default());
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions::default()).with_gate(Arc::new(AlwaysApprove));

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        assert_eq!(report.get("deploy").unwrap().status, StageStatus::Succeeded);
    }

    #[tokio::test]
    async fn dry_run_bypasses_gates_and_plans_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut tasks = BTreeMap::new();
        tasks.insert(name("deploy"), task("echo should-not-run"));
        let templates = BTreeMap::new();

        let mut gated = stage("deploy", &["deploy"]);
        gated.approval = true;
        let workflow = Workflow { stages: vec![gated] };

        let cache = Arc::new(zr_cache::NullCacheStore::default());
        let options = SchedulerOptions { dry_run: true, ..SchedulerOptions::default() };
        let scheduler = Scheduler::new(cache, None, options);
        let engine = WorkflowEngine::new(scheduler, WorkflowOptions { dry_run: true });

        let report = engine.run(&workflow, &tasks, &templates, &ctx(dir.path())).await;

        let outcome = report.get("deploy").unwrap();
        assert_eq!(outcome.status, StageStatus::Succeeded);
        let task_outcome = outcome
            .report
            .as_ref()
            .unwrap()
            .get(&zr_task_id::TaskNodeId::unexpanded(name("deploy")))
            .unwrap();
        assert_eq!(task_outcome.status, zr_scheduler::NodeStatus::Planned);
    }
}
