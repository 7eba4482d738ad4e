//! Maps a set of changed paths onto affected workspace members and tasks,
//! then expands that seed set along dependency/dependent closures per
//! spec.md §4.9's `--include-dependents`/`--include-dependencies`/
//! `--exclude-self` flags.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    path::{Path, PathBuf},
};

use wax::{Glob, Pattern};
use zr_graph::{Built, Graph};
use zr_task_id::{TaskName, TaskNodeId};

/// A task is affected if its owning member is affected, or if any of its
/// `cache.inputs` entries matches a changed path.
pub fn affected_task_names(
    graph: &Graph<Built>,
    member_roots: &BTreeMap<TaskName, PathBuf>,
    changed: &BTreeSet<PathBuf>,
) -> BTreeSet<TaskName> {
    let mut affected = BTreeSet::new();
    for id in graph.nodes() {
        if affected.contains(&id.task) {
            continue;
        }
        let member_affected = member_roots
            .get(&id.task)
            .map(|root| changed.iter().any(|p| p.starts_with(root)))
            .unwrap_or(false);

        let inputs_affected = graph
            .task(id)
            .map(|t| task_inputs_match(&t.cache.inputs, changed))
            .unwrap_or(false);

        if member_affected || inputs_affected {
            affected.insert(id.task.clone());
        }
    }
    affected
}

fn task_inputs_match(inputs: &[String], changed: &BTreeSet<PathBuf>) -> bool {
    for pattern in inputs {
        if pattern.starts_with('$') {
            continue;
        }
        let Ok(glob) = Glob::new(pattern) else {
            continue;
        };
        if changed.iter().any(|p| glob.is_match(p.as_path())) {
            return true;
        }
    }
    false
}

fn node_ids_for_names<'a>(
    graph: &'a Graph<Built>,
    names: &BTreeSet<TaskName>,
) -> BTreeSet<&'a TaskNodeId> {
    graph.nodes().filter(|id| names.contains(&id.task)).collect()
}

/// Every node reachable by walking forward dependency edges from `seed`.
pub fn expand_dependencies(graph: &Graph<Built>, seed: &BTreeSet<TaskName>) -> BTreeSet<TaskName> {
    let mut result: BTreeSet<TaskName> = seed.clone();
    let mut queue: VecDeque<TaskNodeId> = node_ids_for_names(graph, seed).into_iter().cloned().collect();

    while let Some(id) = queue.pop_front() {
        for dep in graph.dependencies(&id) {
            if result.insert(dep.task.clone()) {
                queue.push_back(dep.clone());
            }
        }
    }
    result
}

/// Every node whose forward-dependency closure includes a member of `seed`
/// (i.e. every dependent, transitively).
pub fn expand_dependents(graph: &Graph<Built>, seed: &BTreeSet<TaskName>) -> BTreeSet<TaskName> {
    let mut reverse: BTreeMap<TaskName, BTreeSet<TaskName>> = BTreeMap::new();
    for id in graph.nodes() {
        for dep in graph.dependencies(id) {
            reverse.entry(dep.task.clone()).or_default().insert(id.task.clone());
        }
    }

    let mut result: BTreeSet<TaskName> = seed.clone();
    let mut queue: VecDeque<TaskName> = seed.iter().cloned().collect();
    while let Some(name) = queue.pop_front() {
        if let Some(dependents) = reverse.get(&name) {
            for dependent in dependents {
                if result.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }
    result
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExpansionFlags {
    pub include_dependents: bool,
    pub include_dependencies: bool,
    pub exclude_self: bool,
}

/// Applies `--include-dependents`/`--include-dependencies`/`--exclude-self`
/// to a seed set of affected task names, in that order (spec.md §4.9).
pub fn expand(
    graph: &Graph<Built>,
    seed: BTreeSet<TaskName>,
    flags: ExpansionFlags,
) -> BTreeSet<TaskName> {
    let mut result = seed.clone();
    if flags.include_dependents {
        result.extend(expand_dependents(graph, &seed));
    }
    if flags.include_dependencies {
        result.extend(expand_dependencies(graph, &seed));
    }
    if flags.exclude_self {
        for name in &seed {
            result.remove(name);
        }
    }
    result
}

pub fn member_affected(member_root: &Path, changed: &BTreeSet<PathBuf>) -> bool {
    changed.iter().any(|p| p.starts_with(member_root))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use zr_graph::{GraphBuilder, RawTask};

    use super::*;

    fn name(s: &str) -> TaskName {
        TaskName::new(s).unwrap()
    }

    fn task(deps: &[&str]) -> RawTask {
        RawTask {
            cmd: Some("echo".to_string()),
            deps: Some(deps.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn sample_graph() -> Graph<Built> {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("lint"), task(&[]));
        tasks.insert(name("build"), task(&["lint"]));
        tasks.insert(name("test"), task(&["build"]));
        let templates = BTreeMap::new();
        GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("test")])
            .build()
            .unwrap()
    }

    #[test]
    fn member_root_under_changed_path_is_affected() {
        let changed: BTreeSet<PathBuf> = [PathBuf::from("packages/api/src/lib.rs")].into();
        assert!(member_affected(Path::new("packages/api"), &changed));
        assert!(!member_affected(Path::new("packages/web"), &changed));
    }

    #[test]
    fn dependents_expand_upward() {
        let graph = sample_graph();
        let seed: BTreeSet<TaskName> = [name("lint")].into();
        let expanded = expand_dependents(&graph, &seed);
        assert!(expanded.contains(&name("build")));
        assert!(expanded.contains(&name("test")));
    }

    #[test]
    fn dependencies_expand_downward() {
        let graph = sample_graph();
        let seed: BTreeSet<TaskName> = [name("test")].into();
        let expanded = expand_dependencies(&graph, &seed);
        assert!(expanded.contains(&name("build")));
        assert!(expanded.contains(&name("lint")));
    }

    #[test]
    fn exclude_self_drops_seed_after_expansion() {
        let graph = sample_graph();
        let seed: BTreeSet<TaskName> = [name("lint")].into();
        let result = expand(
            &graph,
            seed,
            ExpansionFlags {
                include_dependents: true,
                include_dependencies: false,
                exclude_self: true,
            },
        );
        assert!(!result.contains(&name("lint")));
        assert!(result.contains(&name("build")));
        assert!(result.contains(&name("test")));
    }

    #[test]
    fn cache_inputs_glob_marks_task_affected() {
        let mut tasks = BTreeMap::new();
        let mut t = task(&[]);
        t.cache = Some(zr_graph::CacheSpec {
            enabled: true,
            inputs: vec!["src/**/*.rs".to_string()],
            outputs: vec![],
            key: None,
        });
        tasks.insert(name("build"), t);
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        let changed: BTreeSet<PathBuf> = [PathBuf::from("src/main.rs")].into();
        let affected = affected_task_names(&graph, &BTreeMap::new(), &changed);
        assert!(affected.contains(&name("build")));
    }

    /// `zr affected <task>` scopes its result to the named task: when two
    /// unrelated tasks are both affected, asking about only one of them
    /// must not pull the other one in.
    #[test]
    fn affected_set_can_be_scoped_to_a_single_requested_task() {
        let both_match_everything = |deps: &[&str]| {
            let mut t = task(deps);
            t.cache = Some(zr_graph::CacheSpec {
                enabled: true,
                inputs: vec!["**/*.rs".to_string()],
                outputs: vec![],
                key: None,
            });
            t
        };
        let mut tasks = BTreeMap::new();
        tasks.insert(name("lint"), both_match_everything(&[]));
        tasks.insert(name("build"), both_match_everything(&[]));
        let templates = BTreeMap::new();
        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("lint"), name("build")])
            .build()
            .unwrap();

        let changed: BTreeSet<PathBuf> = [PathBuf::from("src/lib.rs")].into();

        // Both tasks are genuinely affected...
        let all_affected = affected_task_names(&graph, &BTreeMap::new(), &changed);
        assert!(all_affected.contains(&name("build")));
        assert!(all_affected.contains(&name("lint")));

        // ...but asking about "build" alone must not also surface "lint".
        let scoped: BTreeSet<TaskName> =
            if all_affected.contains(&name("build")) { [name("build")].into() } else { BTreeSet::new() };
        let result = expand(&graph, scoped, ExpansionFlags::default());
        assert!(result.contains(&name("build")));
        assert!(!result.contains(&name("lint")));
    }
}
