//! Assembles the task DAG: template materialization, matrix expansion,
//! dependency resolution, cycle detection, transitive closure, and
//! Kahn's-algorithm leveling (spec.md §4.5).
//!
//! The typestate split (`Graph<Building>` / `Graph<Built>`) mirrors the
//! teacher's `Engine<Building>`/`Engine<Built>` (`engine/mod.rs`): the graph
//! is mutable while nodes are being discovered and immutable once sealed.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use thiserror::Error;
use zr_task_id::{TaskName, TaskNodeId};

use crate::matrix;
use crate::template;
use crate::types::{CacheSpec, MaterializedTask, RawTask, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskNode {
    Root,
    Task(TaskNodeId),
}

#[derive(Debug, Default)]
pub struct Building;
#[derive(Debug, Default)]
pub struct Built;

#[derive(Debug)]
pub struct Graph<S = Built> {
    marker: std::marker::PhantomData<S>,
    graph: petgraph::Graph<TaskNode, ()>,
    root_index: NodeIndex,
    node_lookup: HashMap<TaskNodeId, NodeIndex>,
    materialized: HashMap<TaskNodeId, MaterializedTask>,
    levels: Vec<Vec<TaskNodeId>>,
}

impl Graph<Built> {
    pub fn levels(&self) -> &[Vec<TaskNodeId>] {
        &self.levels
    }

    pub fn task(&self, id: &TaskNodeId) -> Option<&MaterializedTask> {
        self.materialized.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNodeId> {
        self.materialized.keys()
    }

    /// Direct dependency node ids of `id` (deps and deps_serial combined, as
    /// resolved in the DAG). Used by the scheduler to decide admission.
    pub fn dependencies(&self, id: &TaskNodeId) -> Vec<&TaskNodeId> {
        let Some(&index) = self.node_lookup.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(index, petgraph::Direction::Outgoing)
            .filter_map(|n| match self.graph.node_weight(n) {
                Some(TaskNode::Task(dep_id)) => Some(dep_id),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("task '{0}' is not defined")]
    UnknownTask(String),
    #[error("template '{0}' is not defined")]
    UnknownTemplate(String),
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("task '{task}' references unknown dependency '{dep}'")]
    MissingDependency { task: String, dep: String },
}

pub struct GraphBuilder<'a> {
    tasks: &'a BTreeMap<TaskName, RawTask>,
    templates: &'a BTreeMap<String, RawTask>,
    requested: Vec<TaskName>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(
        tasks: &'a BTreeMap<TaskName, RawTask>,
        templates: &'a BTreeMap<String, RawTask>,
    ) -> Self {
        Self {
            tasks,
            templates,
            requested: Vec::new(),
        }
    }

    pub fn with_requested(mut self, requested: Vec<TaskName>) -> Self {
        self.requested = requested;
        self
    }

    pub fn build(self) -> Result<Graph<Built>, BuilderError> {
        detect_cycles(self.tasks)?;

        let closure = transitive_closure(self.tasks, &self.requested)?;

        let mut materialized_by_name: BTreeMap<TaskName, RawTask> = BTreeMap::new();
        for name in &closure {
            let raw = self.tasks.get(name).expect("closure only contains known tasks");
            let template = match &raw.template {
                Some(name) => Some(
                    self.templates
                        .get(name)
                        .ok_or_else(|| BuilderError::UnknownTemplate(name.clone()))?,
                ),
                None => None,
            };
            materialized_by_name.insert(name.clone(), template::materialize(raw, template));
        }

        let mut graph = petgraph::Graph::new();
        let root_index = graph.add_node(TaskNode::Root);
        let mut node_lookup: HashMap<TaskNodeId, NodeIndex> = HashMap::new();
        let mut materialized: HashMap<TaskNodeId, MaterializedTask> = HashMap::new();
        let mut expansions: HashMap<&TaskName, Vec<TaskNodeId>> = HashMap::new();

        for name in &closure {
            let raw = &materialized_by_name[name];
            let axes = raw.matrix.clone().unwrap_or_default();
            let coordinates = matrix::expand(&axes);
            let mut ids = Vec::with_capacity(coordinates.len());
            for coordinate in coordinates {
                let id = TaskNodeId::new(name.clone(), coordinate);
                let index = get_or_insert(&mut graph, &mut node_lookup, id.clone());
                let _ = index;
                ids.push(id.clone());
                materialized.insert(id.clone(), to_materialized(id, raw));
            }
            expansions.insert(name, ids);
        }

        for name in &closure {
            let raw = &materialized_by_name[name];
            let own_ids = expansions[name].clone();

            let parallel_deps = raw.deps.clone().unwrap_or_default();
            for dep_name_str in &parallel_deps {
                let dep_name = resolve_dep(self.tasks, dep_name_str)?;
                let dep_ids = expansions.get(&dep_name).cloned().unwrap_or_else(|| {
                    vec![TaskNodeId::unexpanded(dep_name.clone())]
                });
                for own in &own_ids {
                    for dep in &dep_ids {
                        link(&mut graph, &mut node_lookup, own.clone(), dep.clone());
                    }
                }
            }

            let serial_deps = raw.deps_serial.clone().unwrap_or_default();
            let mut prev_ids: Option<Vec<TaskNodeId>> = None;
            for dep_name_str in &serial_deps {
                let dep_name = resolve_dep(self.tasks, dep_name_str)?;
                let dep_ids = expansions.get(&dep_name).cloned().unwrap_or_else(|| {
                    vec![TaskNodeId::unexpanded(dep_name.clone())]
                });
                if let Some(prev) = &prev_ids {
                    for cur in &dep_ids {
                        for p in prev {
                            link(&mut graph, &mut node_lookup, cur.clone(), p.clone());
                        }
                    }
                }
                prev_ids = Some(dep_ids);
            }
            if let Some(last) = prev_ids {
                for own in &own_ids {
                    for dep in &last {
                        link(&mut graph, &mut node_lookup, own.clone(), dep.clone());
                    }
                }
            }

            if parallel_deps.is_empty() && serial_deps.is_empty() {
                for own in &own_ids {
                    let index = node_lookup[own];
                    graph.add_edge(index, root_index, ());
                }
            }
        }

        let levels = level_order(&graph, root_index, &node_lookup);
        tracing::debug!(task_count = materialized.len(), level_count = levels.len(), "graph built");

        Ok(Graph {
            marker: std::marker::PhantomData,
            graph,
            root_index,
            node_lookup,
            materialized,
            levels,
        })
    }
}

fn get_or_insert(
    graph: &mut petgraph::Graph<TaskNode, ()>,
    lookup: &mut HashMap<TaskNodeId, NodeIndex>,
    id: TaskNodeId,
) -> NodeIndex {
    *lookup
        .entry(id.clone())
        .or_insert_with(|| graph.add_node(TaskNode::Task(id)))
}

fn link(
    graph: &mut petgraph::Graph<TaskNode, ()>,
    lookup: &mut HashMap<TaskNodeId, NodeIndex>,
    from: TaskNodeId,
    to: TaskNodeId,
) {
    let from_index = get_or_insert(graph, lookup, from);
    let to_index = get_or_insert(graph, lookup, to);
    if !graph.contains_edge(from_index, to_index) {
        graph.add_edge(from_index, to_index, ());
    }
}

/// A dependency reference may name a workspace member's task explicitly
/// (`member::task`, per the member-then-root resolution order of spec.md
/// §4.5 rule 3) or a bare task name already resolved by the Config Model's
/// overlay merge. Since the flattened task map this crate receives has
/// already had member overlay precedence applied, resolution here is a
/// simple lookup of the bare name.
fn resolve_dep(
    tasks: &BTreeMap<TaskName, RawTask>,
    dep: &str,
) -> Result<TaskName, BuilderError> {
    let bare = dep.rsplit("::").next().unwrap_or(dep);
    let name = TaskName::new(bare).map_err(|_| BuilderError::MissingDependency {
        task: String::new(),
        dep: dep.to_string(),
    })?;
    if tasks.contains_key(&name) {
        Ok(name)
    } else {
        Err(BuilderError::UnknownTask(dep.to_string()))
    }
}

fn to_materialized(id: TaskNodeId, raw: &RawTask) -> MaterializedTask {
    let deps = raw
        .deps
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|d| TaskName::new(d.rsplit("::").next().unwrap_or(&d)).ok())
        .collect();
    let deps_serial = raw
        .deps_serial
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|d| TaskName::new(d.rsplit("::").next().unwrap_or(&d)).ok())
        .collect();
    MaterializedTask {
        id,
        description: raw.description.clone(),
        cmd: raw.cmd.clone(),
        cwd: raw.cwd.clone(),
        deps,
        deps_serial,
        env: raw.env.clone().unwrap_or_default(),
        timeout_ms: raw.timeout_ms.unwrap_or(0),
        retry: raw.retry.clone().unwrap_or(RetryPolicy { count: 0, backoff: Default::default() }),
        allow_failure: raw.allow_failure.unwrap_or(false),
        cache: raw.cache.clone().unwrap_or(CacheSpec { enabled: false, ..Default::default() }),
        max_concurrent: raw.max_concurrent,
        max_cpu: raw.max_cpu,
        max_memory: raw.max_memory,
        tags: raw.tags.clone().unwrap_or_default(),
        toolchain: raw.toolchain.clone().unwrap_or_default(),
        condition: raw.condition.clone(),
        template_params: raw.template_params.clone().unwrap_or_default(),
    }
}

/// DFS cycle detection over the flat, pre-expansion task-name graph (spec.md
/// §4.5 rule 4). Matrix expansion only multiplies nodes per name; it never
/// introduces a node-level cycle that isn't already present at the name
/// level, so checking here is sufficient and lets us report a short,
/// human-readable cycle instead of a list of matrix-qualified ids.
fn detect_cycles(tasks: &BTreeMap<TaskName, RawTask>) -> Result<(), BuilderError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut marks: HashMap<&TaskName, Mark> = HashMap::new();
    let mut stack: Vec<&TaskName> = Vec::new();

    fn visit<'a>(
        name: &'a TaskName,
        tasks: &'a BTreeMap<TaskName, RawTask>,
        marks: &mut HashMap<&'a TaskName, Mark>,
        stack: &mut Vec<&'a TaskName>,
    ) -> Result<(), BuilderError> {
        if let Some(Mark::Done) = marks.get(name) {
            return Ok(());
        }
        if let Some(Mark::Visiting) = marks.get(name) {
            let start = stack.iter().position(|n| *n == name).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(name.to_string());
            return Err(BuilderError::Cycle(cycle));
        }
        marks.insert(name, Mark::Visiting);
        stack.push(name);
        if let Some(raw) = tasks.get(name) {
            let mut deps = raw.deps.clone().unwrap_or_default();
            deps.extend(raw.deps_serial.clone().unwrap_or_default());
            for dep in deps {
                let bare = dep.rsplit("::").next().unwrap_or(&dep);
                if let Ok(dep_name) = TaskName::new(bare) {
                    if let Some((key, _)) = tasks.get_key_value(&dep_name) {
                        visit(key, tasks, marks, stack)?;
                    }
                }
            }
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    for name in tasks.keys() {
        visit(name, tasks, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// All task names reachable from `requested` via deps/deps_serial, plus the
/// requested names themselves (spec.md §4.5 rule 5).
fn transitive_closure(
    tasks: &BTreeMap<TaskName, RawTask>,
    requested: &[TaskName],
) -> Result<HashSet<TaskName>, BuilderError> {
    let mut seen = HashSet::new();
    let mut queue: VecDeque<TaskName> = VecDeque::new();
    for name in requested {
        if !tasks.contains_key(name) {
            return Err(BuilderError::UnknownTask(name.to_string()));
        }
        queue.push_back(name.clone());
    }
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let raw = &tasks[&name];
        let mut deps = raw.deps.clone().unwrap_or_default();
        deps.extend(raw.deps_serial.clone().unwrap_or_default());
        for dep in deps {
            let dep_name = resolve_dep(tasks, &dep)?;
            queue.push_back(dep_name);
        }
    }
    Ok(seen)
}

/// Kahn's algorithm leveling (spec.md §4.5 rule 6): level(node) = 1 +
/// max(level of any dependency); Root is level 0 and excluded from output.
fn level_order(
    graph: &petgraph::Graph<TaskNode, ()>,
    root_index: NodeIndex,
    node_lookup: &HashMap<TaskNodeId, NodeIndex>,
) -> Vec<Vec<TaskNodeId>> {
    let mut level_of: HashMap<NodeIndex, usize> = HashMap::new();
    level_of.insert(root_index, 0);

    let mut remaining_incoming: HashMap<NodeIndex, usize> = HashMap::new();
    for index in graph.node_indices() {
        remaining_incoming.insert(
            index,
            graph
                .neighbors_directed(index, petgraph::Direction::Outgoing)
                .count(),
        );
    }

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|i| remaining_incoming[i] == 0)
        .collect();

    let mut ready_count: HashMap<NodeIndex, usize> = HashMap::new();

    while let Some(index) = queue.pop_front() {
        let level = graph
            .neighbors_directed(index, petgraph::Direction::Outgoing)
            .map(|dep| level_of.get(&dep).copied().unwrap_or(0))
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        level_of.insert(index, level);

        for dependent in graph.neighbors_directed(index, petgraph::Direction::Incoming) {
            let total = graph
                .neighbors_directed(dependent, petgraph::Direction::Outgoing)
                .count();
            let count = ready_count.entry(dependent).or_insert(0);
            *count += 1;
            if *count == total {
                queue.push_back(dependent);
            }
        }
    }

    let max_level = level_of.values().copied().max().unwrap_or(0);
    let mut levels: Vec<Vec<TaskNodeId>> = vec![Vec::new(); max_level + 1];
    for (id, index) in node_lookup {
        let level = level_of.get(index).copied().unwrap_or(0);
        levels[level].push(id.clone());
    }
    for level in &mut levels {
        level.sort();
    }
    // Level 0 is reserved for Root (no task ever computes to level 0 since
    // every task has at least one outgoing edge, directly or via root).
    if levels.first().map_or(false, |l| l.is_empty()) {
        levels.remove(0);
    }
    levels
}

#[cfg(test)]
mod test {
    use super::*;

    fn task(deps: &[&str]) -> RawTask {
        RawTask {
            cmd: Some("echo".to_string()),
            deps: Some(deps.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    fn name(s: &str) -> TaskName {
        TaskName::new(s).unwrap()
    }

    #[test]
    fn builds_simple_chain_with_levels() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("prepare"), task(&[]));
        tasks.insert(name("build"), task(&["prepare"]));
        tasks.insert(name("test"), task(&["build"]));
        let templates = BTreeMap::new();

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("test")])
            .build()
            .unwrap();

        assert_eq!(graph.levels().len(), 3);
        assert_eq!(graph.levels()[0][0].task, name("prepare"));
        assert_eq!(graph.levels()[1][0].task, name("build"));
        assert_eq!(graph.levels()[2][0].task, name("test"));
    }

    #[test]
    fn self_referential_dep_is_a_cycle() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("loop"), task(&["loop"]));
        let templates = BTreeMap::new();
        let result = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("loop")])
            .build();
        assert!(matches!(result, Err(BuilderError::Cycle(_))));
    }

    #[test]
    fn indirect_cycle_is_detected() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("a"), task(&["b"]));
        tasks.insert(name("b"), task(&["a"]));
        let templates = BTreeMap::new();
        let result = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("a")])
            .build();
        assert!(matches!(result, Err(BuilderError::Cycle(_))));
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("build"), task(&["does-not-exist"]));
        let templates = BTreeMap::new();
        let result = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn matrix_expands_into_multiple_nodes_same_level() {
        let mut tasks = BTreeMap::new();
        let mut matrixed = task(&[]);
        matrixed.matrix = Some(
            [("os".to_string(), vec!["linux".to_string(), "macos".to_string()])]
                .into_iter()
                .collect(),
        );
        tasks.insert(name("build"), matrixed);
        let templates = BTreeMap::new();

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        assert_eq!(graph.levels().len(), 1);
        assert_eq!(graph.levels()[0].len(), 2);
    }

    #[test]
    fn template_fields_are_inherited() {
        let mut templates = BTreeMap::new();
        templates.insert(
            "base".to_string(),
            RawTask {
                cmd: Some("from template".to_string()),
                ..Default::default()
            },
        );
        let mut tasks = BTreeMap::new();
        tasks.insert(
            name("build"),
            RawTask {
                template: Some("base".to_string()),
                ..Default::default()
            },
        );

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        let id = TaskNodeId::unexpanded(name("build"));
        assert_eq!(graph.task(&id).unwrap().cmd.as_deref(), Some("from template"));
    }

    #[test]
    fn serial_deps_chain_in_order() {
        let mut tasks = BTreeMap::new();
        let mut t = task(&[]);
        t.deps_serial = Some(vec!["step1".to_string(), "step2".to_string()]);
        tasks.insert(name("deploy"), t);
        tasks.insert(name("step1"), task(&[]));
        tasks.insert(name("step2"), task(&[]));
        let templates = BTreeMap::new();

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("deploy")])
            .build()
            .unwrap();

        // step1 must come before step2, which must come before deploy.
        assert_eq!(graph.levels()[0][0].task, name("step1"));
        assert_eq!(graph.levels()[1][0].task, name("step2"));
        assert_eq!(graph.levels()[2][0].task, name("deploy"));
    }

    #[test]
    fn transitive_closure_excludes_unrelated_tasks() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("a"), task(&[]));
        tasks.insert(name("b"), task(&[]));
        let templates = BTreeMap::new();

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("a")])
            .build()
            .unwrap();

        assert!(graph.task(&TaskNodeId::unexpanded(name("a"))).is_some());
        assert!(graph.task(&TaskNodeId::unexpanded(name("b"))).is_none());
    }

    #[test]
    fn member_qualified_dep_resolves_to_bare_name() {
        let mut tasks = BTreeMap::new();
        tasks.insert(name("build"), task(&["pkg-a::compile"]));
        tasks.insert(name("compile"), task(&[]));
        let templates = BTreeMap::new();

        let graph = GraphBuilder::new(&tasks, &templates)
            .with_requested(vec![name("build")])
            .build()
            .unwrap();

        assert_eq!(graph.levels().len(), 2);
    }
}
