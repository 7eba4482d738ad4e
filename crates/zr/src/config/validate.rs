//! Validation enumerated by spec.md §4.1: task names, non-empty commands,
//! dependency/template/workflow-task references, matrix axes, and workflow
//! stage-graph acyclicity. Runs over the merged (pre-conversion) layer so
//! `run` and `validate` reject exactly the same configurations (spec.md §8
//! testable property 4).

use std::collections::{HashMap, HashSet};

use zr_task_id::TaskName;

use super::error::{ValidationError, ValidationWarning};
use super::processed::Layer;
use super::raw::RawTaskToml;

fn bare(dep: &str) -> &str {
    dep.rsplit("::").next().unwrap_or(dep)
}

pub fn validate(layer: &Layer, strict: bool) -> (Vec<ValidationError>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (name, task) in &layer.tasks {
        if let Err(e) = TaskName::new(name.clone()) {
            errors.push(ValidationError::BadTaskName(name.clone(), e.to_string()));
            continue;
        }
        validate_task(name, task, layer, &mut errors, &mut warnings, strict);
    }

    for (workflow_name, workflow) in &layer.workflows {
        validate_workflow(workflow_name, workflow, layer, &mut errors);
    }

    (errors, warnings)
}

fn validate_task(
    name: &str,
    task: &RawTaskToml,
    layer: &Layer,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<ValidationWarning>,
    strict: bool,
) {
    // A task may omit `cmd` only when it purely composes others via deps.
    if let Some(cmd) = &task.cmd {
        if cmd.trim().is_empty() {
            errors.push(ValidationError::EmptyCommand(name.to_string()));
        }
    }

    for dep in task.deps.iter().flatten().chain(task.deps_serial.iter().flatten()) {
        let dep_name = bare(dep);
        if dep_name == name {
            errors.push(ValidationError::UnknownDependency {
                task: name.to_string(),
                dep: dep.clone(),
            });
        } else if !layer.tasks.contains_key(dep_name) {
            errors.push(ValidationError::UnknownDependency {
                task: name.to_string(),
                dep: dep.clone(),
            });
        }
    }

    if let Some(template) = &task.template {
        if !layer.templates.contains_key(template) {
            errors.push(ValidationError::UnknownTemplate {
                task: name.to_string(),
                template: template.clone(),
            });
        }
    }

    if let Some(matrix) = &task.matrix {
        for (axis, values) in matrix {
            if values.is_empty() {
                errors.push(ValidationError::EmptyMatrixAxis {
                    task: name.to_string(),
                    axis: axis.clone(),
                });
            }
        }
    }

    if strict {
        if task.description.is_none() {
            warnings.push(ValidationWarning::MissingDescription(name.to_string()));
        }
        if matches!(&task.deps, Some(d) if d.is_empty()) {
            warnings.push(ValidationWarning::ExplicitEmptyDeps(name.to_string()));
        }
    }
}

fn validate_workflow(
    workflow_name: &str,
    workflow: &super::raw::RawWorkflow,
    layer: &Layer,
    errors: &mut Vec<ValidationError>,
) {
    let stage_names: HashSet<String> = workflow
        .stages
        .iter()
        .enumerate()
        .map(|(i, s)| s.name.clone().unwrap_or_else(|| format!("stage-{i}")))
        .collect();

    let mut redirect: HashMap<String, String> = HashMap::new();
    for (i, stage) in workflow.stages.iter().enumerate() {
        let stage_name = stage.name.clone().unwrap_or_else(|| format!("stage-{i}"));
        for task in &stage.tasks {
            if !layer.tasks.contains_key(bare(task)) {
                errors.push(ValidationError::UnknownWorkflowTask {
                    workflow: workflow_name.to_string(),
                    task: task.clone(),
                });
            }
        }
        if let Some(target) = &stage.on_failure {
            if !stage_names.contains(target) {
                errors.push(ValidationError::UnknownRedirectTarget {
                    workflow: workflow_name.to_string(),
                    stage: stage_name.clone(),
                    target: target.clone(),
                });
            } else {
                redirect.insert(stage_name.clone(), target.clone());
            }
        }
    }

    if let Some(cycle) = find_redirect_cycle(&redirect) {
        errors.push(ValidationError::StageCycle(workflow_name.to_string(), cycle));
    }
}

fn find_redirect_cycle(redirect: &HashMap<String, String>) -> Option<Vec<String>> {
    for start in redirect.keys() {
        let mut path = vec![start.clone()];
        let mut current = start;
        while let Some(next) = redirect.get(current) {
            if let Some(pos) = path.iter().position(|s| s == next) {
                return Some(path[pos..].iter().cloned().chain([next.clone()]).collect());
            }
            path.push(next.clone());
            current = next;
        }
    }
    None
}
