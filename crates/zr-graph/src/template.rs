//! Template materialization (spec.md §4.5 rule 1): a task referencing a
//! template inherits the template's fields; task-local fields override.

use crate::types::RawTask;

/// Merges `task` over `template`: any field set on `task` wins; otherwise the
/// template's value is used; otherwise the field is left unset (callers
/// apply final defaults).
pub fn materialize(task: &RawTask, template: Option<&RawTask>) -> RawTask {
    let Some(template) = template else {
        return task.clone();
    };
    RawTask {
        description: task.description.clone().or_else(|| template.description.clone()),
        cmd: task.cmd.clone().or_else(|| template.cmd.clone()),
        cwd: task.cwd.clone().or_else(|| template.cwd.clone()),
        deps: task.deps.clone().or_else(|| template.deps.clone()),
        deps_serial: task
            .deps_serial
            .clone()
            .or_else(|| template.deps_serial.clone()),
        env: merge_env(task.env.as_ref(), template.env.as_ref()),
        timeout_ms: task.timeout_ms.or(template.timeout_ms),
        retry: task.retry.clone().or_else(|| template.retry.clone()),
        allow_failure: task.allow_failure.or(template.allow_failure),
        cache: task.cache.clone().or_else(|| template.cache.clone()),
        max_concurrent: task.max_concurrent.or(template.max_concurrent),
        max_cpu: task.max_cpu.or(template.max_cpu),
        max_memory: task.max_memory.or(template.max_memory),
        tags: task.tags.clone().or_else(|| template.tags.clone()),
        toolchain: task.toolchain.clone().or_else(|| template.toolchain.clone()),
        condition: task.condition.clone().or_else(|| template.condition.clone()),
        // matrix/template/template_params are task-local concerns, never
        // inherited from the template itself.
        matrix: task.matrix.clone(),
        template: task.template.clone(),
        template_params: task.template_params.clone(),
    }
}

fn merge_env(
    task_env: Option<&std::collections::BTreeMap<String, String>>,
    template_env: Option<&std::collections::BTreeMap<String, String>>,
) -> Option<std::collections::BTreeMap<String, String>> {
    match (task_env, template_env) {
        (None, None) => None,
        (Some(t), None) => Some(t.clone()),
        (None, Some(tpl)) => Some(tpl.clone()),
        (Some(t), Some(tpl)) => {
            let mut merged = tpl.clone();
            merged.extend(t.clone());
            Some(merged)
        }
    }
}
