//! Produces the 256-bit content fingerprint of a Task Node, per spec.md
//! §4.3: a canonical, NUL-delimited serialization of the task's command,
//! working directory, restricted environment, matched input file contents,
//! dependency fingerprints, matrix coordinate, and optional cache key salt,
//! hashed with SHA-256.
//!
//! Grounded in `turborepo-lib`'s `hash::TurboHash` trait (`hash/traits.rs`):
//! that crate serializes a capnproto `Builder` and hashes it with xxhash. We
//! keep the same two-phase shape (serialize to a canonical buffer, then
//! hash it) but swap capnproto for a flat NUL-delimited record format and
//! xxhash for SHA-256, since spec.md requires a 256-bit digest and the
//! inputs here are already flat, not message-shaped.

mod canon;
mod globs;

use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use thiserror::Error;
use zr_graph::MaterializedTask;

pub use globs::InputRecord;

use canon::Canonical;

/// Bumped whenever the canonical serialization changes shape, so that an
/// upgrade invalidates every existing cache entry instead of silently
/// mismatching hashes against stale on-disk content.
pub const RUNNER_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("task {0} has no command and cannot be fingerprinted")]
    NoCommand(String),
}

/// Resolves the environment variables and `cache.inputs` file contents a
/// Task Node's fingerprint depends on, and produces the digest.
///
/// `env_values` is the full environment the task would execute with; only
/// the keys the task actually declares (or names via a `$NAME` entry in
/// `cache.inputs`) are folded into the fingerprint, per spec.md §4.3
/// category 3.
pub fn fingerprint(
    task: &MaterializedTask,
    env_values: &HashMap<String, String>,
    root: &Path,
    dependency_fingerprints: &[String],
) -> Result<String, FingerprintError> {
    let cmd = task
        .cmd
        .as_ref()
        .ok_or_else(|| FingerprintError::NoCommand(task.id.to_string()))?;

    let mut canonical = Canonical::new();
    canonical.push(RUNNER_VERSION.to_string());

    // 1. command string
    canonical.push(cmd);

    // 2. working directory
    canonical.push(task.cwd.as_deref().unwrap_or("."));

    // 3. restricted environment, sorted by name
    let (file_globs, env_filter_names) = split_input_entries(&task.cache.inputs);
    let mut env_keys: BTreeMap<&str, ()> = BTreeMap::new();
    for key in task.env.keys() {
        env_keys.insert(key.as_str(), ());
    }
    for name in &env_filter_names {
        env_keys.insert(name.as_str(), ());
    }
    for name in env_keys.keys() {
        let value = task
            .env
            .get(*name)
            .cloned()
            .or_else(|| env_values.get(*name).cloned())
            .unwrap_or_default();
        canonical.push_pair(name, &value);
    }

    // 4. sorted (relative_path, content_hash) tuples for matched inputs
    let input_records = globs::resolve_inputs(root, &file_globs);
    for record in &input_records {
        canonical.push(record.canonical_record());
    }

    // 5. sorted dependency fingerprints
    let mut deps = dependency_fingerprints.to_vec();
    deps.sort();
    for dep in &deps {
        canonical.push(dep);
    }

    // 6. matrix coordinate values in declaration order (stored sorted by
    // axis name, which is itself a stable declaration-independent order)
    for (axis, value) in task.id.coordinate.iter() {
        canonical.push_pair(axis, value);
    }

    // 7. explicit cache key salt
    if let Some(key) = &task.cache.key {
        canonical.push(key);
    }

    let digest = canonical.digest();
    tracing::debug!(task = %task.id, fingerprint = %digest, "computed fingerprint");
    Ok(digest)
}

fn split_input_entries(inputs: &[String]) -> (Vec<String>, Vec<String>) {
    let mut globs = Vec::new();
    let mut env_names = Vec::new();
    for entry in inputs {
        match entry.strip_prefix('$') {
            Some(name) => env_names.push(name.to_string()),
            None => globs.push(entry.clone()),
        }
    }
    (globs, env_names)
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::tempdir;
    use zr_graph::{BackoffKind, CacheSpec, RetryPolicy};
    use zr_task_id::{MatrixCoordinate, TaskName, TaskNodeId};

    use super::*;

    fn task(cmd: &str, cache_inputs: Vec<String>) -> MaterializedTask {
        MaterializedTask {
            id: TaskNodeId::unexpanded(TaskName::new("build").unwrap()),
            description: None,
            cmd: Some(cmd.to_string()),
            cwd: None,
            deps: vec![],
            deps_serial: vec![],
            env: BTreeMap::new(),
            timeout_ms: 0,
            retry: RetryPolicy { count: 0, backoff: BackoffKind::None },
            allow_failure: false,
            cache: CacheSpec {
                enabled: true,
                inputs: cache_inputs,
                outputs: vec![],
                key: None,
            },
            max_concurrent: None,
            max_cpu: None,
            max_memory: None,
            tags: Default::default(),
            toolchain: vec![],
            condition: None,
            template_params: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_inputs_produce_identical_fingerprint() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let t = task("echo hi", vec!["*.txt".to_string()]);

        let a = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();
        let b = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn changing_file_content_changes_fingerprint() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        let t = task("echo hi", vec!["*.txt".to_string()]);
        let before = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();

        fs::write(dir.path().join("a.txt"), b"world").unwrap();
        let after = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn env_filter_entry_folds_named_var_into_fingerprint() {
        let dir = tempdir().unwrap();
        let t = task("echo hi", vec!["$MY_VAR".to_string()]);

        let mut env_a = HashMap::new();
        env_a.insert("MY_VAR".to_string(), "1".to_string());
        let mut env_b = HashMap::new();
        env_b.insert("MY_VAR".to_string(), "2".to_string());

        let a = fingerprint(&t, &env_a, dir.path(), &[]).unwrap();
        let b = fingerprint(&t, &env_b, dir.path(), &[]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn dependency_fingerprint_order_does_not_matter() {
        let dir = tempdir().unwrap();
        let t = task("echo hi", vec![]);

        let a = fingerprint(&t, &HashMap::new(), dir.path(), &["x".to_string(), "y".to_string()]).unwrap();
        let b = fingerprint(&t, &HashMap::new(), dir.path(), &["y".to_string(), "x".to_string()]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn matrix_coordinate_changes_fingerprint() {
        let dir = tempdir().unwrap();
        let mut t = task("echo hi", vec![]);
        t.id = TaskNodeId::new(
            TaskName::new("build").unwrap(),
            MatrixCoordinate::from_pairs([("os".to_string(), "linux".to_string())]),
        );
        let with_coord = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();

        t.id = TaskNodeId::unexpanded(TaskName::new("build").unwrap());
        let without_coord = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();

        assert_ne!(with_coord, without_coord);
    }

    #[test]
    fn missing_command_is_rejected() {
        let dir = tempdir().unwrap();
        let mut t = task("echo hi", vec![]);
        t.cmd = None;
        assert!(fingerprint(&t, &HashMap::new(), dir.path(), &[]).is_err());
    }

    #[test]
    fn explicit_cache_key_salts_the_fingerprint() {
        let dir = tempdir().unwrap();
        let mut t = task("echo hi", vec![]);
        let without_key = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();

        t.cache.key = Some("salt".to_string());
        let with_key = fingerprint(&t, &HashMap::new(), dir.path(), &[]).unwrap();
        assert_ne!(without_key, with_key);
    }
}
