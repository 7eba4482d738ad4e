//! The in-memory shape of one Cache Entry: captured stdout/stderr, exit
//! code, and the set of output files a task produced, per spec.md §3's Cache
//! Entry definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One captured output file, keyed by its path relative to the task's
/// working directory.
pub type Outputs = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub fingerprint: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
    pub outputs: Outputs,
}

impl Entry {
    pub fn new(fingerprint: impl Into<String>, exit_code: i32) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code,
            outputs: Outputs::new(),
        }
    }
}

/// The on-disk `meta` record: just enough to verify an entry wasn't
/// truncated or corrupted without re-reading every output file's bytes
/// against the live fingerprint algorithm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub fingerprint: String,
    pub exit_code: i32,
    pub digest: String,
    pub output_paths: Vec<String>,
    pub created_at_unix_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearSummary {
    pub entries_removed: usize,
    pub bytes_removed: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub entries: usize,
    pub bytes: u64,
    pub oldest: Option<u128>,
    pub newest: Option<u128>,
}
