//! Append-only run-history log, per spec.md §4.10.
//!
//! Grounded in `run/summary/` (`task.rs`, `execution.rs`), generalized from a
//! single run's in-memory summary into a durable, cross-run JSON-lines file:
//! one [`RunRecord`] per line, appended after every task run. Readers discard
//! an unparsable trailing line rather than failing outright, since a record
//! can be left half-written if the process is killed mid-append.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use zr_task_id::TaskName;

use crate::{error::HistoryError, record::RunRecord};

const LOG_FILE_NAME: &str = "runs.log";

pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// `history_dir` is the `<root>/.zr/history/` directory; it is created if
    /// missing.
    pub fn open(history_dir: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let history_dir = history_dir.as_ref();
        std::fs::create_dir_all(history_dir)?;
        Ok(Self {
            path: history_dir.join(LOG_FILE_NAME),
        })
    }

    pub fn append(&self, record: &RunRecord) -> Result<(), HistoryError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")?;
        tracing::debug!(task = %record.task, "appended run record");
        Ok(())
    }

    /// All well-formed records in append order. A trailing line that fails to
    /// parse is silently discarded; any earlier malformed line is also
    /// skipped rather than aborting the whole read, since the log is a
    /// best-effort audit trail, not a transactional store.
    pub fn read_all(&self) -> Result<Vec<RunRecord>, HistoryError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let reader = BufReader::new(file);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let mut records = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let is_last = i + 1 == lines.len();
                    if is_last {
                        tracing::debug!("discarding partial trailing history record");
                    } else {
                        tracing::debug!(error = %err, "discarding malformed history record");
                    }
                }
            }
        }
        Ok(records)
    }

    /// The most recent `limit` records for `task`, oldest first.
    pub fn for_task(&self, task: &TaskName, limit: usize) -> Result<Vec<RunRecord>, HistoryError> {
        let mut matching: Vec<RunRecord> = self
            .read_all()?
            .into_iter()
            .filter(|r| &r.task == task)
            .collect();
        if matching.len() > limit {
            matching.drain(0..matching.len() - limit);
        }
        Ok(matching)
    }
}
