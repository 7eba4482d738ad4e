//! The Run Record, per spec.md §3: `(task name, matrix coord, start time,
//! end time, status, fingerprint, cache-hit flag)`.

use serde::{Deserialize, Serialize};
use zr_task_id::{MatrixCoordinate, TaskName};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    SucceededWithWarning,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub task: TaskName,
    #[serde(default)]
    pub coordinate: MatrixCoordinate,
    pub start_unix_ms: u128,
    pub end_unix_ms: u128,
    pub status: RunStatus,
    pub fingerprint: String,
    pub cache_hit: bool,
}

impl RunRecord {
    pub fn duration_ms(&self) -> u128 {
        self.end_unix_ms.saturating_sub(self.start_unix_ms)
    }
}
