//! Duration estimation from run history, per spec.md §4.10: read the last N
//! records for a task (default 10, `--limit k`), drop outliers beyond ±2σ,
//! and report mean and standard deviation in milliseconds.

use crate::{error::HistoryError, record::RunRecord};

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationEstimate {
    pub mean_ms: f64,
    pub stddev_ms: f64,
    /// How many of the windowed records survived outlier trimming.
    pub sample_count: usize,
}

/// `records` should already be windowed to the task of interest (e.g. via
/// `HistoryStore::for_task`); an empty slice reports
/// [`HistoryError::NoHistory`].
pub fn estimate(task: &str, records: &[RunRecord]) -> Result<DurationEstimate, HistoryError> {
    if records.is_empty() {
        return Err(HistoryError::NoHistory(task.to_string()));
    }

    let durations: Vec<f64> = records.iter().map(|r| r.duration_ms() as f64).collect();
    let (mean, stddev) = mean_and_stddev(&durations);

    let trimmed: Vec<f64> = if stddev == 0.0 {
        durations
    } else {
        durations
            .into_iter()
            .filter(|d| (d - mean).abs() <= 2.0 * stddev)
            .collect()
    };
    // Every sample lies within its own ±2σ band only when trimming would
    // empty the set (e.g. two widely separated points); fall back to the
    // untrimmed set rather than reporting a history-less estimate.
    let (mean_ms, stddev_ms, sample_count) = if trimmed.is_empty() {
        (mean, stddev, durations_len(records))
    } else {
        let (m, s) = mean_and_stddev(&trimmed);
        (m, s, trimmed.len())
    };

    Ok(DurationEstimate {
        mean_ms,
        stddev_ms,
        sample_count,
    })
}

fn durations_len(records: &[RunRecord]) -> usize {
    records.len()
}

fn mean_and_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod test {
    use zr_task_id::{MatrixCoordinate, TaskName};

    use super::*;
    use crate::record::RunStatus;

    fn record(duration_ms: u128) -> RunRecord {
        RunRecord {
            task: TaskName::new("build").unwrap(),
            coordinate: MatrixCoordinate::empty(),
            start_unix_ms: 0,
            end_unix_ms: duration_ms,
            status: RunStatus::Succeeded,
            fingerprint: "f".to_string(),
            cache_hit: false,
        }
    }

    #[test]
    fn empty_records_report_no_history() {
        let err = estimate("build", &[]).unwrap_err();
        assert!(matches!(err, HistoryError::NoHistory(task) if task == "build"));
    }

    #[test]
    fn uniform_durations_have_zero_stddev() {
        let records: Vec<_> = std::iter::repeat(record(100)).take(5).collect();
        let result = estimate("build", &records).unwrap();
        assert_eq!(result.mean_ms, 100.0);
        assert_eq!(result.stddev_ms, 0.0);
        assert_eq!(result.sample_count, 5);
    }

    #[test]
    fn far_outlier_is_dropped_from_the_mean() {
        let mut records: Vec<_> = std::iter::repeat(record(100)).take(9).collect();
        records.push(record(100_000));
        let result = estimate("build", &records).unwrap();
        assert!(result.mean_ms < 200.0, "mean was {}", result.mean_ms);
        assert_eq!(result.sample_count, 9);
    }
}
