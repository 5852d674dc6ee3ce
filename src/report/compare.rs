//! Comparison of a run against a baseline report from an earlier revision.

use serde::{Deserialize, Serialize};

use super::{human_size, HarnessReport};

/// Change in timing and database size for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDelta {
    pub dataset: String,
    pub baseline_secs: Option<f64>,
    pub current_secs: Option<f64>,
    pub baseline_size: Option<u64>,
    pub current_size: Option<u64>,
}

impl DatasetDelta {
    /// Relative change in elapsed time, in percent.
    pub fn time_change_pct(&self) -> Option<f64> {
        match (self.baseline_secs, self.current_secs) {
            (Some(before), Some(after)) if before > 0.0 => Some((after - before) / before * 100.0),
            _ => None,
        }
    }

    /// Absolute change in database size, in bytes.
    pub fn size_change(&self) -> Option<i64> {
        match (self.baseline_size, self.current_size) {
            (Some(before), Some(after)) => Some(after as i64 - before as i64),
            _ => None,
        }
    }

    /// One line for the comparison table.
    pub fn line(&self) -> String {
        let time = match (self.baseline_secs, self.current_secs, self.time_change_pct()) {
            (Some(b), Some(c), Some(pct)) => format!("{:.1}s -> {:.1}s ({:+.1}%)", b, c, pct),
            (Some(b), Some(c), None) => format!("{:.1}s -> {:.1}s", b, c),
            (None, Some(c), _) => format!("new, {:.1}s", c),
            (Some(b), None, _) => format!("{:.1}s -> not passed", b),
            (None, None, _) => "not passed".to_string(),
        };
        let size = match (self.size_change(), self.current_size) {
            (Some(0), Some(now)) => format!("size {} (unchanged)", human_size(now)),
            (Some(delta), Some(now)) => {
                let sign = if delta < 0 { "-" } else { "+" };
                format!("size {} ({}{})", human_size(now), sign, human_size(delta.unsigned_abs()))
            }
            (_, Some(now)) => format!("size {}", human_size(now)),
            (_, None) => String::new(),
        };
        format!("  {:<60} {} {}", self.dataset, time, size).trim_end().to_string()
    }
}

/// Pairs each dataset of `current` with its entry in `baseline`.
///
/// Only passed records contribute measurements. Datasets present only in
/// the baseline are listed after the current ones.
pub fn compare(baseline: &HarnessReport, current: &HarnessReport) -> Vec<DatasetDelta> {
    let measured = |report: &HarnessReport, dataset: &str| {
        report
            .records
            .iter()
            .find(|r| r.dataset == dataset && r.is_passed())
            .map(|r| (r.elapsed_secs(), r.size_bytes))
    };

    let mut deltas: Vec<DatasetDelta> = current
        .records
        .iter()
        .map(|r| {
            let before = measured(baseline, &r.dataset);
            let after = measured(current, &r.dataset);
            DatasetDelta {
                dataset: r.dataset.clone(),
                baseline_secs: before.map(|(secs, _)| secs),
                current_secs: after.map(|(secs, _)| secs),
                baseline_size: before.and_then(|(_, size)| size),
                current_size: after.and_then(|(_, size)| size),
            }
        })
        .collect();

    for r in &baseline.records {
        if current.records.iter().any(|c| c.dataset == r.dataset) {
            continue;
        }
        let before = measured(baseline, &r.dataset);
        deltas.push(DatasetDelta {
            dataset: r.dataset.clone(),
            baseline_secs: before.map(|(secs, _)| secs),
            current_secs: None,
            baseline_size: before.and_then(|(_, size)| size),
            current_size: None,
        });
    }
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{ExecutionRecord, FailureReason, Verdict};
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::Duration;

    fn record(id: &str, secs: f64, size: Option<u64>) -> ExecutionRecord {
        let mut r = ExecutionRecord::pending(id);
        r.start(PathBuf::from(id), PathBuf::from("db"));
        r.elapsed = Duration::from_secs_f64(secs);
        match size {
            Some(size_bytes) => r.apply(Verdict::Passed { size_bytes }),
            None => r.fail(FailureReason::NonZeroExit { code: Some(1) }),
        }
        r
    }

    fn report(records: Vec<ExecutionRecord>) -> HarnessReport {
        HarnessReport::new("run", Utc::now(), PathBuf::from("/data"), None, records)
    }

    #[test]
    fn test_compare_pairs_by_dataset() {
        let baseline = report(vec![
            record("A", 10.0, Some(1000)),
            record("B", 4.0, Some(2048)),
            record("gone", 1.0, Some(1)),
        ]);
        let current = report(vec![
            record("A", 12.0, Some(1500)),
            record("B", 3.0, None),
            record("new", 2.0, Some(10)),
        ]);

        let deltas = compare(&baseline, &current);
        let ids: Vec<_> = deltas.iter().map(|d| d.dataset.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "new", "gone"]);

        let a = &deltas[0];
        assert!((a.time_change_pct().unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(a.size_change(), Some(500));

        let b = &deltas[1];
        assert_eq!(b.baseline_secs, Some(4.0));
        assert_eq!(b.current_secs, None);
        assert_eq!(b.time_change_pct(), None);

        assert_eq!(deltas[2].baseline_secs, None);
        assert_eq!(deltas[3].current_secs, None);
    }

    #[test]
    fn test_delta_line() {
        let delta = DatasetDelta {
            dataset: "A".to_string(),
            baseline_secs: Some(10.0),
            current_secs: Some(9.0),
            baseline_size: Some(2048),
            current_size: Some(1024),
        };
        let line = delta.line();
        assert!(line.contains("10.0s -> 9.0s (-10.0%)"));
        assert!(line.contains("size 1.0 KiB (-1.0 KiB)"));

        let unchanged = DatasetDelta {
            baseline_size: Some(1024),
            ..delta
        };
        assert!(unchanged.line().contains("(unchanged)"));
    }
}
