//! Shared descriptive statistics
//!
//! Sample statistics use the `max(n - 1, 1)` denominator so one-point series
//! yield a zero deviation instead of dividing by zero.

/// Mean and sample standard deviation of a series
pub fn mean_sample_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / n.saturating_sub(1).max(1) as f64;

    (mean, variance.sqrt())
}

/// Standard score of `value`; callers must ensure `std > 0`
pub fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    (value - mean) / std
}

/// A maximal run of consecutive flagged positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlaggedRun {
    /// First position in the run
    pub start: usize,
    /// Last position in the run (inclusive)
    pub end: usize,
    /// Position of the run's largest value (earliest on ties)
    pub peak: usize,
}

/// Merge consecutive flagged positions into runs, in positional order.
///
/// `values` and `flags` are parallel; adjacency is purely positional.
pub fn flagged_runs<V: PartialOrd>(values: &[V], flags: &[bool]) -> Vec<FlaggedRun> {
    debug_assert_eq!(values.len(), flags.len());

    let mut runs = Vec::new();
    let mut current: Option<FlaggedRun> = None;

    for (i, &flagged) in flags.iter().enumerate() {
        if !flagged {
            runs.extend(current.take());
            continue;
        }
        match current.as_mut() {
            Some(run) => {
                run.end = i;
                if values[i] > values[run.peak] {
                    run.peak = i;
                }
            }
            None => {
                current = Some(FlaggedRun {
                    start: i,
                    end: i,
                    peak: i,
                });
            }
        }
    }
    runs.extend(current);

    runs
}
