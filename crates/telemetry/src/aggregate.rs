//! Series aggregation for the dashboard.
//!
//! The pipeline runs in a fixed order: per-checkpoint statistics over the
//! full record, then timestep-range filtering, then even downsampling,
//! then trailing-window smoothing of the downsampled series. Range bounds
//! are inclusive on both ends.

use crate::record::EvaluationRecord;
use crate::TelemetryError;

#[derive(Clone, Copy, Debug)]
pub struct AggregateOptions {
    /// Keep checkpoints at or after this timestep. `None` keeps from the
    /// start of the run.
    pub min_timestep: Option<i64>,
    /// Keep checkpoints at or before this timestep. `None` keeps to the
    /// end of the run.
    pub max_timestep: Option<i64>,
    /// Upper bound on returned points; 0 disables downsampling.
    pub max_points: usize,
    /// Trailing moving-average window. Series shorter than the window are
    /// passed through unchanged.
    pub smoothing_window: usize,
    /// An evaluation episode counts as a success when its reward is
    /// strictly above this threshold.
    pub success_threshold: f64,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            min_timestep: None,
            max_timestep: None,
            max_points: 0,
            smoothing_window: 5,
            success_threshold: 200.0,
        }
    }
}

/// Dashboard-ready series, all vectors index-aligned.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetrySeries {
    /// First recorded timestep of the whole run, before filtering.
    pub run_min_timestep: i64,
    /// Last recorded timestep of the whole run, before filtering.
    pub run_max_timestep: i64,
    pub timesteps: Vec<i64>,
    pub mean_rewards: Vec<f64>,
    pub std_rewards: Vec<f64>,
    /// Percentage of evaluation episodes above the success threshold.
    pub success_rate: Vec<f64>,
    pub smoothed_timesteps: Vec<i64>,
    pub smoothed_mean: Vec<f64>,
    pub smoothed_success_rate: Vec<f64>,
    pub smoothing_window: usize,
}

pub fn aggregate(
    record: &EvaluationRecord,
    options: &AggregateOptions,
) -> Result<TelemetrySeries, TelemetryError> {
    if record.timesteps.is_empty() {
        return Err(TelemetryError::NoData);
    }

    let mut mean_rewards = Vec::with_capacity(record.results.len());
    let mut std_rewards = Vec::with_capacity(record.results.len());
    let mut success_rate = Vec::with_capacity(record.results.len());
    for row in &record.results {
        let (mean, std) = row_stats(row);
        mean_rewards.push(mean);
        std_rewards.push(std);
        success_rate.push(row_success(row, options.success_threshold));
    }

    let (run_min, run_max) = record
        .timesteps
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), &t| (lo.min(t), hi.max(t)));
    let lo = options.min_timestep.unwrap_or(run_min);
    let hi = options.max_timestep.unwrap_or(run_max);

    let kept: Vec<usize> = (0..record.timesteps.len())
        .filter(|&i| (lo..=hi).contains(&record.timesteps[i]))
        .collect();
    if kept.is_empty() {
        return Err(TelemetryError::EmptyRange);
    }

    let picks = downsample_indices(kept.len(), options.max_points);
    let select_t: Vec<i64> = picks.iter().map(|&k| record.timesteps[kept[k]]).collect();
    let select = |source: &[f64]| -> Vec<f64> {
        picks.iter().map(|&k| source[kept[k]]).collect()
    };
    let mean_rewards = select(&mean_rewards);
    let std_rewards = select(&std_rewards);
    let success_rate = select(&success_rate);

    let window = options.smoothing_window.max(1);
    let (smoothed_timesteps, smoothed_mean, smoothed_success_rate) =
        if select_t.len() < window {
            (select_t.clone(), mean_rewards.clone(), success_rate.clone())
        } else {
            (
                select_t[window - 1..].to_vec(),
                moving_average(&mean_rewards, window),
                moving_average(&success_rate, window),
            )
        };

    Ok(TelemetrySeries {
        run_min_timestep: run_min,
        run_max_timestep: run_max,
        timesteps: select_t,
        mean_rewards,
        std_rewards,
        success_rate,
        smoothed_timesteps,
        smoothed_mean,
        smoothed_success_rate,
        smoothing_window: window,
    })
}

/// Mean and population standard deviation. Empty rows report zeros so the
/// output stays finite.
fn row_stats(row: &[f64]) -> (f64, f64) {
    if row.is_empty() {
        return (0.0, 0.0);
    }
    let n = row.len() as f64;
    let mean = row.iter().sum::<f64>() / n;
    let variance = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn row_success(row: &[f64], threshold: f64) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    let hits = row.iter().filter(|&&v| v > threshold).count();
    100.0 * hits as f64 / row.len() as f64
}

/// Evenly spaced indices into a series of `len` points, truncating the
/// fractional positions. Always keeps the first and last points.
fn downsample_indices(len: usize, max_points: usize) -> Vec<usize> {
    if max_points == 0 || len <= max_points {
        return (0..len).collect();
    }
    if max_points == 1 {
        return vec![0];
    }
    let span = (len - 1) as f64 / (max_points - 1) as f64;
    let mut picks: Vec<usize> = (0..max_points).map(|k| (k as f64 * span) as usize).collect();
    // The final product can truncate one below the end; pin it.
    picks[max_points - 1] = len - 1;
    picks
}

/// Trailing moving average: output k covers inputs `k..k + window`.
fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    (0..=values.len() - window)
        .map(|k| values[k..k + window].iter().sum::<f64>() / window as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_std_divides_by_n() {
        let (mean, std) = row_stats(&[1.0, 3.0]);
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((std - 1.0).abs() < 1e-12);
    }

    #[test]
    fn success_requires_strictly_greater_rewards() {
        let rate = row_success(&[200.0, 300.0], 200.0);
        assert!((rate - 50.0).abs() < 1e-12);
    }

    #[test]
    fn downsampling_keeps_both_endpoints() {
        // (62, 8) truncates the last product to 60 without the pin.
        for len in 2..=200usize {
            for max_points in 2..=30usize {
                let picks = downsample_indices(len, max_points);
                assert_eq!(picks.first(), Some(&0), "len {len} max {max_points}");
                assert_eq!(picks.last(), Some(&(len - 1)), "len {len} max {max_points}");
                assert_eq!(picks.len(), len.min(max_points));
            }
        }
        assert_eq!(downsample_indices(10, 3), vec![0, 4, 9]);
    }

    #[test]
    fn downsampling_passes_short_series_through() {
        assert_eq!(downsample_indices(4, 30), vec![0, 1, 2, 3]);
        assert_eq!(downsample_indices(4, 0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn moving_average_is_trailing() {
        let out = moving_average(&[0.0, 1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[2] - 3.0).abs() < 1e-12);
    }
}
