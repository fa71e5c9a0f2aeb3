//! Statistical reduction of latency samples and bandwidth calculation

pub mod bandwidth;

pub use bandwidth::BandwidthCalculator;

use crate::models::LatencyResult;
use std::time::Duration;

/// Reduce round-trip samples to average and jitter.
///
/// Samples are sorted ascending. With more than two samples the minimum and
/// maximum are dropped; the mean of the remainder is the average and its
/// population standard deviation is the jitter. Empty input yields 0/0.
pub fn reduce_latency(samples: &[Duration]) -> LatencyResult {
    let millis: Vec<f64> = samples
        .iter()
        .map(|sample| sample.as_secs_f64() * 1000.0)
        .collect();
    reduce_latency_ms(&millis)
}

/// Same reduction over samples already expressed in milliseconds
pub fn reduce_latency_ms(samples_ms: &[f64]) -> LatencyResult {
    let trimmed = trim_extremes(samples_ms);
    if trimmed.is_empty() {
        return LatencyResult::empty();
    }

    let average = mean(&trimmed);
    let jitter = population_std_dev(&trimmed, average);
    LatencyResult::new(average, jitter)
}

/// Sort ascending and drop one minimum and one maximum when more than two remain
pub fn trim_extremes(samples: &[f64]) -> Vec<f64> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    if sorted.len() > 2 {
        sorted.pop();
        sorted.remove(0);
    }
    sorted
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|&x| (x - mean).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}
