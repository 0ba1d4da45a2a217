//! Smoothing filters applied across the time-of-day axis of a profile.

use serde::{Deserialize, Serialize};

/// Truncate the Gaussian kernel at this many standard deviations.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Smoothing {
    None,
    /// Centered moving average.
    MovingAverage { window: usize, min_periods: usize },
    /// Gaussian kernel with standard deviation `sigma`, in buckets.
    Gaussian { sigma: f64 },
}

impl Default for Smoothing {
    fn default() -> Self {
        Smoothing::MovingAverage {
            window: 4,
            min_periods: 1,
        }
    }
}

impl Smoothing {
    /// Smoothed copy of `values`. The input is left untouched; positions
    /// that cannot be smoothed are `None`.
    pub fn apply(&self, values: &[f64]) -> Vec<Option<f64>> {
        match *self {
            Smoothing::None => vec![None; values.len()],
            Smoothing::MovingAverage {
                window,
                min_periods,
            } => centered_moving_average(values, window, min_periods),
            Smoothing::Gaussian { sigma } => gaussian(values, sigma).into_iter().map(Some).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Smoothing::None => Ok(()),
            Smoothing::MovingAverage {
                window,
                min_periods,
            } => {
                if window == 0 {
                    Err("moving average window must be at least 1".into())
                } else if min_periods == 0 || min_periods > window {
                    Err(format!(
                        "min_periods must be between 1 and the window ({window}), got {min_periods}"
                    ))
                } else {
                    Ok(())
                }
            }
            Smoothing::Gaussian { sigma } => {
                if sigma.is_finite() && sigma > 0.0 {
                    Ok(())
                } else {
                    Err(format!("gaussian sigma must be positive, got {sigma}"))
                }
            }
        }
    }
}

/// Centered rolling mean. For index `i` the window spans
/// `i - window/2 .. i - window/2 + window`, clipped to the series; a value
/// is produced when at least `min_periods` samples fall inside.
pub fn centered_moving_average(values: &[f64], window: usize, min_periods: usize) -> Vec<Option<f64>> {
    let len = values.len() as isize;
    let half = (window / 2) as isize;

    (0..len)
        .map(|i| {
            let start = (i - half).max(0);
            let end = (i - half + window as isize).min(len);
            let slice = &values[start as usize..end.max(start) as usize];
            (slice.len() >= min_periods.max(1))
                .then(|| slice.iter().sum::<f64>() / slice.len() as f64)
        })
        .collect()
}

/// Gaussian-weighted mean with weights `exp(-½(d/σ)²)`, truncated at
/// 4σ and renormalised where the kernel runs off either end.
pub fn gaussian(values: &[f64], sigma: f64) -> Vec<f64> {
    // A kernel wider than the series reaches every sample anyway.
    let radius = ((GAUSSIAN_TRUNCATE * sigma).ceil() as usize).min(values.len());

    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(radius);
            let end = i.saturating_add(radius).min(values.len() - 1);

            let mut weighted_sum = 0.0;
            let mut weight_sum = 0.0;
            for (j, value) in values.iter().enumerate().take(end + 1).skip(start) {
                let distance = j.abs_diff(i) as f64;
                let weight = (-0.5 * (distance / sigma).powi(2)).exp();
                weighted_sum += value * weight;
                weight_sum += weight;
            }

            weighted_sum / weight_sum
        })
        .collect()
}
