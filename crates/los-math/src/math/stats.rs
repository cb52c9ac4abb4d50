//! Descriptive moments for dense and partially observed samples.
//!
//! Sums are accumulated left to right so that identical inputs always give
//! bit-identical results.

use serde::{Deserialize, Serialize};

/// Relative threshold below which a standard deviation counts as zero.
const ZERO_SCALE_EPS: f64 = 10.0 * f64::EPSILON;

/// Arithmetic mean.
///
/// Returns NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = values.iter().sum();
    sum / values.len() as f64
}

/// Mean of the observed entries, skipping `None`.
///
/// Returns `None` when nothing is observed.
pub fn observed_mean(values: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for v in values.iter().flatten() {
        sum += *v;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some(sum / count as f64)
}

/// Population variance (divides by n), two-pass.
///
/// Returns NaN for empty input.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    ss / values.len() as f64
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> f64 {
    population_variance(values).sqrt()
}

/// Location and scale applied by [`standardize`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    /// Mean subtracted from every value.
    pub mean: f64,
    /// Divisor applied after centering. 1.0 for constant samples.
    pub scale: f64,
    /// True when the sample had (numerically) zero spread.
    pub constant: bool,
}

/// Rescale `values` in place to zero mean and unit population variance.
///
/// A constant sample has no spread to divide by; it is centered and its
/// scale is reported as 1.0, leaving a column of zeros.
pub fn standardize(values: &mut [f64]) -> Standardization {
    if values.is_empty() {
        return Standardization {
            mean: 0.0,
            scale: 1.0,
            constant: true,
        };
    }
    let m = mean(values);
    let std = population_std(values);
    let constant = !(std > ZERO_SCALE_EPS * m.abs().max(1.0));
    let scale = if constant { 1.0 } else { std };
    for v in values.iter_mut() {
        *v = (*v - m) / scale;
    }
    Standardization {
        mean: m,
        scale,
        constant,
    }
}

/// Squared Euclidean distance between two points of the same dimension.
pub fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (&x, &y)| acc + (x - y) * (x - y))
}
