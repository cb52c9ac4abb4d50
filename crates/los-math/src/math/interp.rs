//! Shape-preserving interpolation.
//!
//! [`Pchip`] is the Fritsch–Carlson piecewise cubic Hermite interpolant: it
//! never overshoots the data, so a smoothed probability curve stays within
//! the range of its knots.

use crate::error::MathError;

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Monotone piecewise cubic Hermite interpolant.
#[derive(Debug, Clone)]
pub struct Pchip {
    xs: Vec<f64>,
    ys: Vec<f64>,
    slopes: Vec<f64>,
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

impl Pchip {
    /// Build the interpolant through the knots `(xs[i], ys[i])`.
    ///
    /// `xs` must be strictly increasing. A single knot gives a constant.
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, MathError> {
        if xs.len() != ys.len() {
            return Err(MathError::DimensionMismatch {
                expected: xs.len(),
                actual: ys.len(),
            });
        }
        if xs.is_empty() {
            return Err(MathError::EmptyInput);
        }
        if xs.windows(2).any(|w| !(w[1] > w[0])) {
            return Err(MathError::NotIncreasing);
        }

        let n = xs.len();
        let slopes = match n {
            1 => vec![0.0],
            2 => {
                let d = (ys[1] - ys[0]) / (xs[1] - xs[0]);
                vec![d, d]
            }
            _ => {
                let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
                let delta: Vec<f64> = (0..n - 1).map(|k| (ys[k + 1] - ys[k]) / h[k]).collect();

                let mut d = vec![0.0; n];
                for k in 1..n - 1 {
                    if sign(delta[k - 1]) * sign(delta[k]) > 0 {
                        let w1 = 2.0 * h[k] + h[k - 1];
                        let w2 = h[k] + 2.0 * h[k - 1];
                        d[k] = (w1 + w2) / (w1 / delta[k - 1] + w2 / delta[k]);
                    }
                }
                d[0] = edge_slope(h[0], h[1], delta[0], delta[1]);
                d[n - 1] = edge_slope(h[n - 2], h[n - 3], delta[n - 2], delta[n - 3]);
                d
            }
        };

        Ok(Pchip {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            slopes,
        })
    }

    /// Evaluate the interpolant at `x`. Outside the knot range the end
    /// polynomials are extended.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.xs.len();
        if n == 1 {
            return self.ys[0];
        }
        let k = self.xs.partition_point(|&xi| xi <= x).clamp(1, n - 1) - 1;
        let h = self.xs[k + 1] - self.xs[k];
        let t = (x - self.xs[k]) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * self.ys[k]
            + h10 * h * self.slopes[k]
            + h01 * self.ys[k + 1]
            + h11 * h * self.slopes[k + 1]
    }

    /// Evaluate at every point of `xs`.
    pub fn eval_many(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }
}

/// One-sided three-point slope estimate, limited to keep monotonicity.
fn edge_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}
