//! Two-parameter Weibull fitting by maximum likelihood.
//!
//! The location parameter is fixed at zero. The shape is the root of the
//! profile-likelihood equation
//!
//! ```text
//! g(k) = Σ xᵢᵏ ln xᵢ / Σ xᵢᵏ − 1/k − mean(ln xᵢ) = 0
//! ```
//!
//! which is monotone increasing in k, so a bracketing bisection always
//! converges once a sign change is found. Samples are divided by their
//! maximum before evaluation to keep `xᵏ` in range.

use serde::{Deserialize, Serialize};

use crate::error::MathError;

const SHAPE_LO: f64 = 1e-3;
const SHAPE_HI_LIMIT: f64 = 1e4;
const BISECTION_STEPS: usize = 200;

/// Fitted Weibull parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeibullFit {
    /// Shape parameter k.
    pub shape: f64,
    /// Scale parameter λ.
    pub scale: f64,
    /// Number of samples used in the fit.
    pub n: usize,
    /// Samples dropped because they were not strictly positive and finite.
    pub excluded: usize,
}

impl WeibullFit {
    /// Probability density at `x`.
    pub fn pdf(&self, x: f64) -> f64 {
        if x < 0.0 {
            return 0.0;
        }
        let k = self.shape;
        let lambda = self.scale;
        if x == 0.0 {
            return if k < 1.0 {
                f64::INFINITY
            } else if k == 1.0 {
                1.0 / lambda
            } else {
                0.0
            };
        }
        let z = x / lambda;
        (k / lambda) * z.powf(k - 1.0) * (-z.powf(k)).exp()
    }

    /// Distribution mean λ·Γ(1 + 1/k).
    pub fn mean(&self) -> f64 {
        self.scale * gamma(1.0 + 1.0 / self.shape)
    }
}

/// Fit a zero-location Weibull to the positive finite values in `samples`.
pub fn fit_weibull(samples: &[f64]) -> Result<WeibullFit, MathError> {
    let xs: Vec<f64> = samples
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    let excluded = samples.len() - xs.len();
    if xs.is_empty() {
        return Err(MathError::EmptyInput);
    }

    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    if xs.len() < 2 || max == min {
        return Err(MathError::Degenerate(
            "at least two distinct positive values are required".to_string(),
        ));
    }

    let scaled: Vec<f64> = xs.iter().map(|v| v / max).collect();
    let logs: Vec<f64> = scaled.iter().map(|v| v.ln()).collect();
    let mean_log = logs.iter().sum::<f64>() / logs.len() as f64;

    let g = |k: f64| -> f64 {
        let mut num = 0.0;
        let mut den = 0.0;
        for (x, l) in scaled.iter().zip(logs.iter()) {
            let xk = x.powf(k);
            num += xk * l;
            den += xk;
        }
        num / den - 1.0 / k - mean_log
    };

    let mut lo = SHAPE_LO;
    let mut hi = 1.0;
    while g(hi) < 0.0 {
        lo = hi;
        hi *= 2.0;
        if hi > SHAPE_HI_LIMIT {
            return Err(MathError::NoConvergence("Weibull shape bracketing"));
        }
    }
    if g(lo) > 0.0 {
        return Err(MathError::NoConvergence("Weibull shape bracketing"));
    }

    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if g(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi {
            break;
        }
    }
    let shape = 0.5 * (lo + hi);
    let mean_pow = scaled.iter().map(|x| x.powf(shape)).sum::<f64>() / scaled.len() as f64;
    let scale = max * mean_pow.powf(1.0 / shape);

    Ok(WeibullFit {
        shape,
        scale,
        n: xs.len(),
        excluded,
    })
}

/// Gamma function via the Lanczos approximation (g = 7, n = 9).
fn gamma(z: f64) -> f64 {
    #[allow(clippy::excessive_precision)]
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if z < 0.5 {
        let pi = std::f64::consts::PI;
        return pi / ((pi * z).sin() * gamma(1.0 - z));
    }
    let z = z - 1.0;
    let mut x = COEFFS[0];
    for (i, c) in COEFFS.iter().enumerate().skip(1) {
        x += c / (z + i as f64);
    }
    let t = z + 7.5;
    (2.0 * std::f64::consts::PI).sqrt() * t.powf(z + 0.5) * (-t).exp() * x
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// Weibull quantiles at evenly spaced probabilities.
    fn quantile_sample(shape: f64, scale: f64, n: usize) -> Vec<f64> {
        (1..=n)
            .map(|i| {
                let p = (i as f64 - 0.5) / n as f64;
                scale * (-(1.0 - p).ln()).powf(1.0 / shape)
            })
            .collect()
    }

    #[test]
    fn recovers_known_parameters() {
        let xs = quantile_sample(2.0, 5.0, 2000);
        let fit = fit_weibull(&xs).unwrap();
        assert!(approx_eq(fit.shape, 2.0, 0.05), "shape={}", fit.shape);
        assert!(approx_eq(fit.scale, 5.0, 0.05), "scale={}", fit.scale);
        assert_eq!(fit.n, 2000);
        assert_eq!(fit.excluded, 0);
    }

    #[test]
    fn excludes_non_positive_values() {
        let mut xs = quantile_sample(1.5, 3.0, 200);
        xs.push(0.0);
        xs.push(-1.0);
        xs.push(f64::NAN);
        let fit = fit_weibull(&xs).unwrap();
        assert_eq!(fit.excluded, 3);
        assert_eq!(fit.n, 200);
    }

    #[test]
    fn rejects_degenerate_samples() {
        assert_eq!(fit_weibull(&[]).unwrap_err(), MathError::EmptyInput);
        assert_eq!(fit_weibull(&[0.0, -2.0]).unwrap_err(), MathError::EmptyInput);
        assert!(matches!(fit_weibull(&[2.0]), Err(MathError::Degenerate(_))));
        assert!(matches!(
            fit_weibull(&[2.0, 2.0, 2.0]),
            Err(MathError::Degenerate(_))
        ));
    }

    #[test]
    fn pdf_integrates_to_one() {
        let fit = WeibullFit {
            shape: 1.7,
            scale: 2.0,
            n: 0,
            excluded: 0,
        };
        let step = 1e-3;
        let area: f64 = (0..20_000).map(|i| fit.pdf((i as f64 + 0.5) * step) * step).sum();
        assert!(approx_eq(area, 1.0, 1e-3), "area={area}");
    }

    #[test]
    fn pdf_at_origin() {
        let exp = WeibullFit {
            shape: 1.0,
            scale: 4.0,
            n: 0,
            excluded: 0,
        };
        assert_eq!(exp.pdf(0.0), 0.25);
        assert_eq!(exp.pdf(-1.0), 0.0);
        let peaked = WeibullFit { shape: 3.0, ..exp };
        assert_eq!(peaked.pdf(0.0), 0.0);
    }

    #[test]
    fn mean_of_exponential_is_scale() {
        let exp = WeibullFit {
            shape: 1.0,
            scale: 4.0,
            n: 0,
            excluded: 0,
        };
        assert!(approx_eq(exp.mean(), 4.0, 1e-9));
    }
}
