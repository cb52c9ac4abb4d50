//! Smoothed comparison of stationary distributions across sessions.

use std::collections::{BTreeMap, BTreeSet};

use los_math::{linspace, Pchip};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// A session's stationary distribution, keyed by its own state list.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDistribution {
    pub session: String,
    pub states: Vec<String>,
    pub values: Vec<f64>,
}

/// One interpolated curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonCurve {
    pub session: String,
    /// Distribution placed on the shared state axis.
    pub values: Vec<f64>,
    pub smooth: Vec<f64>,
}

/// All curves over a shared state axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Sorted union of every session's states.
    pub states: Vec<String>,
    /// Sample positions on `[0, states.len() - 1]`.
    pub x: Vec<f64>,
    pub curves: Vec<ComparisonCurve>,
}

/// Place each distribution on the union of states and interpolate it.
///
/// Needs at least two sessions.
pub fn compare_stationary(sessions: &[SessionDistribution], points: usize) -> Result<Comparison> {
    if sessions.len() < 2 {
        return Err(AnalysisError::Comparison(format!(
            "need at least two stationary distributions, got {}",
            sessions.len()
        )));
    }

    let states: Vec<String> = sessions
        .iter()
        .flat_map(|s| s.states.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let knots: Vec<f64> = (0..states.len()).map(|i| i as f64).collect();
    let upper = states.len().saturating_sub(1) as f64;
    let x = linspace(0.0, upper, points);

    let mut curves = Vec::with_capacity(sessions.len());
    for s in sessions {
        let own: BTreeMap<&str, f64> = s
            .states
            .iter()
            .map(String::as_str)
            .zip(s.values.iter().copied())
            .collect();
        let values: Vec<f64> = states
            .iter()
            .map(|st| own.get(st.as_str()).copied().unwrap_or(0.0))
            .collect();
        let interp = Pchip::new(&knots, &values).map_err(|e| {
            AnalysisError::Comparison(format!("interpolation failed for {}: {e}", s.session))
        })?;
        curves.push(ComparisonCurve {
            session: s.session.clone(),
            smooth: interp.eval_many(&x),
            values,
        });
    }

    Ok(Comparison { states, x, curves })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(session: &str, states: &[&str], values: &[f64]) -> SessionDistribution {
        SessionDistribution {
            session: session.to_string(),
            states: states.iter().map(|s| s.to_string()).collect(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn aligns_on_union_of_states() {
        let c = compare_stationary(
            &[
                dist("Morning", &["A", "C"], &[0.25, 0.75]),
                dist("Afternoon", &["B", "C"], &[0.5, 0.5]),
            ],
            5,
        )
        .unwrap();
        assert_eq!(c.states, vec!["A", "B", "C"]);
        assert_eq!(c.x, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
        assert_eq!(c.curves[0].values, vec![0.25, 0.0, 0.75]);
        assert_eq!(c.curves[1].values, vec![0.0, 0.5, 0.5]);
        // Curves pass through their knots.
        assert!((c.curves[0].smooth[0] - 0.25).abs() < 1e-12);
        assert!((c.curves[1].smooth[4] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn smooth_curve_stays_in_unit_interval() {
        let c = compare_stationary(
            &[
                dist("M", &["A", "B", "C", "D"], &[0.1, 0.6, 0.05, 0.25]),
                dist("N", &["A", "D"], &[0.9, 0.1]),
            ],
            200,
        )
        .unwrap();
        for curve in &c.curves {
            assert!(curve
                .smooth
                .iter()
                .all(|v| (-1e-12..=1.0 + 1e-12).contains(v)));
        }
    }

    #[test]
    fn single_state_gives_constant_curve() {
        let c = compare_stationary(
            &[dist("M", &["A"], &[1.0]), dist("N", &["A"], &[1.0])],
            4,
        )
        .unwrap();
        assert_eq!(c.x, vec![0.0, 0.0, 0.0, 0.0]);
        assert!(c.curves.iter().all(|k| k.smooth.iter().all(|v| *v == 1.0)));
    }

    #[test]
    fn needs_two_sessions() {
        let err = compare_stationary(&[dist("M", &["A"], &[1.0])], 10).unwrap_err();
        assert_eq!(err.kind(), "ComparisonError");
    }
}
