//! Empirical transition matrix and stationary distribution of the LOS chain.

use std::collections::{BTreeMap, BTreeSet};

use los_config::ZeroRowPolicy;
use los_math::eigenpair_nearest;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Sums within this distance of zero cannot be normalized.
const MIN_VECTOR_SUM: f64 = 1e-12;

/// Negative components smaller than this are rounding noise and are
/// clamped without marking the result approximate.
const ROUNDING_SLACK: f64 = 1e-12;

/// Row-stochastic matrix over a sorted state list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    /// Sorted distinct states; indexes rows and columns.
    pub states: Vec<String>,
    /// `probabilities[i][j]` is P(next = j | current = i).
    pub probabilities: Vec<Vec<f64>>,
    /// States left with an all-zero row under [`ZeroRowPolicy::AbsorbingVoid`].
    pub void_states: Vec<String>,
}

impl TransitionMatrix {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn to_dmatrix(&self) -> DMatrix<f64> {
        let n = self.states.len();
        DMatrix::from_fn(n, n, |i, j| self.probabilities[i][j])
    }
}

/// Count adjacent pairs of `sequence` and normalize each row.
pub fn transition_matrix(sequence: &[String], policy: ZeroRowPolicy) -> Result<TransitionMatrix> {
    if sequence.is_empty() {
        return Err(AnalysisError::DegenerateTransition {
            state: None,
            reason: "state sequence is empty".to_string(),
        });
    }

    let states: Vec<String> = sequence
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: BTreeMap<&str, usize> = states
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();
    let n = states.len();

    let mut counts = vec![vec![0u64; n]; n];
    for pair in sequence.windows(2) {
        let from = index[pair[0].as_str()];
        let to = index[pair[1].as_str()];
        counts[from][to] += 1;
    }

    // One distinct state and nothing observed: treat it as absorbing.
    if n == 1 && counts[0][0] == 0 {
        return Ok(TransitionMatrix {
            states,
            probabilities: vec![vec![1.0]],
            void_states: Vec::new(),
        });
    }

    let mut probabilities = vec![vec![0.0; n]; n];
    let mut void_states = Vec::new();
    for (i, row) in counts.iter().enumerate() {
        let total: u64 = row.iter().sum();
        if total == 0 {
            match policy {
                ZeroRowPolicy::Fail => return Err(AnalysisError::zero_row(states[i].clone())),
                ZeroRowPolicy::AbsorbingVoid => {
                    void_states.push(states[i].clone());
                    continue;
                }
            }
        }
        for (j, &c) in row.iter().enumerate() {
            probabilities[i][j] = c as f64 / total as f64;
        }
    }

    Ok(TransitionMatrix {
        states,
        probabilities,
        void_states,
    })
}

/// Probability vector π with π = πP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationaryDistribution {
    pub values: Vec<f64>,
    /// Set when negative components had to be clamped to zero.
    pub approximate: bool,
    /// Real part of the eigenvalue the vector belongs to.
    pub eigenvalue: f64,
}

/// Stationary distribution of a row-stochastic matrix.
///
/// Takes the eigenvector of Pᵀ for the eigenvalue nearest 1, which must lie
/// within `tolerance` of 1.
pub fn stationary_distribution(
    matrix: &DMatrix<f64>,
    tolerance: f64,
) -> Result<StationaryDistribution> {
    let pair = eigenpair_nearest(&matrix.transpose(), 1.0).map_err(|e| {
        AnalysisError::NoStationaryDistribution {
            reason: format!("eigen decomposition failed: {e}"),
        }
    })?;
    if !(pair.distance <= tolerance) {
        return Err(AnalysisError::eigenvalue_off_unit(
            pair.re,
            pair.im,
            pair.distance,
            tolerance,
        ));
    }

    let (values, approximate) = normalize_probabilities(&pair.vector)?;
    Ok(StationaryDistribution {
        values,
        approximate,
        eigenvalue: pair.re,
    })
}

/// Scale an eigenvector to sum 1, then clamp negative components and
/// renormalize. The flag is set when a clamped component exceeded rounding
/// noise.
fn normalize_probabilities(vector: &[f64]) -> Result<(Vec<f64>, bool)> {
    let sum: f64 = vector.iter().sum();
    if sum.abs() < MIN_VECTOR_SUM {
        return Err(AnalysisError::NoStationaryDistribution {
            reason: "eigenvector sums to zero".to_string(),
        });
    }
    let mut values: Vec<f64> = vector.iter().map(|v| v / sum).collect();

    let approximate = values.iter().any(|v| *v < -ROUNDING_SLACK);
    if values.iter().any(|v| *v < 0.0) {
        for v in values.iter_mut() {
            *v = v.max(0.0);
        }
        let total: f64 = values.iter().sum();
        if total < MIN_VECTOR_SUM {
            return Err(AnalysisError::NoStationaryDistribution {
                reason: "eigenvector has no positive mass".to_string(),
            });
        }
        for v in values.iter_mut() {
            *v /= total;
        }
    }
    Ok((values, approximate))
}

/// Transition matrix and its stationary distribution for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkovResult {
    pub transition: TransitionMatrix,
    pub stationary: StationaryDistribution,
}

/// Build the chain from `sequence` and solve for its stationary distribution.
pub fn analyze_markov(
    sequence: &[String],
    policy: ZeroRowPolicy,
    tolerance: f64,
) -> Result<MarkovResult> {
    let transition = transition_matrix(sequence, policy)?;
    let stationary = stationary_distribution(&transition.to_dmatrix(), tolerance)?;
    Ok(MarkovResult {
        transition,
        stationary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(s: &str) -> Vec<String> {
        s.chars().map(|c| c.to_string()).collect()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < tol, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn alternating_chain() {
        let r = analyze_markov(&seq("ABABAB"), ZeroRowPolicy::Fail, 1e-8).unwrap();
        assert_eq!(r.transition.states, vec!["A", "B"]);
        assert_eq!(
            r.transition.probabilities,
            vec![vec![0.0, 1.0], vec![1.0, 0.0]]
        );
        assert_close(&r.stationary.values, &[0.5, 0.5], 1e-9);
        assert!(!r.stationary.approximate);
    }

    #[test]
    fn trailing_state_without_exit_fails() {
        let err = transition_matrix(&seq("AAB"), ZeroRowPolicy::Fail).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DegenerateTransition { state: Some(ref s), .. } if s == "B"
        ));
    }

    #[test]
    fn absorbing_void_keeps_zero_row() {
        let m = transition_matrix(&seq("AAB"), ZeroRowPolicy::AbsorbingVoid).unwrap();
        assert_eq!(m.probabilities, vec![vec![0.5, 0.5], vec![0.0, 0.0]]);
        assert_eq!(m.void_states, vec!["B"]);
    }

    #[test]
    fn single_row_is_absorbing() {
        for policy in [ZeroRowPolicy::Fail, ZeroRowPolicy::AbsorbingVoid] {
            let r = analyze_markov(&seq("C"), policy, 1e-8).unwrap();
            assert_eq!(r.transition.probabilities, vec![vec![1.0]]);
            assert_eq!(r.stationary.values, vec![1.0]);
        }
    }

    #[test]
    fn empty_sequence_is_degenerate() {
        let err = transition_matrix(&[], ZeroRowPolicy::AbsorbingVoid).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::DegenerateTransition { state: None, .. }
        ));
    }

    #[test]
    fn rows_sum_to_one_and_states_are_sorted() {
        let m = transition_matrix(&seq("CABBACBCAAC"), ZeroRowPolicy::Fail).unwrap();
        assert_eq!(m.states, vec!["A", "B", "C"]);
        for row in &m.probabilities {
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn stationary_satisfies_balance() {
        let p = DMatrix::from_row_slice(3, 3, &[0.5, 0.3, 0.2, 0.2, 0.6, 0.2, 0.1, 0.4, 0.5]);
        let pi = stationary_distribution(&p, 1e-8).unwrap();
        assert!((pi.values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        for j in 0..3 {
            let next: f64 = (0..3).map(|i| pi.values[i] * p[(i, j)]).sum();
            assert!((next - pi.values[j]).abs() < 1e-9);
        }
        assert!((pi.eigenvalue - 1.0).abs() < 1e-9);
    }

    #[test]
    fn non_stochastic_matrix_has_no_stationary_distribution() {
        let p = DMatrix::from_row_slice(2, 2, &[0.5, 0.0, 0.0, 0.25]);
        let err = stationary_distribution(&p, 1e-8).unwrap_err();
        assert!(matches!(err, AnalysisError::NoStationaryDistribution { .. }));
        assert_eq!(err.code(), 42);
    }

    #[test]
    fn negative_components_are_clamped_and_flagged() {
        let (values, approximate) = normalize_probabilities(&[0.6, 0.5, -0.1]).unwrap();
        assert!(approximate);
        assert!(values.iter().all(|v| *v >= 0.0));
        assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(values[2], 0.0);
        assert_close(&values, &[0.6 / 1.1, 0.5 / 1.1, 0.0], 1e-12);
    }

    #[test]
    fn rounding_noise_is_clamped_without_flag() {
        let (values, approximate) = normalize_probabilities(&[0.5, 0.5, -1e-14]).unwrap();
        assert!(!approximate);
        assert_eq!(values[2], 0.0);
        assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_eigenvector_is_flipped_by_its_sum() {
        let (values, approximate) = normalize_probabilities(&[-0.25, -0.75]).unwrap();
        assert!(!approximate);
        assert_close(&values, &[0.25, 0.75], 1e-15);
    }

    #[test]
    fn zero_sum_vector_has_no_stationary_distribution() {
        let err = normalize_probabilities(&[1.0, -1.0]).unwrap_err();
        assert!(matches!(err, AnalysisError::NoStationaryDistribution { .. }));
        assert_eq!(err.kind(), "NoStationaryDistributionError");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let s = seq("ABCCBAABCACB");
        let a = analyze_markov(&s, ZeroRowPolicy::Fail, 1e-8).unwrap();
        let b = analyze_markov(&s, ZeroRowPolicy::Fail, 1e-8).unwrap();
        assert_eq!(a, b);
    }
}
