//! PCA projection followed by seeded k-means.

use los_config::ClusteringConfig;
use los_math::{distance_sq, principal_axes};
use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::prepare::PreparedMatrix;
use crate::error::{AnalysisError, Result};

/// Number of principal components the observations are projected onto.
pub const PROJECTION_DIM: usize = 2;

/// Parameters for one k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this.
    pub tolerance: f64,
}

impl KMeansParams {
    pub fn from_config(config: &ClusteringConfig, k: usize) -> Self {
        KMeansParams {
            k,
            seed: config.seed,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
        }
    }
}

/// Output of [`kmeans`].
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit<const D: usize> {
    pub centroids: Vec<[f64; D]>,
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Lloyd's algorithm with k-means++ seeding from a seeded RNG.
///
/// Assignment ties go to the lowest cluster index. A cluster that loses all
/// its points keeps its previous centroid.
pub fn kmeans<const D: usize>(points: &[[f64; D]], params: &KMeansParams) -> Result<KMeansFit<D>> {
    let n = points.len();
    if params.k == 0 || params.k > n {
        return Err(AnalysisError::Clustering(format!(
            "cannot form {} clusters from {} observations",
            params.k, n
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut centroids = seed_centroids(points, params.k, &mut rng);
    let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();

    let tol_sq = params.tolerance * params.tolerance;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < params.max_iterations {
        iterations += 1;

        let mut sums = vec![[0.0; D]; params.k];
        let mut counts = vec![0usize; params.k];
        for (p, &c) in points.iter().zip(labels.iter()) {
            counts[c] += 1;
            for d in 0..D {
                sums[c][d] += p[d];
            }
        }
        let mut max_shift_sq: f64 = 0.0;
        for c in 0..params.k {
            if counts[c] == 0 {
                continue;
            }
            let mut next = [0.0; D];
            for d in 0..D {
                next[d] = sums[c][d] / counts[c] as f64;
            }
            max_shift_sq = max_shift_sq.max(distance_sq(&centroids[c], &next));
            centroids[c] = next;
        }

        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest(p, &centroids);
            if c != labels[i] {
                labels[i] = c;
                changed = true;
            }
        }

        if !changed || max_shift_sq <= tol_sq {
            converged = true;
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(labels.iter())
        .map(|(p, &c)| distance_sq(p, &centroids[c]))
        .sum();

    Ok(KMeansFit {
        centroids,
        labels,
        inertia,
        iterations,
        converged,
    })
}

fn nearest<const D: usize>(point: &[f64; D], centroids: &[[f64; D]]) -> usize {
    let mut best = 0;
    let mut best_dist = distance_sq(point, &centroids[0]);
    for (c, centroid) in centroids.iter().enumerate().skip(1) {
        let dist = distance_sq(point, centroid);
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}

/// k-means++: each further centroid is drawn with probability proportional
/// to its squared distance from the nearest centroid chosen so far.
fn seed_centroids<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut StdRng) -> Vec<[f64; D]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..n)]);
    let mut weights: Vec<f64> = points.iter().map(|p| distance_sq(p, &centroids[0])).collect();

    while centroids.len() < k {
        let total: f64 = weights.iter().sum();
        let chosen = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut acc = 0.0;
            let mut chosen = None;
            let mut last_positive = 0;
            for (i, &w) in weights.iter().enumerate() {
                if w <= 0.0 {
                    continue;
                }
                last_positive = i;
                acc += w;
                if acc > target {
                    chosen = Some(i);
                    break;
                }
            }
            chosen.unwrap_or(last_positive)
        } else {
            // Every point already coincides with a centroid.
            rng.random_range(0..n)
        };

        let centroid = points[chosen];
        centroids.push(centroid);
        for (w, p) in weights.iter_mut().zip(points.iter()) {
            *w = w.min(distance_sq(p, &centroid));
        }
    }
    centroids
}

/// Clustering result for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    /// PC1/PC2 score of each observation, in table order.
    pub projection: Vec<[f64; PROJECTION_DIM]>,
    pub labels: Vec<usize>,
    pub centroids: Vec<[f64; PROJECTION_DIM]>,
    /// `"{initial}C{i}"` name of each cluster.
    pub display_labels: Vec<String>,
    pub explained_variance_ratio: [f64; PROJECTION_DIM],
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// `"{first letter of session}C{i}"` for each cluster index.
pub fn display_labels(session: &str, k: usize) -> Vec<String> {
    let initial: String = session.chars().take(1).collect();
    (0..k).map(|i| format!("{initial}C{i}")).collect()
}

/// Project the prepared matrix onto two principal components and cluster
/// the projected points.
pub fn analyze_clusters(
    prepared: &PreparedMatrix,
    params: &KMeansParams,
    session: &str,
) -> Result<ClusterResult> {
    let n = prepared.data.nrows();
    if params.k == 0 || params.k > n {
        return Err(AnalysisError::Clustering(format!(
            "cannot form {} clusters from {} observations",
            params.k, n
        )));
    }
    let informative = prepared.informative_columns();
    if informative < PROJECTION_DIM {
        return Err(AnalysisError::Clustering(format!(
            "need at least {PROJECTION_DIM} non-constant features, found {informative}"
        )));
    }

    let axes = principal_axes(&prepared.data, PROJECTION_DIM)
        .map_err(|e| AnalysisError::Clustering(format!("PCA failed: {e}")))?;
    let scores = axes
        .project(&prepared.data)
        .map_err(|e| AnalysisError::Clustering(format!("PCA projection failed: {e}")))?;
    let projection: Vec<[f64; PROJECTION_DIM]> = (0..n)
        .map(|i| [scores[(i, 0)], scores[(i, 1)]])
        .collect();

    let fit = kmeans(&projection, params)?;

    Ok(ClusterResult {
        projection,
        labels: fit.labels,
        centroids: fit.centroids,
        display_labels: display_labels(session, params.k),
        explained_variance_ratio: [
            axes.explained_variance_ratio[0],
            axes.explained_variance_ratio[1],
        ],
        inertia: fit.inertia,
        iterations: fit.iterations,
        converged: fit.converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize) -> KMeansParams {
        KMeansParams::from_config(&ClusteringConfig::default(), k)
    }

    fn two_blobs() -> Vec<[f64; 2]> {
        vec![
            [0.0, 0.0],
            [0.1, 0.2],
            [0.2, 0.1],
            [10.0, 10.0],
            [10.1, 9.9],
            [9.8, 10.2],
        ]
    }

    #[test]
    fn separates_two_blobs() {
        let fit = kmeans(&two_blobs(), &params(2)).unwrap();
        assert!(fit.converged);
        assert_eq!(fit.labels[0], fit.labels[1]);
        assert_eq!(fit.labels[1], fit.labels[2]);
        assert_eq!(fit.labels[3], fit.labels[4]);
        assert_eq!(fit.labels[4], fit.labels[5]);
        assert_ne!(fit.labels[0], fit.labels[3]);
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn same_seed_same_result() {
        let pts: Vec<[f64; 2]> = (0..40)
            .map(|i| {
                let t = i as f64;
                [(t * 0.37).sin() * 3.0, (t * 0.11).cos() * 2.0]
            })
            .collect();
        let a = kmeans(&pts, &params(4)).unwrap();
        let b = kmeans(&pts, &params(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn k_equal_n_puts_each_point_alone() {
        let pts = [[0.0, 0.0], [5.0, 0.0], [0.0, 5.0]];
        let fit = kmeans(&pts, &params(3)).unwrap();
        let mut labels = fit.labels.clone();
        labels.sort_unstable();
        assert_eq!(labels, vec![0, 1, 2]);
        assert_eq!(fit.inertia, 0.0);
    }

    #[test]
    fn identical_points_do_not_panic() {
        let pts = [[1.0, 1.0]; 5];
        let fit = kmeans(&pts, &params(3)).unwrap();
        // Ties go to the lowest index.
        assert!(fit.labels.iter().all(|&l| l == 0));
        assert_eq!(fit.centroids.len(), 3);
    }

    #[test]
    fn rejects_bad_k() {
        let pts = two_blobs();
        assert!(matches!(
            kmeans(&pts, &params(0)),
            Err(AnalysisError::Clustering(_))
        ));
        assert!(matches!(
            kmeans(&pts, &params(7)),
            Err(AnalysisError::Clustering(_))
        ));
    }

    #[test]
    fn iteration_cap_is_respected() {
        let pts: Vec<[f64; 2]> = (0..30).map(|i| [i as f64, (i * i % 7) as f64]).collect();
        let p = KMeansParams {
            max_iterations: 1,
            ..params(5)
        };
        let fit = kmeans(&pts, &p).unwrap();
        assert_eq!(fit.iterations, 1);
    }

    #[test]
    fn display_labels_use_session_initial() {
        assert_eq!(display_labels("Morning", 3), vec!["MC0", "MC1", "MC2"]);
        assert_eq!(display_labels("Afternoon", 2), vec!["AC0", "AC1"]);
        assert_eq!(display_labels("", 1), vec!["C0"]);
    }
}
