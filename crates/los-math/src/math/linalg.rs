//! Eigen-decompositions used by PCA and by the stationary-distribution solver.
//!
//! Wraps nalgebra's iterative decompositions with explicit iteration caps so
//! a pathological matrix surfaces as [`MathError::NoConvergence`] instead of
//! looping or panicking.

use nalgebra::linalg::{Schur, SymmetricEigen, SVD};
use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::MathError;

/// Iteration cap for every decomposition in this module.
const MAX_ITERATIONS: usize = 10_000;

/// Leading principal axes of a data matrix.
#[derive(Debug, Clone)]
pub struct PrincipalAxes {
    /// Column means of the fitted batch.
    pub mean: DVector<f64>,
    /// One column per axis (features × k), unit length, sign-normalized.
    pub components: DMatrix<f64>,
    /// Variance captured by each axis (sample covariance eigenvalues).
    pub eigenvalues: Vec<f64>,
    /// Share of total variance captured by each axis.
    pub explained_variance_ratio: Vec<f64>,
}

impl PrincipalAxes {
    /// Project `data` (n × features) onto the axes, giving n × k scores.
    pub fn project(&self, data: &DMatrix<f64>) -> Result<DMatrix<f64>, MathError> {
        if data.ncols() != self.mean.len() {
            return Err(MathError::DimensionMismatch {
                expected: self.mean.len(),
                actual: data.ncols(),
            });
        }
        let centered = center_columns(data, &self.mean);
        Ok(centered * &self.components)
    }
}

/// Compute the top `k` principal axes of `data` (rows are observations).
///
/// Axes are ordered by descending eigenvalue, ties by original index. Each
/// axis is flipped so that its largest-magnitude loading is positive, which
/// makes the projection deterministic.
pub fn principal_axes(data: &DMatrix<f64>, k: usize) -> Result<PrincipalAxes, MathError> {
    let (n, p) = data.shape();
    if n == 0 || p == 0 {
        return Err(MathError::EmptyInput);
    }
    if k == 0 || k > p {
        return Err(MathError::DimensionMismatch {
            expected: k,
            actual: p,
        });
    }
    if n < 2 {
        return Err(MathError::Degenerate(
            "at least two observations are required".to_string(),
        ));
    }

    let mean = DVector::from_iterator(p, (0..p).map(|j| data.column(j).sum() / n as f64));
    let centered = center_columns(data, &mean);
    let cov = (centered.transpose() * &centered) / (n - 1) as f64;

    let eig = SymmetricEigen::try_new(cov, f64::EPSILON, MAX_ITERATIONS)
        .ok_or(MathError::NoConvergence("symmetric eigen-decomposition"))?;

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| {
        eig.eigenvalues[b]
            .partial_cmp(&eig.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let total: f64 = eig.eigenvalues.iter().map(|v| v.max(0.0)).sum();
    if !(total > 0.0) {
        return Err(MathError::Degenerate("zero total variance".to_string()));
    }

    let mut components = DMatrix::zeros(p, k);
    let mut eigenvalues = Vec::with_capacity(k);
    let mut explained_variance_ratio = Vec::with_capacity(k);
    for (c, &idx) in order.iter().take(k).enumerate() {
        let axis = eig.eigenvectors.column(idx);
        let pivot = axis
            .iter()
            .enumerate()
            .fold((0usize, 0.0f64), |best, (i, v)| {
                if v.abs() > best.1 {
                    (i, v.abs())
                } else {
                    best
                }
            })
            .0;
        let sign = if axis[pivot] < 0.0 { -1.0 } else { 1.0 };
        for r in 0..p {
            components[(r, c)] = sign * axis[r];
        }
        let ev = eig.eigenvalues[idx].max(0.0);
        eigenvalues.push(ev);
        explained_variance_ratio.push(ev / total);
    }

    Ok(PrincipalAxes {
        mean,
        components,
        eigenvalues,
        explained_variance_ratio,
    })
}

fn center_columns(data: &DMatrix<f64>, mean: &DVector<f64>) -> DMatrix<f64> {
    let mut centered = data.clone();
    for j in 0..centered.ncols() {
        let m = mean[j];
        for i in 0..centered.nrows() {
            centered[(i, j)] -= m;
        }
    }
    centered
}

/// An eigenvalue together with the real part of its eigenvector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenPair {
    /// Real part of the eigenvalue.
    pub re: f64,
    /// Imaginary part of the eigenvalue.
    pub im: f64,
    /// Modulus of (eigenvalue - target).
    pub distance: f64,
    /// Right eigenvector (unit length, arbitrary sign).
    pub vector: Vec<f64>,
}

/// Find the eigenvalue of `matrix` closest to the real `target` and its
/// right eigenvector.
///
/// The eigenvector is taken as the right singular vector of
/// `matrix - re(λ)·I` with the smallest singular value, i.e. the direction
/// spanning its (numerical) null space. Ties in distance go to the lower
/// eigenvalue index.
pub fn eigenpair_nearest(matrix: &DMatrix<f64>, target: f64) -> Result<EigenPair, MathError> {
    let (rows, cols) = matrix.shape();
    if rows != cols {
        return Err(MathError::NotSquare { rows, cols });
    }
    if rows == 0 {
        return Err(MathError::EmptyInput);
    }
    if rows == 1 {
        let re = matrix[(0, 0)];
        return Ok(EigenPair {
            re,
            im: 0.0,
            distance: (re - target).abs(),
            vector: vec![1.0],
        });
    }

    let schur = Schur::try_new(matrix.clone(), f64::EPSILON, MAX_ITERATIONS)
        .ok_or(MathError::NoConvergence("Schur decomposition"))?;
    let eigenvalues = schur.complex_eigenvalues();
    let target_c = Complex::new(target, 0.0);

    let mut best: Option<(Complex<f64>, f64)> = None;
    for ev in eigenvalues.iter() {
        let d = (ev - target_c).norm();
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((*ev, d)),
        }
    }
    let (lambda, distance) = best.ok_or(MathError::EmptyInput)?;

    let shifted = matrix - DMatrix::identity(rows, rows) * lambda.re;
    let svd = SVD::try_new(shifted, false, true, f64::EPSILON, MAX_ITERATIONS)
        .ok_or(MathError::NoConvergence("singular value decomposition"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| MathError::Degenerate("right singular vectors unavailable".to_string()))?;

    let mut min_idx = 0;
    for (i, s) in svd.singular_values.iter().enumerate() {
        if *s < svd.singular_values[min_idx] {
            min_idx = i;
        }
    }
    let vector: Vec<f64> = v_t.row(min_idx).iter().copied().collect();

    Ok(EigenPair {
        re: lambda.re,
        im: lambda.im,
        distance,
        vector,
    })
}
