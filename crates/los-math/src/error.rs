//! Errors raised by the numerical primitives.

use thiserror::Error;

/// Failure modes of the numerical routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("empty input")]
    EmptyInput,

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("{0} did not converge")]
    NoConvergence(&'static str),

    #[error("degenerate input: {0}")]
    Degenerate(String),

    #[error("abscissae must be strictly increasing")]
    NotIncreasing,
}
