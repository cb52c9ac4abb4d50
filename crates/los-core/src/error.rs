//! Error types for the analysis pipeline.
//!
//! Every error carries:
//! - A stable numeric code for machine parsing
//! - A category for grouping
//! - The pipeline [`Stage`] it belongs to, used when logging and reporting
//!
//! Errors serialize into run summaries as:
//! ```json
//! {
//!   "kind": "DegenerateTransitionError",
//!   "code": 41,
//!   "category": "analysis",
//!   "stage": "markov",
//!   "message": "Degenerate transition matrix: state \"B\" has no outgoing transitions"
//! }
//! ```

use std::path::PathBuf;

use los_config::ConfigError;
use los_math::MathError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::DataLoadError;
use crate::logging::Stage;
use crate::sink::SinkError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Loading or shaping the observation table.
    Data,
    /// Numerical analysis failures.
    Analysis,
    /// Artifact output.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Analysis => write!(f, "analysis"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Pipeline error.
#[derive(Error, Debug)]
pub enum AnalysisError {
    // Configuration (10-19)
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    // Data (30-39)
    #[error("Data load error: {0}")]
    DataLoad(#[from] DataLoadError),

    #[error("Data preparation error: {0}")]
    DataPreparation(String),

    // Analysis (40-49)
    #[error("Clustering error: {0}")]
    Clustering(String),

    #[error("Degenerate transition matrix: {reason}")]
    DegenerateTransition {
        /// The state with no outgoing transitions, when one is at fault.
        state: Option<String>,
        reason: String,
    },

    #[error("No stationary distribution: {reason}")]
    NoStationaryDistribution { reason: String },

    #[error("Density fit failed for location {location}: {source}")]
    Fit {
        location: String,
        #[source]
        source: MathError,
    },

    #[error("Comparison error: {0}")]
    Comparison(String),

    // Output (50-59)
    #[error("Plot sink error: {0}")]
    Sink(#[from] SinkError),
}

impl AnalysisError {
    /// A state with no outgoing transitions under the `fail` policy.
    pub fn zero_row(state: impl Into<String>) -> Self {
        let state = state.into();
        AnalysisError::DegenerateTransition {
            reason: format!("state {state:?} has no outgoing transitions"),
            state: Some(state),
        }
    }

    /// The eigenvalue of Pᵀ nearest 1 is outside the tolerance.
    pub fn eigenvalue_off_unit(re: f64, im: f64, distance: f64, tolerance: f64) -> Self {
        AnalysisError::NoStationaryDistribution {
            reason: format!(
                "nearest eigenvalue {re}{im:+}i is {distance:e} from 1 (tolerance {tolerance:e})"
            ),
        }
    }

    /// Stable error code.
    pub fn code(&self) -> u32 {
        match self {
            AnalysisError::Configuration(_) => 10,
            AnalysisError::DataLoad(_) => 30,
            AnalysisError::DataPreparation(_) => 31,
            AnalysisError::Clustering(_) => 40,
            AnalysisError::DegenerateTransition { .. } => 41,
            AnalysisError::NoStationaryDistribution { .. } => 42,
            AnalysisError::Fit { .. } => 43,
            AnalysisError::Comparison(_) => 44,
            AnalysisError::Sink(_) => 50,
        }
    }

    /// Taxonomy name used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Configuration(_) => "ConfigurationError",
            AnalysisError::DataLoad(_) => "DataLoadError",
            AnalysisError::DataPreparation(_) => "DataPreparationError",
            AnalysisError::Clustering(_) => "ClusteringError",
            AnalysisError::DegenerateTransition { .. } => "DegenerateTransitionError",
            AnalysisError::NoStationaryDistribution { .. } => "NoStationaryDistributionError",
            AnalysisError::Fit { .. } => "FitError",
            AnalysisError::Comparison(_) => "ComparisonError",
            AnalysisError::Sink(_) => "SinkError",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::Configuration(_) => ErrorCategory::Config,
            AnalysisError::DataLoad(_) | AnalysisError::DataPreparation(_) => ErrorCategory::Data,
            AnalysisError::Clustering(_)
            | AnalysisError::DegenerateTransition { .. }
            | AnalysisError::NoStationaryDistribution { .. }
            | AnalysisError::Fit { .. }
            | AnalysisError::Comparison(_) => ErrorCategory::Analysis,
            AnalysisError::Sink(_) => ErrorCategory::Io,
        }
    }

    /// Pipeline stage the error is raised from.
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisError::Configuration(_) => Stage::Init,
            AnalysisError::DataLoad(_) => Stage::Load,
            AnalysisError::DataPreparation(_) => Stage::Prepare,
            AnalysisError::Clustering(_) => Stage::Cluster,
            AnalysisError::DegenerateTransition { .. }
            | AnalysisError::NoStationaryDistribution { .. } => Stage::Markov,
            AnalysisError::Fit { .. } => Stage::Density,
            AnalysisError::Comparison(_) => Stage::Compare,
            AnalysisError::Sink(_) => Stage::Plot,
        }
    }

    /// Path involved in the failure, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            AnalysisError::DataLoad(e) => Some(e.path()),
            AnalysisError::Sink(e) => Some(e.path()),
            _ => None,
        }
    }

    /// Serializable record for run summaries.
    pub fn to_record(&self) -> FailureRecord {
        FailureRecord {
            kind: self.kind().to_string(),
            code: self.code(),
            category: self.category(),
            stage: self.stage(),
            message: self.to_string(),
        }
    }
}

/// A failure as it appears in a session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: String,
    pub code: u32,
    pub category: ErrorCategory,
    pub stage: Stage,
    pub message: String,
}
