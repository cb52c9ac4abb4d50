//! Plot sinks.
//!
//! The pipeline never renders anything itself. Each finished analysis is
//! turned into a [`Plot`] (the arrays a chart would be drawn from plus its
//! title) and handed to a [`PlotSink`].

pub mod json;
pub mod memory;

pub use json::JsonArtifactSink;
pub use memory::MemorySink;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{ClusterResult, Comparison, DensityCurve, MarkovResult, TransitionMatrix};

/// Errors raised while emitting a plot.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl SinkError {
    pub fn path(&self) -> &PathBuf {
        match self {
            SinkError::Io { path, .. } | SinkError::Json { path, .. } => path,
        }
    }
}

/// PCA scatter with cluster colouring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPlot {
    pub title: String,
    pub projection: Vec<[f64; 2]>,
    pub labels: Vec<usize>,
    pub centroids: Vec<[f64; 2]>,
    pub display_labels: Vec<String>,
    pub explained_variance_ratio: [f64; 2],
}

/// Heatmap of the transition matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPlot {
    pub title: String,
    pub states: Vec<String>,
    pub matrix: Vec<Vec<f64>>,
    pub void_states: Vec<String>,
}

/// Bar chart of the stationary distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationaryPlot {
    pub title: String,
    pub states: Vec<String>,
    pub values: Vec<f64>,
    pub approximate: bool,
}

/// One Weibull pdf curve per location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityPlot {
    pub title: String,
    pub curves: Vec<DensityCurve>,
}

/// Smoothed stationary distributions of several sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonPlot {
    pub title: String,
    #[serde(flatten)]
    pub comparison: Comparison,
}

/// Everything a sink can receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Plot {
    Clustering(ClusterPlot),
    TransitionMatrix(TransitionPlot),
    StationaryDistribution(StationaryPlot),
    WeibullDensity(DensityPlot),
    StationaryComparison(ComparisonPlot),
}

impl Plot {
    /// Short kind name, also used in artifact file names.
    pub fn kind(&self) -> &'static str {
        match self {
            Plot::Clustering(_) => "clustering",
            Plot::TransitionMatrix(_) => "transition_matrix",
            Plot::StationaryDistribution(_) => "stationary_distribution",
            Plot::WeibullDensity(_) => "weibull_density",
            Plot::StationaryComparison(_) => "stationary_comparison",
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Plot::Clustering(p) => &p.title,
            Plot::TransitionMatrix(p) => &p.title,
            Plot::StationaryDistribution(p) => &p.title,
            Plot::WeibullDensity(p) => &p.title,
            Plot::StationaryComparison(p) => &p.title,
        }
    }

    pub fn clustering(session: &str, result: &ClusterResult) -> Self {
        Plot::Clustering(ClusterPlot {
            title: format!("{session} Clustering"),
            projection: result.projection.clone(),
            labels: result.labels.clone(),
            centroids: result.centroids.clone(),
            display_labels: result.display_labels.clone(),
            explained_variance_ratio: result.explained_variance_ratio,
        })
    }

    pub fn transition_matrix(session: &str, transition: &TransitionMatrix) -> Self {
        Plot::TransitionMatrix(TransitionPlot {
            title: format!("{session} Transition Matrix"),
            states: transition.states.clone(),
            matrix: transition.probabilities.clone(),
            void_states: transition.void_states.clone(),
        })
    }

    pub fn stationary_distribution(session: &str, result: &MarkovResult) -> Self {
        Plot::StationaryDistribution(StationaryPlot {
            title: format!("{session} Stationary Distribution"),
            states: result.transition.states.clone(),
            values: result.stationary.values.clone(),
            approximate: result.stationary.approximate,
        })
    }

    pub fn weibull_density(session: &str, curves: Vec<DensityCurve>) -> Self {
        Plot::WeibullDensity(DensityPlot {
            title: format!("{session} Weibull Distribution"),
            curves,
        })
    }

    pub fn stationary_comparison(comparison: Comparison) -> Self {
        Plot::StationaryComparison(ComparisonPlot {
            title: "Stationary Distributions".to_string(),
            comparison,
        })
    }
}

/// Receives finished plots.
///
/// `session` is `None` for plots that span sessions.
pub trait PlotSink {
    /// Sink name used in logs.
    fn name(&self) -> &str;

    /// Accept one plot. Returns where it ended up, if it has a location.
    fn emit(&mut self, session: Option<&str>, plot: &Plot) -> Result<Option<PathBuf>, SinkError>;
}

impl<S: PlotSink + ?Sized> PlotSink for &mut S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn emit(&mut self, session: Option<&str>, plot: &Plot) -> Result<Option<PathBuf>, SinkError> {
        (**self).emit(session, plot)
    }
}
