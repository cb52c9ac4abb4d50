//! The statistical core: preparation, clustering, Markov chain, densities.
//!
//! Every function here is a pure transform from its inputs to a result
//! value. Nothing logs and nothing touches the filesystem; the session
//! orchestrator does both.

pub mod cluster;
pub mod compare;
pub mod density;
pub mod markov;
pub mod prepare;

pub use cluster::{analyze_clusters, display_labels, kmeans, ClusterResult, KMeansFit, KMeansParams};
pub use compare::{compare_stationary, Comparison, ComparisonCurve, SessionDistribution};
pub use density::{analyze_density, fit_location, DensityCurve, DensityReport};
pub use markov::{
    analyze_markov, stationary_distribution, transition_matrix, MarkovResult,
    StationaryDistribution, TransitionMatrix,
};
pub use prepare::{label_encode, prepare_features, PreparedMatrix};
