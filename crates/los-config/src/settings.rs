//! Run configuration types.
//!
//! These types match the YAML layout documented in the repository README.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory searched for session tables that have no explicit data path.
pub const DEFAULT_DATA_DIR: &str = "data/processed";

/// Directory plot artifacts are written to.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Named table paths referenced by `SessionConfig::data_key`.
    #[serde(default)]
    pub data_paths: BTreeMap<String, PathBuf>,

    pub features: FeatureSets,

    pub sessions: Vec<SessionConfig>,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub markov: MarkovConfig,

    #[serde(default)]
    pub density: DensityConfig,

    #[serde(default)]
    pub comparison: ComparisonConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

impl Settings {
    /// Parse settings from YAML text. No semantic validation is applied.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Table path for a session.
    ///
    /// Uses `data_paths[data_key]` when the key is present, otherwise
    /// `{data_dir}/{name}_Combined.json`.
    pub fn data_path_for(&self, session: &SessionConfig) -> PathBuf {
        session
            .data_key
            .as_ref()
            .and_then(|key| self.data_paths.get(key))
            .cloned()
            .unwrap_or_else(|| fallback_data_path(&self.data_dir, &session.name))
    }

    /// The session's `data_key` when it names no entry in `data_paths`.
    ///
    /// Such a session silently reads the fallback path, so callers warn.
    pub fn unresolved_data_key<'a>(&self, session: &'a SessionConfig) -> Option<&'a str> {
        session
            .data_key
            .as_deref()
            .filter(|key| !self.data_paths.contains_key(*key))
    }

    /// Look up a session by name (exact match).
    pub fn session(&self, name: &str) -> Option<&SessionConfig> {
        self.sessions.iter().find(|s| s.name == name)
    }
}

/// `{data_dir}/{name}_Combined.json`.
pub fn fallback_data_path(data_dir: &Path, session_name: &str) -> PathBuf {
    data_dir.join(format!("{session_name}_Combined.json"))
}

/// Column-name subsets used by the two analyses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSets {
    /// Columns fed to the feature preparer and PCA.
    pub clustering: Vec<String>,
    /// Informational; the chain is built from the `LOS` column.
    pub markov: Vec<String>,
}

/// One traffic session (e.g. "Morning").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub name: String,

    #[serde(default)]
    pub data_key: Option<String>,

    /// Number of k-means clusters.
    pub clusters: usize,

    /// Time-interval labels kept for this session. `None` keeps every row.
    #[serde(default)]
    pub time_intervals: Option<Vec<String>>,
}

/// k-means parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub seed: u64,
    pub max_iterations: usize,
    /// Stop when no centroid moves further than this.
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_iterations: 300,
            tolerance: 1e-4,
        }
    }
}

/// How a state with no outgoing transition is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroRowPolicy {
    /// Reject the sequence, naming the state.
    #[default]
    Fail,
    /// Keep an all-zero row and list the state as void.
    AbsorbingVoid,
}

impl fmt::Display for ZeroRowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZeroRowPolicy::Fail => write!(f, "fail"),
            ZeroRowPolicy::AbsorbingVoid => write!(f, "absorbing_void"),
        }
    }
}

/// Markov chain parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkovConfig {
    pub zero_row_policy: ZeroRowPolicy,
    /// Maximum distance between 1 and the selected eigenvalue.
    pub eigen_tolerance: f64,
}

impl Default for MarkovConfig {
    fn default() -> Self {
        Self {
            zero_row_policy: ZeroRowPolicy::Fail,
            eigen_tolerance: 1e-8,
        }
    }
}

/// Per-location Weibull density fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    pub enabled: bool,
    /// Locations to fit. Empty means every location in the table.
    pub locations: Vec<String>,
    pub points: usize,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locations: Vec::new(),
            points: 1000,
        }
    }
}

/// Cross-session stationary distribution comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    pub enabled: bool,
    pub points: usize,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points: 500,
        }
    }
}
