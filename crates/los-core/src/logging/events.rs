//! Structured event definitions for logging.
//!
//! Every event carries the run id, the session (when one is active) and the
//! pipeline stage it was raised from. Events are emitted through
//! [`crate::log_event!`].

use serde::{Deserialize, Serialize};

/// Log levels for events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the observation table.
    Load,
    /// Encoding, imputation and standardization.
    Prepare,
    /// PCA and k-means.
    Cluster,
    /// Transition matrix and stationary distribution.
    Markov,
    /// Per-location Weibull fits.
    Density,
    /// Cross-session stationary comparison.
    Compare,
    /// Handing results to the plot sink.
    Plot,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Prepare => "prepare",
            Stage::Cluster => "cluster",
            Stage::Markov => "markov",
            Stage::Density => "density",
            Stage::Compare => "compare",
            Stage::Plot => "plot",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_ERROR: &str = "config.error";
    pub const CONFIG_DATA_KEY_MISSING: &str = "config.data_key_missing";

    // Session lifecycle
    pub const SESSION_STARTED: &str = "session.started";
    pub const SESSION_SKIPPED: &str = "session.skipped";
    pub const SESSION_FINISHED: &str = "session.finished";

    // Load / prepare
    pub const LOAD_FINISHED: &str = "load.finished";
    pub const LOAD_FAILED: &str = "load.failed";
    pub const PREPARE_FINISHED: &str = "prepare.finished";
    pub const PREPARE_FAILED: &str = "prepare.failed";

    // Cluster
    pub const CLUSTER_FINISHED: &str = "cluster.finished";
    pub const CLUSTER_NOT_CONVERGED: &str = "cluster.not_converged";
    pub const CLUSTER_FAILED: &str = "cluster.failed";

    // Markov
    pub const MARKOV_TRANSITIONS: &str = "markov.transitions";
    pub const MARKOV_FINISHED: &str = "markov.finished";
    pub const MARKOV_DEGENERATE: &str = "markov.degenerate";
    pub const MARKOV_APPROXIMATE: &str = "markov.approximate";
    pub const MARKOV_FAILED: &str = "markov.failed";

    // Density / compare
    pub const DENSITY_FITTED: &str = "density.fitted";
    pub const DENSITY_SKIPPED: &str = "density.skipped";
    pub const COMPARE_FINISHED: &str = "compare.finished";
    pub const COMPARE_SKIPPED: &str = "compare.skipped";

    // Plot sink
    pub const PLOT_WRITTEN: &str = "plot.written";
    pub const PLOT_FAILED: &str = "plot.failed";
}

/// Correlation context passed explicitly through the pipeline.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Session being analyzed, if any.
    pub session: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            session: None,
        }
    }

    /// A copy of this context scoped to one session.
    pub fn for_session(&self, session: impl Into<String>) -> Self {
        LogContext {
            run_id: self.run_id.clone(),
            session: Some(session.into()),
        }
    }

    /// Session name or `"-"` for run-level events.
    pub fn session_label(&self) -> &str {
        self.session.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_session_keeps_run_id() {
        let ctx = LogContext::new("run-abc");
        let s = ctx.for_session("Afternoon");
        assert_eq!(s.run_id, "run-abc");
        assert_eq!(s.session_label(), "Afternoon");
        assert!(ctx.session.is_none());
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Load,
            Stage::Prepare,
            Stage::Cluster,
            Stage::Markov,
            Stage::Density,
            Stage::Compare,
            Stage::Plot,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_level_from_tracing() {
        assert_eq!(Level::from(tracing::Level::INFO), Level::Info);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
    }
}
