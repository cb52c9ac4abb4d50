//! Traffic Level-of-Service Analysis Core Library
//!
//! This library provides:
//! - Observation table loading (JSON / JSON Lines)
//! - Feature preparation, PCA and seeded k-means clustering
//! - Markov transition matrices and stationary distributions
//! - Per-location Weibull densities and cross-session comparison
//! - Session orchestration with per-branch failure isolation
//! - Plot sinks, structured logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod analysis;
pub mod data;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod session;
pub mod sink;

pub use error::{AnalysisError, ErrorCategory, FailureRecord, Result};
pub use exit_codes::ExitCode;
pub use session::{run_session, run_sessions, RunOutcome, RunSummary, SessionReport, SessionStatus};
