//! Structured logging foundation for los-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for batch pipelines
//!
//! # Usage
//!
//! ```ignore
//! use los_core::logging::{init_logging, event_names, LogConfig, LogContext, Stage};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! let ctx = LogContext::new(generate_run_id()).for_session("Morning");
//! log_event!(ctx, INFO, event_names::CLUSTER_FINISHED, Stage::Cluster, "k-means converged",
//!     iterations = 7usize);
//! ```
//!
//! # Design Notes
//!
//! - stdout is reserved for the run summary
//! - stderr receives all log output (human or JSONL)
//! - The library never installs a subscriber; only the binary does

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. A full
/// `RUST_LOG` directive string takes precedence over `config.level`.
/// Returns false if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
                    .is_ok()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
                    .is_ok()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init()
            .is_ok(),
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    // Shorten to first 12 hex chars for readability
    format!("run-{}", &uuid.simple().to_string()[..12])
}

/// Emit a structured event tagged with the context's run id and session.
///
/// Usage:
/// ```ignore
/// log_event!(ctx, INFO, event_names::MARKOV_FINISHED, Stage::Markov, "chain built");
/// log_event!(ctx, WARN, event_names::CLUSTER_NOT_CONVERGED, Stage::Cluster, "cap reached",
///     iterations = 300usize);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            session = %$ctx.session_label(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            session = %$ctx.session_label(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            session = %$ctx.session_label(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            target: $event,
            run_id = %$ctx.run_id,
            session = %$ctx.session_label(),
            stage = %$stage,
            message = %$msg,
            $($key = $val,)*
        )
    };
}
