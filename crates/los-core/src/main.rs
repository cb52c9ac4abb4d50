//! `los` - traffic level-of-service analysis
//!
//! The entry point handles:
//! - Config resolution and validation
//! - Running the configured sessions and writing plot artifacts
//! - One-off Markov analysis of a single table
//!
//! stdout carries exactly one JSON document per command; logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use los_config::{load_config, validate_session, ConfigError, LoadedConfig, ZeroRowPolicy};
use los_core::analysis::{stationary_distribution, transition_matrix};
use los_core::data::{FileTableSource, TableSource};
use los_core::exit_codes::ExitCode;
use los_core::log_event;
use los_core::logging::{
    event_names, generate_run_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use los_core::session::run_sessions;
use los_core::sink::JsonArtifactSink;
use los_core::AnalysisError;
use serde::Serialize;

/// Traffic level-of-service clustering and Markov analysis
#[derive(Parser)]
#[command(name = "los")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the YAML config file (overrides LOS_CONFIG and discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr: human or jsonl
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every configured session and write plot artifacts
    Run(RunArgs),

    /// Transition matrix and stationary distribution of one table
    Markov(MarkovArgs),

    /// Validate the configuration and report where it came from
    Check,

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Only run the named session
    #[arg(long)]
    session: Option<String>,

    /// Override the configured output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MarkovArgs {
    /// Table file (.json, .jsonl or .ndjson)
    file: PathBuf,

    /// Keep states without outgoing transitions as all-zero rows
    #[arg(long)]
    absorbing_void: bool,

    /// Maximum distance of the selected eigenvalue from 1
    #[arg(long, default_value = "1e-8")]
    tolerance: f64,
}

fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(cli_level, cli.global.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id());
    let exit_code = match cli.command {
        Commands::Run(args) => run_analysis(&cli.global, &ctx, &args),
        Commands::Markov(args) => run_markov(&ctx, &args),
        Commands::Check => run_check(&cli.global, &ctx),
        Commands::Version => print_version(),
    };

    std::process::exit(exit_code.as_i32());
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{text}");
            ExitCode::Clean
        }
        Err(e) => {
            eprintln!("failed to serialize output: {e}");
            ExitCode::InternalError
        }
    }
}

/// Print the JSON result and keep `code` unless printing itself failed.
fn emit<T: Serialize>(value: &T, code: ExitCode) -> ExitCode {
    match print_json(value) {
        ExitCode::Clean => code,
        failed => failed,
    }
}

fn config_exit_code(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::IoError { .. } => ExitCode::IoError,
        _ => ExitCode::ConfigError,
    }
}

fn load(global: &GlobalOpts, ctx: &LogContext) -> Result<LoadedConfig, ExitCode> {
    match load_config(global.config.as_deref()) {
        Ok(loaded) => {
            log_event!(
                ctx,
                INFO,
                event_names::CONFIG_LOADED,
                Stage::Init,
                "configuration loaded",
                path = loaded.path.display().to_string().as_str(),
                source = loaded.source.to_string().as_str(),
                hash = loaded.hash.as_str(),
                sessions = loaded.settings.sessions.len()
            );
            Ok(loaded)
        }
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::CONFIG_ERROR,
                Stage::Init,
                e.to_string(),
                code = e.code()
            );
            let exit = config_exit_code(&e);
            let err = AnalysisError::from(e);
            Err(emit(
                &serde_json::json!({
                    "status": "error",
                    "error": err.to_record(),
                }),
                exit,
            ))
        }
    }
}

fn run_analysis(global: &GlobalOpts, ctx: &LogContext, args: &RunArgs) -> ExitCode {
    let loaded = match load(global, ctx) {
        Ok(l) => l,
        Err(code) => return code,
    };

    if let Some(name) = &args.session {
        if loaded.settings.session(name).is_none() {
            let known: Vec<&str> = loaded
                .settings
                .sessions
                .iter()
                .map(|s| s.name.as_str())
                .collect();
            return emit(
                &serde_json::json!({
                    "status": "error",
                    "error": {
                        "message": format!("unknown session {name:?}"),
                        "known_sessions": known,
                    }
                }),
                ExitCode::ArgsError,
            );
        }
    }

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| loaded.settings.output_dir.clone());
    let mut sink = JsonArtifactSink::new(output_dir);

    let outcome = run_sessions(
        ctx,
        &loaded.settings,
        &FileTableSource,
        &mut sink,
        args.session.as_deref(),
    );
    let mut summary = outcome.summary;
    summary.config_path = Some(loaded.path);
    summary.config_hash = Some(loaded.hash);

    let code = summary.exit_code();
    emit(&summary, code)
}

#[derive(Serialize)]
struct MarkovOutput<'a> {
    status: &'static str,
    file: &'a PathBuf,
    states: &'a [String],
    matrix: &'a [Vec<f64>],
    void_states: &'a [String],
    stationary: &'a [f64],
    approximate: bool,
}

fn run_markov(ctx: &LogContext, args: &MarkovArgs) -> ExitCode {
    let table = match FileTableSource.load(&args.file) {
        Ok(t) => t,
        Err(e) => {
            let err = AnalysisError::from(e);
            log_event!(
                ctx,
                ERROR,
                event_names::LOAD_FAILED,
                Stage::Load,
                err.to_string(),
                code = err.code()
            );
            return emit(
                &serde_json::json!({ "status": "error", "error": err.to_record() }),
                ExitCode::ArgsError,
            );
        }
    };

    let policy = if args.absorbing_void {
        ZeroRowPolicy::AbsorbingVoid
    } else {
        ZeroRowPolicy::Fail
    };
    let transition = match transition_matrix(&table.states(), policy) {
        Ok(t) => t,
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::MARKOV_DEGENERATE,
                Stage::Markov,
                err.to_string(),
                code = err.code()
            );
            return emit(
                &serde_json::json!({ "status": "error", "error": err.to_record() }),
                ExitCode::PartialFail,
            );
        }
    };

    match stationary_distribution(&transition.to_dmatrix(), args.tolerance) {
        Ok(stationary) => {
            log_event!(
                ctx,
                INFO,
                event_names::MARKOV_FINISHED,
                Stage::Markov,
                format!("{} states", transition.len()),
                rows = table.len()
            );
            print_json(&MarkovOutput {
                status: "ok",
                file: &args.file,
                states: &transition.states,
                matrix: &transition.probabilities,
                void_states: &transition.void_states,
                stationary: &stationary.values,
                approximate: stationary.approximate,
            })
        }
        Err(err) => {
            log_event!(
                ctx,
                ERROR,
                event_names::MARKOV_FAILED,
                Stage::Markov,
                err.to_string(),
                code = err.code()
            );
            // The matrix is still reported when only the stationary step failed.
            emit(
                &serde_json::json!({
                    "status": "error",
                    "error": err.to_record(),
                    "file": args.file,
                    "states": transition.states,
                    "matrix": transition.probabilities,
                    "void_states": transition.void_states,
                }),
                ExitCode::PartialFail,
            )
        }
    }
}

fn run_check(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    let loaded = match load(global, ctx) {
        Ok(l) => l,
        Err(code) => return code,
    };
    let sessions: Vec<serde_json::Value> = loaded
        .settings
        .sessions
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            let path = loaded.settings.data_path_for(s);
            let error = validate_session(idx, s).err().map(|e| e.to_string());
            serde_json::json!({
                "name": s.name,
                "clusters": s.clusters,
                "data_path": path,
                "data_exists": path.is_file(),
                "valid": error.is_none(),
                "error": error,
            })
        })
        .collect();
    print_json(&serde_json::json!({
        "status": "ok",
        "config_path": loaded.path,
        "source": loaded.source.to_string(),
        "hash": loaded.hash,
        "output_dir": loaded.settings.output_dir,
        "sessions": sessions,
    }))
}

fn print_version() -> ExitCode {
    print_json(&serde_json::json!({
        "los_version": env!("CARGO_PKG_VERSION"),
        "rust_version": env!("CARGO_PKG_RUST_VERSION"),
    }))
}
