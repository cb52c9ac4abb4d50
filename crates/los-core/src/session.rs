//! Session orchestration.
//!
//! A session is one named slice of the traffic data (e.g. "Morning"). For
//! each session the table is loaded and filtered, then two independent
//! branches run:
//!
//! ```text
//! table ─┬─ prepare ─ cluster ─────────────▶ sink
//!        ├─ LOS column ─ markov ───────────▶ sink
//!        └─ LOS value per location ─ density ▶ sink
//! ```
//!
//! A failure in one branch is logged, recorded in the [`SessionReport`] and
//! never stops the others. Once every session has run, the stationary
//! distributions are compared across sessions.

use std::path::{Path, PathBuf};

use los_config::{validate_session, ConfigError, SessionConfig, Settings};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    analyze_clusters, analyze_density, compare_stationary, prepare_features,
    stationary_distribution, transition_matrix, ClusterResult, Comparison, KMeansParams,
    MarkovResult, SessionDistribution, TransitionMatrix,
};
use crate::data::{ObservationTable, TableSource};
use crate::error::{AnalysisError, FailureRecord};
use crate::exit_codes::ExitCode;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::sink::{Plot, PlotSink};

/// Final state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Every stage succeeded.
    Complete,
    /// At least one stage failed; others produced results.
    Partial,
    /// The table could not be loaded; nothing ran.
    Skipped,
}

/// What happened to one session, as printed in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub name: String,
    pub status: SessionStatus,
    pub data_path: Option<PathBuf>,
    /// Rows after the time-interval filter.
    pub rows: usize,
    pub stages_completed: Vec<Stage>,
    pub failures: Vec<FailureRecord>,
}

impl SessionReport {
    fn new(name: &str, data_path: Option<PathBuf>) -> Self {
        SessionReport {
            name: name.to_string(),
            status: SessionStatus::Complete,
            data_path,
            rows: 0,
            stages_completed: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn completed(&mut self, stage: Stage) {
        if !self.stages_completed.contains(&stage) {
            self.stages_completed.push(stage);
        }
    }

    fn failed(&mut self, err: &AnalysisError) {
        self.failures.push(err.to_record());
    }

    fn finish(&mut self) {
        if self.status != SessionStatus::Skipped && !self.failures.is_empty() {
            self.status = SessionStatus::Partial;
        }
    }
}

/// Results of one session, kept for cross-session steps and tests.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub report: SessionReport,
    pub cluster: Option<ClusterResult>,
    /// Set whenever the transition matrix could be built, even if the
    /// stationary step failed.
    pub transition: Option<TransitionMatrix>,
    pub markov: Option<MarkovResult>,
}

/// Outcome of the cross-session comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Complete,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub status: ComparisonStatus,
    pub sessions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

/// Machine-readable summary of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub sessions: Vec<SessionReport>,
    pub comparison: ComparisonReport,
}

impl RunSummary {
    /// Map the run outcome to a process exit code.
    pub fn exit_code(&self) -> ExitCode {
        if self.sessions.is_empty()
            || self
                .sessions
                .iter()
                .all(|s| s.status == SessionStatus::Skipped)
        {
            return ExitCode::AllSkipped;
        }
        let sessions_clean = self
            .sessions
            .iter()
            .all(|s| s.status == SessionStatus::Complete);
        if sessions_clean && self.comparison.status != ComparisonStatus::Failed {
            ExitCode::Clean
        } else {
            ExitCode::PartialFail
        }
    }
}

/// Everything [`run_sessions`] produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub sessions: Vec<SessionOutcome>,
    pub comparison: Option<Comparison>,
}

/// Hand a plot to the sink, recording a failure instead of propagating it.
fn emit_plot(
    ctx: &LogContext,
    sink: &mut dyn PlotSink,
    session: Option<&str>,
    plot: Plot,
    report: Option<&mut SessionReport>,
) -> bool {
    match sink.emit(session, &plot) {
        Ok(location) => {
            let location = location
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            log_event!(
                ctx,
                DEBUG,
                event_names::PLOT_WRITTEN,
                Stage::Plot,
                plot.title(),
                kind = plot.kind(),
                sink = sink.name(),
                location = location.as_str()
            );
            true
        }
        Err(e) => {
            let err = AnalysisError::from(e);
            log_event!(
                ctx,
                ERROR,
                event_names::PLOT_FAILED,
                Stage::Plot,
                err.to_string(),
                kind = plot.kind(),
                code = err.code()
            );
            if let Some(report) = report {
                report.failed(&err);
            }
            false
        }
    }
}

fn log_failure(ctx: &LogContext, event: &'static str, err: &AnalysisError) {
    // Event targets must be static, so route by name.
    match event {
        event_names::PREPARE_FAILED => log_event!(
            ctx,
            ERROR,
            event_names::PREPARE_FAILED,
            Stage::Prepare,
            err.to_string(),
            kind = err.kind(),
            code = err.code()
        ),
        event_names::CLUSTER_FAILED => log_event!(
            ctx,
            ERROR,
            event_names::CLUSTER_FAILED,
            Stage::Cluster,
            err.to_string(),
            kind = err.kind(),
            code = err.code()
        ),
        event_names::MARKOV_DEGENERATE => log_event!(
            ctx,
            WARN,
            event_names::MARKOV_DEGENERATE,
            Stage::Markov,
            err.to_string(),
            kind = err.kind(),
            code = err.code()
        ),
        _ => log_event!(
            ctx,
            ERROR,
            event_names::MARKOV_FAILED,
            Stage::Markov,
            err.to_string(),
            kind = err.kind(),
            code = err.code()
        ),
    }
}

fn cluster_branch(
    ctx: &LogContext,
    settings: &Settings,
    session: &SessionConfig,
    table: &ObservationTable,
    sink: &mut dyn PlotSink,
    report: &mut SessionReport,
) -> Option<ClusterResult> {
    let prepared = match prepare_features(table, &settings.features.clustering) {
        Ok(p) => p,
        Err(e) => {
            log_failure(ctx, event_names::PREPARE_FAILED, &e);
            report.failed(&e);
            return None;
        }
    };
    report.completed(Stage::Prepare);
    log_event!(
        ctx,
        DEBUG,
        event_names::PREPARE_FINISHED,
        Stage::Prepare,
        "features prepared",
        rows = prepared.data.nrows(),
        columns = prepared.data.ncols(),
        informative = prepared.informative_columns()
    );

    let params = KMeansParams::from_config(&settings.clustering, session.clusters);
    let result = match analyze_clusters(&prepared, &params, &session.name) {
        Ok(r) => r,
        Err(e) => {
            log_failure(ctx, event_names::CLUSTER_FAILED, &e);
            report.failed(&e);
            return None;
        }
    };
    report.completed(Stage::Cluster);

    if !result.converged {
        log_event!(
            ctx,
            WARN,
            event_names::CLUSTER_NOT_CONVERGED,
            Stage::Cluster,
            "k-means stopped at the iteration cap",
            iterations = result.iterations
        );
    }
    let centroids = format!("{:?}", result.centroids);
    log_event!(
        ctx,
        INFO,
        event_names::CLUSTER_FINISHED,
        Stage::Cluster,
        format!("{} clusters", params.k),
        k = params.k,
        iterations = result.iterations,
        inertia = result.inertia,
        explained_pc1 = result.explained_variance_ratio[0],
        explained_pc2 = result.explained_variance_ratio[1],
        centroids = centroids.as_str()
    );

    if emit_plot(
        ctx,
        sink,
        Some(&session.name),
        Plot::clustering(&session.name, &result),
        Some(&mut *report),
    ) {
        report.completed(Stage::Plot);
    }
    Some(result)
}

fn markov_branch(
    ctx: &LogContext,
    settings: &Settings,
    session: &SessionConfig,
    table: &ObservationTable,
    sink: &mut dyn PlotSink,
    report: &mut SessionReport,
) -> (Option<TransitionMatrix>, Option<MarkovResult>) {
    let transition = match transition_matrix(&table.states(), settings.markov.zero_row_policy) {
        Ok(t) => t,
        Err(e) => {
            log_failure(ctx, event_names::MARKOV_DEGENERATE, &e);
            report.failed(&e);
            return (None, None);
        }
    };
    let matrix = format!("{:?}", transition.probabilities);
    let states = transition.states.join(",");
    let void_states = transition.void_states.join(",");
    log_event!(
        ctx,
        INFO,
        event_names::MARKOV_TRANSITIONS,
        Stage::Markov,
        format!("{} states", transition.len()),
        policy = settings.markov.zero_row_policy.to_string().as_str(),
        states = states.as_str(),
        matrix = matrix.as_str(),
        void_states = void_states.as_str()
    );
    // The matrix is plotted even when no stationary distribution follows.
    let transition_ok = emit_plot(
        ctx,
        sink,
        Some(&session.name),
        Plot::transition_matrix(&session.name, &transition),
        Some(&mut *report),
    );

    let stationary =
        match stationary_distribution(&transition.to_dmatrix(), settings.markov.eigen_tolerance) {
            Ok(s) => s,
            Err(e) => {
                log_failure(ctx, event_names::MARKOV_FAILED, &e);
                report.failed(&e);
                return (Some(transition), None);
            }
        };
    report.completed(Stage::Markov);

    if stationary.approximate {
        log_event!(
            ctx,
            WARN,
            event_names::MARKOV_APPROXIMATE,
            Stage::Markov,
            "negative stationary components were clamped"
        );
    }
    let values = format!("{:?}", stationary.values);
    log_event!(
        ctx,
        INFO,
        event_names::MARKOV_FINISHED,
        Stage::Markov,
        "stationary distribution solved",
        stationary = values.as_str(),
        eigenvalue = stationary.eigenvalue
    );

    let result = MarkovResult {
        transition: transition.clone(),
        stationary,
    };
    let stationary_ok = emit_plot(
        ctx,
        sink,
        Some(&session.name),
        Plot::stationary_distribution(&session.name, &result),
        Some(&mut *report),
    );
    if transition_ok && stationary_ok {
        report.completed(Stage::Plot);
    }
    (Some(transition), Some(result))
}

fn density_branch(
    ctx: &LogContext,
    settings: &Settings,
    session: &SessionConfig,
    table: &ObservationTable,
    sink: &mut dyn PlotSink,
    report: &mut SessionReport,
) {
    let density = analyze_density(table, &settings.density);
    for location in &density.empty {
        log_event!(
            ctx,
            INFO,
            event_names::DENSITY_SKIPPED,
            Stage::Density,
            "no LOS values for location",
            location = location.as_str()
        );
    }
    for err in &density.failures {
        log_event!(
            ctx,
            WARN,
            event_names::DENSITY_SKIPPED,
            Stage::Density,
            err.to_string(),
            kind = err.kind(),
            code = err.code()
        );
        report.failed(err);
    }
    for curve in &density.curves {
        log_event!(
            ctx,
            DEBUG,
            event_names::DENSITY_FITTED,
            Stage::Density,
            "weibull fitted",
            location = curve.location.as_str(),
            shape = curve.fit.shape,
            scale = curve.fit.scale,
            mean = curve.mean,
            n = curve.fit.n,
            excluded = curve.fit.excluded
        );
    }
    if density.curves.is_empty() {
        return;
    }
    report.completed(Stage::Density);
    if emit_plot(
        ctx,
        sink,
        Some(&session.name),
        Plot::weibull_density(&session.name, density.curves),
        Some(&mut *report),
    ) {
        report.completed(Stage::Plot);
    }
}

/// Run every analysis branch of one session over an already loaded table.
///
/// An invalid session entry is skipped. Otherwise the table is filtered to
/// the session's time intervals first.
pub fn run_session(
    ctx: &LogContext,
    settings: &Settings,
    session: &SessionConfig,
    table: &ObservationTable,
    sink: &mut dyn PlotSink,
) -> SessionOutcome {
    let ctx = ctx.for_session(&session.name);
    let mut report = SessionReport::new(&session.name, None);
    let idx = settings
        .sessions
        .iter()
        .position(|s| s == session)
        .unwrap_or_default();
    if let Err(e) = validate_session(idx, session) {
        return skip_session(&ctx, report, &AnalysisError::from(ConfigError::from(e)));
    }
    run_loaded(&ctx, settings, session, table, sink, &mut report)
}

/// Record why a session did not run and return its outcome.
fn skip_session(
    ctx: &LogContext,
    mut report: SessionReport,
    err: &AnalysisError,
) -> SessionOutcome {
    log_event!(
        ctx,
        ERROR,
        event_names::SESSION_SKIPPED,
        err.stage(),
        err.to_string(),
        kind = err.kind(),
        code = err.code()
    );
    report.failed(err);
    report.status = SessionStatus::Skipped;
    SessionOutcome {
        report,
        cluster: None,
        transition: None,
        markov: None,
    }
}

fn run_loaded(
    ctx: &LogContext,
    settings: &Settings,
    session: &SessionConfig,
    table: &ObservationTable,
    sink: &mut dyn PlotSink,
    report: &mut SessionReport,
) -> SessionOutcome {
    let filtered;
    let table = match &session.time_intervals {
        Some(intervals) => {
            filtered = table.filter_intervals(intervals);
            &filtered
        }
        None => table,
    };
    report.rows = table.len();

    let cluster = cluster_branch(ctx, settings, session, table, sink, report);
    let (transition, markov) = markov_branch(ctx, settings, session, table, sink, report);
    if settings.density.enabled {
        density_branch(ctx, settings, session, table, sink, report);
    }

    report.finish();
    log_event!(
        ctx,
        INFO,
        event_names::SESSION_FINISHED,
        Stage::Plot,
        format!("session {:?}", report.status),
        rows = report.rows,
        failures = report.failures.len()
    );

    SessionOutcome {
        report: report.clone(),
        cluster,
        transition,
        markov,
    }
}

fn load_session(
    ctx: &LogContext,
    source: &dyn TableSource,
    path: &Path,
) -> Result<ObservationTable, AnalysisError> {
    let table = source.load(path)?;
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_FINISHED,
        Stage::Load,
        "table loaded",
        source = source.name(),
        path = path.display().to_string().as_str(),
        rows = table.len()
    );
    Ok(table)
}

/// Compare stationary distributions across sessions when enabled and
/// possible.
fn run_comparison(
    ctx: &LogContext,
    settings: &Settings,
    outcomes: &[SessionOutcome],
    sink: &mut dyn PlotSink,
) -> (ComparisonReport, Option<Comparison>) {
    let distributions: Vec<SessionDistribution> = outcomes
        .iter()
        .filter_map(|o| {
            o.markov.as_ref().map(|m| SessionDistribution {
                session: o.report.name.clone(),
                states: m.transition.states.clone(),
                values: m.stationary.values.clone(),
            })
        })
        .collect();
    let sessions: Vec<String> = distributions.iter().map(|d| d.session.clone()).collect();

    if !settings.comparison.enabled || distributions.len() < 2 {
        let reason = if settings.comparison.enabled {
            "fewer than two stationary distributions"
        } else {
            "comparison disabled"
        };
        log_event!(
            ctx,
            INFO,
            event_names::COMPARE_SKIPPED,
            Stage::Compare,
            reason,
            available = distributions.len()
        );
        return (
            ComparisonReport {
                status: ComparisonStatus::Skipped,
                sessions,
                failure: None,
            },
            None,
        );
    }

    match compare_stationary(&distributions, settings.comparison.points) {
        Ok(comparison) => {
            log_event!(
                ctx,
                INFO,
                event_names::COMPARE_FINISHED,
                Stage::Compare,
                "stationary distributions compared",
                sessions = sessions.join(",").as_str(),
                states = comparison.states.len()
            );
            let written = emit_plot(
                ctx,
                sink,
                None,
                Plot::stationary_comparison(comparison.clone()),
                None,
            );
            let status = if written {
                ComparisonStatus::Complete
            } else {
                ComparisonStatus::Failed
            };
            (
                ComparisonReport {
                    status,
                    sessions,
                    failure: None,
                },
                Some(comparison),
            )
        }
        Err(e) => {
            log_event!(
                ctx,
                ERROR,
                event_names::COMPARE_SKIPPED,
                Stage::Compare,
                e.to_string(),
                code = e.code()
            );
            (
                ComparisonReport {
                    status: ComparisonStatus::Failed,
                    sessions,
                    failure: Some(e.to_record()),
                },
                None,
            )
        }
    }
}

/// Load and analyze the selected sessions, then compare them.
///
/// `only` restricts the run to one session by name. Sessions are processed
/// in configuration order, one at a time.
pub fn run_sessions(
    ctx: &LogContext,
    settings: &Settings,
    source: &dyn TableSource,
    sink: &mut dyn PlotSink,
    only: Option<&str>,
) -> RunOutcome {
    let selected: Vec<(usize, &SessionConfig)> = settings
        .sessions
        .iter()
        .enumerate()
        .filter(|(_, s)| only.map_or(true, |name| s.name == name))
        .collect();
    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "analysis run started",
        sessions = selected.len()
    );

    let mut outcomes = Vec::with_capacity(selected.len());
    for (idx, session) in selected {
        let ctx = ctx.for_session(&session.name);
        let span = tracing::info_span!("session", session = %session.name);
        let _guard = span.enter();

        let path = settings.data_path_for(session);
        let mut report = SessionReport::new(&session.name, Some(path.clone()));
        if let Err(e) = validate_session(idx, session) {
            let err = AnalysisError::from(ConfigError::from(e));
            outcomes.push(skip_session(&ctx, report, &err));
            continue;
        }

        log_event!(
            ctx,
            INFO,
            event_names::SESSION_STARTED,
            Stage::Load,
            "session started",
            clusters = session.clusters
        );
        if let Some(key) = settings.unresolved_data_key(session) {
            log_event!(
                ctx,
                WARN,
                event_names::CONFIG_DATA_KEY_MISSING,
                Stage::Load,
                "data_key not found in data_paths; using the fallback path",
                data_key = key,
                path = path.display().to_string().as_str()
            );
        }

        let table = match load_session(&ctx, source, &path) {
            Ok(t) => t,
            Err(e) => {
                outcomes.push(skip_session(&ctx, report, &e));
                continue;
            }
        };
        report.completed(Stage::Load);
        outcomes.push(run_loaded(&ctx, settings, session, &table, sink, &mut report));
    }

    let (comparison_report, comparison) = run_comparison(ctx, settings, &outcomes, sink);

    let summary = RunSummary {
        run_id: ctx.run_id.clone(),
        config_path: None,
        config_hash: None,
        sessions: outcomes.iter().map(|o| o.report.clone()).collect(),
        comparison: comparison_report,
    };
    log_event!(
        ctx,
        INFO,
        event_names::RUN_FINISHED,
        Stage::Plot,
        "analysis run finished",
        exit_code = summary.exit_code().as_i32()
    );

    RunOutcome {
        summary,
        sessions: outcomes,
        comparison,
    }
}
