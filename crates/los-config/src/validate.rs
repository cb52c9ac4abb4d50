//! Semantic validation of run settings.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::settings::{SessionConfig, Settings};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Duplicate session name: {0}")]
    DuplicateSession(String),
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::DuplicateSession(_) => 67,
        }
    }
}

/// Validate the file-level settings semantically.
///
/// Per-session checks live in [`validate_session`].
pub fn validate_settings(settings: &Settings) -> ValidationResult<()> {
    if settings.features.clustering.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "features.clustering".to_string(),
            message: "Must list at least one column".to_string(),
        });
    }
    if settings.features.clustering.iter().any(|c| c.trim().is_empty()) {
        return Err(ValidationError::InvalidValue {
            field: "features.clustering".to_string(),
            message: "Column names must not be blank".to_string(),
        });
    }

    if settings.sessions.is_empty() {
        return Err(ValidationError::MissingField("sessions".to_string()));
    }

    let mut seen = BTreeSet::new();
    for session in &settings.sessions {
        if !session.name.trim().is_empty() && !seen.insert(session.name.as_str()) {
            return Err(ValidationError::DuplicateSession(session.name.clone()));
        }
    }

    if settings.clustering.max_iterations == 0 {
        return Err(ValidationError::InvalidValue {
            field: "clustering.max_iterations".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }
    validate_positive("clustering.tolerance", settings.clustering.tolerance)?;
    validate_positive("markov.eigen_tolerance", settings.markov.eigen_tolerance)?;
    validate_points("density.points", settings.density.points)?;
    validate_points("comparison.points", settings.comparison.points)?;

    Ok(())
}

/// Validate one session entry; `idx` is its position in `sessions`.
///
/// Kept apart from [`validate_settings`] so a bad session can be skipped
/// while the others still run.
pub fn validate_session(idx: usize, session: &SessionConfig) -> ValidationResult<()> {
    if session.name.trim().is_empty() {
        return Err(ValidationError::MissingField(format!("sessions[{idx}].name")));
    }
    if session.clusters == 0 {
        return Err(ValidationError::InvalidValue {
            field: format!("sessions[{idx}].clusters"),
            message: "Must be at least 1".to_string(),
        });
    }
    if let Some(intervals) = &session.time_intervals {
        if intervals.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("sessions[{idx}].time_intervals"),
                message: "Must not be empty when present".to_string(),
            });
        }
    }
    Ok(())
}

fn validate_positive(field: &str, value: f64) -> ValidationResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be positive and finite, got {value}"),
        });
    }
    Ok(())
}

fn validate_points(field: &str, points: usize) -> ValidationResult<()> {
    if points < 2 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be at least 2, got {points}"),
        });
    }
    Ok(())
}
