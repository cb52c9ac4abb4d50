//! Reading observation tables from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::table::{Observation, ObservationTable};

/// Errors returned by table sources.
#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("table not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}{}: {message}", line_suffix(.line))]
    Parse {
        path: PathBuf,
        /// 1-based line for JSON Lines input.
        line: Option<usize>,
        message: String,
    },

    #[error("unsupported table format for {path}: {extension:?}")]
    UnsupportedFormat { path: PathBuf, extension: String },
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" line {l}")).unwrap_or_default()
}

impl DataLoadError {
    pub fn path(&self) -> &PathBuf {
        match self {
            DataLoadError::NotFound { path }
            | DataLoadError::Io { path, .. }
            | DataLoadError::Parse { path, .. }
            | DataLoadError::UnsupportedFormat { path, .. } => path,
        }
    }
}

/// Where observation tables come from.
pub trait TableSource {
    /// Source name used for logs.
    fn name(&self) -> &str;
    /// Load the table stored at `path`.
    fn load(&self, path: &Path) -> Result<ObservationTable, DataLoadError>;
}

/// On-disk table encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// A single JSON array of records.
    Json,
    /// One JSON record per line.
    Jsonl,
}

impl TableFormat {
    /// Pick the format from the file extension.
    pub fn detect(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();
        match ext.as_str() {
            "json" => Ok(TableFormat::Json),
            "jsonl" | "ndjson" => Ok(TableFormat::Jsonl),
            _ => Err(DataLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: ext,
            }),
        }
    }
}

/// Reads JSON and JSON Lines files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTableSource;

impl TableSource for FileTableSource {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self, path: &Path) -> Result<ObservationTable, DataLoadError> {
        let format = TableFormat::detect(path)?;
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataLoadError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(DataLoadError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        parse_table(&content, format, path)
    }
}

/// Parse table text in the given format. `path` is only used in errors.
pub fn parse_table(
    content: &str,
    format: TableFormat,
    path: &Path,
) -> Result<ObservationTable, DataLoadError> {
    match format {
        TableFormat::Json => {
            let rows: Vec<Observation> =
                serde_json::from_str(content).map_err(|e| DataLoadError::Parse {
                    path: path.to_path_buf(),
                    line: None,
                    message: e.to_string(),
                })?;
            Ok(ObservationTable::new(rows))
        }
        TableFormat::Jsonl => {
            let mut rows = Vec::new();
            for (idx, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let obs: Observation =
                    serde_json::from_str(line).map_err(|e| DataLoadError::Parse {
                        path: path.to_path_buf(),
                        line: Some(idx + 1),
                        message: e.to_string(),
                    })?;
                rows.push(obs);
            }
            Ok(ObservationTable::new(rows))
        }
    }
}
