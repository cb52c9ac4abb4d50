//! Writes each plot as a pretty-printed JSON artifact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Plot, PlotSink, SinkError};

/// Writes `{session_lower}_{kind}.json` (or `{kind}.json` for cross-session
/// plots) into an output directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactSink {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl JsonArtifactSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        JsonArtifactSink {
            output_dir: output_dir.into(),
            written: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Paths written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn artifact_path(&self, session: Option<&str>, plot: &Plot) -> PathBuf {
        let file_name = match session {
            Some(s) => format!("{}_{}.json", s.to_lowercase(), plot.kind()),
            None => format!("{}.json", plot.kind()),
        };
        self.output_dir.join(file_name)
    }
}

impl PlotSink for JsonArtifactSink {
    fn name(&self) -> &str {
        "json"
    }

    fn emit(&mut self, session: Option<&str>, plot: &Plot) -> Result<Option<PathBuf>, SinkError> {
        let path = self.artifact_path(session, plot);
        write_json_atomic(&path, plot)?;
        self.written.push(path.clone());
        Ok(Some(path))
    }
}

/// Write through a temp file in the same directory, then rename over `path`.
fn write_json_atomic(path: &Path, plot: &Plot) -> Result<(), SinkError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SinkError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let content = serde_json::to_vec_pretty(plot).map_err(|e| SinkError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("plot.json");
    let tmp_path = path.with_file_name(format!("{}.tmp.{}", file_name, std::process::id()));
    {
        let mut file = File::create(&tmp_path).map_err(|e| SinkError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        file.write_all(&content).map_err(|e| SinkError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        let _ = file.sync_all();
    }
    fs::rename(&tmp_path, path).map_err(|e| SinkError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TransitionPlot;
    use tempfile::TempDir;

    fn plot() -> Plot {
        Plot::TransitionMatrix(TransitionPlot {
            title: "Morning Transition Matrix".into(),
            states: vec!["A".into(), "B".into()],
            matrix: vec![vec![0.0, 1.0], vec![1.0, 0.0]],
            void_states: vec![],
        })
    }

    #[test]
    fn writes_session_scoped_file() {
        let tmp = TempDir::new().unwrap();
        let mut sink = JsonArtifactSink::new(tmp.path().join("out"));
        let path = sink.emit(Some("Morning"), &plot()).unwrap().unwrap();
        assert_eq!(path, tmp.path().join("out/morning_transition_matrix.json"));

        let v: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(v["kind"], "transition_matrix");
        assert_eq!(v["matrix"][0][1], 1.0);
        assert_eq!(sink.written(), &[path]);
    }

    #[test]
    fn cross_session_plot_has_no_prefix() {
        let sink = JsonArtifactSink::new("/tmp/out");
        assert_eq!(
            sink.artifact_path(None, &plot()),
            PathBuf::from("/tmp/out/transition_matrix.json")
        );
    }

    #[test]
    fn sessions_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let mut sink = JsonArtifactSink::new(tmp.path());
        let a = sink.emit(Some("Morning"), &plot()).unwrap();
        let b = sink.emit(Some("Afternoon"), &plot()).unwrap();
        assert_ne!(a, b);
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn unwritable_directory_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let mut sink = JsonArtifactSink::new(blocker.join("sub"));
        let err = sink.emit(Some("Morning"), &plot()).unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
    }
}
