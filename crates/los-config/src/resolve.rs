//! Configuration file discovery.
//!
//! Resolution order: CLI argument → `LOS_CONFIG` → `./config.yaml` → XDG config.

use std::path::{Path, PathBuf};

/// Where the configuration file was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via `--config`.
    CliArgument,

    /// Set via the `LOS_CONFIG` environment variable.
    Environment,

    /// `config.yaml` in the current working directory.
    WorkingDirectory,

    /// Found in the XDG config directory.
    XdgConfig,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::WorkingDirectory => write!(f, "working directory"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
        }
    }
}

/// Environment variable naming an explicit config file.
pub const ENV_CONFIG_PATH: &str = "LOS_CONFIG";

/// Standard config file name.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Application name for XDG directories.
const APP_NAME: &str = "los-analysis";

/// Resolve the configuration file path.
///
/// Explicit locations (CLI, environment) are returned even if the file does
/// not exist, so that loading reports it as missing. Discovered locations
/// (working directory, XDG) are only returned when present.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<(PathBuf, ConfigSource)> {
    let env_path = std::env::var(ENV_CONFIG_PATH).ok();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(cli_path, env_path.as_deref(), &cwd, xdg_config_dir().as_deref())
}

/// Resolution with every input supplied by the caller.
pub fn resolve_from(
    cli_path: Option<&Path>,
    env_path: Option<&str>,
    cwd: &Path,
    xdg_dir: Option<&Path>,
) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = cli_path {
        return Some((path.to_path_buf(), ConfigSource::CliArgument));
    }

    if let Some(path) = env_path.filter(|p| !p.is_empty()) {
        return Some((PathBuf::from(path), ConfigSource::Environment));
    }

    let local = cwd.join(CONFIG_FILENAME);
    if local.is_file() {
        return Some((local, ConfigSource::WorkingDirectory));
    }

    if let Some(dir) = xdg_dir {
        let path = dir.join(CONFIG_FILENAME);
        if path.is_file() {
            return Some((path, ConfigSource::XdgConfig));
        }
    }

    None
}

/// XDG config directory for los-analysis.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(
            format!("{}", ConfigSource::WorkingDirectory),
            "working directory"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
    }

    #[test]
    fn test_cli_wins_even_if_missing() {
        let tmp = TempDir::new().unwrap();
        let cli = tmp.path().join("nope.yaml");
        let (path, source) =
            resolve_from(Some(&cli), Some("/elsewhere.yaml"), tmp.path(), None).unwrap();
        assert_eq!(path, cli);
        assert_eq!(source, ConfigSource::CliArgument);
    }

    #[test]
    fn test_env_beats_discovered_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "x: 1").unwrap();
        let (path, source) = resolve_from(None, Some("/etc/los.yaml"), tmp.path(), None).unwrap();
        assert_eq!(path, PathBuf::from("/etc/los.yaml"));
        assert_eq!(source, ConfigSource::Environment);
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let tmp = TempDir::new().unwrap();
        assert!(resolve_from(None, Some(""), tmp.path(), None).is_none());
    }

    #[test]
    fn test_working_directory_then_xdg() {
        let cwd = TempDir::new().unwrap();
        let xdg = TempDir::new().unwrap();
        fs::write(xdg.path().join(CONFIG_FILENAME), "x: 1").unwrap();

        let (path, source) = resolve_from(None, None, cwd.path(), Some(xdg.path())).unwrap();
        assert_eq!(source, ConfigSource::XdgConfig);
        assert_eq!(path, xdg.path().join(CONFIG_FILENAME));

        fs::write(cwd.path().join(CONFIG_FILENAME), "x: 1").unwrap();
        let (_, source) = resolve_from(None, None, cwd.path(), Some(xdg.path())).unwrap();
        assert_eq!(source, ConfigSource::WorkingDirectory);
    }

    #[test]
    fn test_xdg_config_dir() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }
}
