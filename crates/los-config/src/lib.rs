//! Traffic LOS analysis configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for the YAML run configuration
//! - Config file resolution (CLI → env → working directory → XDG)
//! - Semantic validation with stable error codes
//! - Content hashing so a run summary can name the exact config it used

pub mod load;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use load::{load_config, load_settings, ConfigError, LoadedConfig};
pub use resolve::{resolve_config_path, ConfigSource};
pub use settings::{
    ClusteringConfig, ComparisonConfig, DensityConfig, FeatureSets, MarkovConfig, SessionConfig,
    Settings, ZeroRowPolicy,
};
pub use validate::{validate_session, validate_settings, ValidationError, ValidationResult};
