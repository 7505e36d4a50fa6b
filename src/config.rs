//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Configuration files (TOML)
//! - Defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub refinement: RefinementConfig,

    #[serde(default)]
    pub checker: CheckerConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How observations are grouped into the first partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PartitioningStrategy {
    /// One partition per distinct next-unconsumed-message signature
    #[default]
    TopOfQueue,
    /// One partition per observation
    Singleton,
}

/// Refinement engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Run the quadratic partition consistency checks after construction and
    /// after every refinement
    #[serde(default)]
    pub strict: bool,

    /// Seed for the random placement of unclassified observations during a split
    pub seed: Option<u64>,

    #[serde(default)]
    pub partitioning: PartitioningStrategy,

    /// Number of invariants checked concurrently
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Upper bound on check-and-refine rounds
    pub max_iterations: Option<usize>,
}

/// Model checker wrapper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Wrapper executable
    pub command: Option<PathBuf>,

    /// Extra arguments passed to the wrapper
    #[serde(default)]
    pub args: Vec<String>,

    /// Model encoding handed to the wrapper
    #[serde(default)]
    pub format: ModelFormat,

    /// Per-invocation timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Capacity of every channel in Promela output
    #[serde(default = "default_channel_bound")]
    pub channel_bound: usize,
}

/// Model encodings understood by the supported checkers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    #[default]
    Scm,
    Promela,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Directory for exported models; stdout when unset
    pub directory: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

// Default value functions

fn default_parallelism() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_channel_bound() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            strict: false,
            seed: None,
            partitioning: PartitioningStrategy::default(),
            parallelism: default_parallelism(),
            max_iterations: None,
        }
    }
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            format: ModelFormat::default(),
            timeout_secs: default_timeout_secs(),
            channel_bound: default_channel_bound(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl CheckerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./config.toml
    /// 2. ~/.cfsm-infer/config.toml
    /// 3. /etc/cfsm-infer/config.toml
    pub fn load() -> Result<Self> {
        let paths = vec![
            PathBuf::from("config.toml"),
            dirs::home_dir()
                .map(|h| h.join(".cfsm-infer").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/dev/null")),
            PathBuf::from("/etc/cfsm-infer/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    pub fn validate(&self) -> Result<()> {
        if self.refinement.parallelism == 0 {
            return Err(Error::Config("refinement.parallelism must be at least 1".into()));
        }
        if self.checker.channel_bound == 0 {
            return Err(Error::Config("checker.channel_bound must be at least 1".into()));
        }
        Ok(())
    }

    /// Get the checker wrapper from config or environment
    pub fn checker_command(&self) -> Result<PathBuf> {
        if let Some(command) = &self.checker.command {
            return Ok(command.clone());
        }

        std::env::var("CFSM_INFER_CHECKER")
            .map(PathBuf::from)
            .map_err(|_| Error::MissingConfig(
                "Model checker wrapper not found. Set CFSM_INFER_CHECKER, pass --checker, or configure checker.command".to_string()
            ))
    }

    /// Get output directory, if exports should go to files
    pub fn output_directory(&self) -> Option<PathBuf> {
        self.output.directory.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.refinement.strict);
        assert_eq!(config.refinement.parallelism, 1);
        assert_eq!(config.refinement.partitioning, PartitioningStrategy::TopOfQueue);
        assert_eq!(config.checker.format, ModelFormat::Scm);
        assert_eq!(config.checker.timeout(), Duration::from_secs(60));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[refinement]
strict = true
seed = 7
partitioning = "singleton"
parallelism = 4

[checker]
command = "/usr/local/bin/mc-wrapper"
format = "promela"
timeout_secs = 10

[logging]
level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.refinement.strict);
        assert_eq!(config.refinement.seed, Some(7));
        assert_eq!(config.refinement.partitioning, PartitioningStrategy::Singleton);
        assert_eq!(config.refinement.parallelism, 4);
        assert_eq!(config.checker.format, ModelFormat::Promela);
        assert_eq!(
            config.checker_command().unwrap(),
            PathBuf::from("/usr/local/bin/mc-wrapper")
        );
        assert_eq!(config.checker.channel_bound, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_parallelism_is_rejected() {
        let mut config = Config::default();
        config.refinement.parallelism = 0;
        assert!(config.validate().is_err());
    }
}
