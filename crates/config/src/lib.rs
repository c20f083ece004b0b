#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for rapt
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (/etc/rapt/config.toml)
//! - Environment variables
//! - CLI flags (applied by the binary, highest precedence)

use clap::ValueEnum;
use rapt_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Default location of the system-wide configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rapt/config.toml";

/// Transport strategy for fetching missing package files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMethod {
    /// In-process multiplexed HTTP transfers
    #[default]
    Native,
    /// Delegate the whole batch to one aria2c invocation
    Aria2,
}

impl fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadMethod::Native => write!(f, "native"),
            DownloadMethod::Aria2 => write!(f, "aria2"),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub apt: AptConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_parallel_downloads")]
    pub parallel_downloads: usize,
    #[serde(default)]
    pub assume_yes: bool,
    #[serde(default)]
    pub verbose: u8,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64, // seconds
    #[serde(default)]
    pub download_method: DownloadMethod,
    #[serde(default = "default_aria2_path")]
    pub aria2_path: String,
}

/// Paths of the wrapped APT tools
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AptConfig {
    #[serde(default = "default_apt_get")]
    pub get: String,
    #[serde(default = "default_apt_cache")]
    pub cache: String,
    #[serde(default = "default_apt_mark")]
    pub mark: String,
    #[serde(default = "default_apt_config")]
    pub config: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            parallel_downloads: 5,
            assume_yes: false,
            verbose: 0,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 600, // large archives on slow mirrors
            connect_timeout: 30,
            download_method: DownloadMethod::Native,
            aria2_path: default_aria2_path(),
        }
    }
}

impl Default for AptConfig {
    fn default() -> Self {
        Self {
            get: default_apt_get(),
            cache: default_apt_cache(),
            mark: default_apt_mark(),
            config: default_apt_config(),
        }
    }
}

impl Config {
    /// Load configuration from the given path, or defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let config = toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Ok(config)
    }

    /// Merge environment variables into the configuration.
    ///
    /// Recognized: `RAPT_PARALLEL`, `RAPT_DOWNLOAD_METHOD`, `RAPT_ASSUME_YES`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but holds an invalid value.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(value) = std::env::var("RAPT_PARALLEL") {
            self.general.parallel_downloads =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "RAPT_PARALLEL".to_string(),
                    value: value.clone(),
                })?;
        }

        if let Ok(value) = std::env::var("RAPT_DOWNLOAD_METHOD") {
            self.network.download_method = match value.as_str() {
                "native" => DownloadMethod::Native,
                "aria2" => DownloadMethod::Aria2,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "RAPT_DOWNLOAD_METHOD".to_string(),
                        value,
                    }
                    .into())
                }
            };
        }

        if let Ok(value) = std::env::var("RAPT_ASSUME_YES") {
            self.general.assume_yes = matches!(value.as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }
}

// Default value functions for serde

fn default_parallel_downloads() -> usize {
    5
}

fn default_timeout() -> u64 {
    600
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_aria2_path() -> String {
    "aria2c".to_string()
}

fn default_apt_get() -> String {
    "apt-get".to_string()
}

fn default_apt_cache() -> String {
    "apt-cache".to_string()
}

fn default_apt_mark() -> String {
    "apt-mark".to_string()
}

fn default_apt_config() -> String {
    "apt-config".to_string()
}
