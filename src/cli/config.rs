//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./labbox.toml or ./.labbox/config.toml
//! 2. User config: ~/.labbox/config.toml
//! 3. System config: /etc/labbox/config.toml
//! 4. Built-in defaults
//!
//! Command line arguments override whatever the settings file provides; the
//! result is folded into one immutable [`RunConfig`].

use super::args::RunArgs;
use crate::engine::{EngineBackend, NetworkIsolation};
use crate::env;
use crate::report::ReportFormat;
use crate::sandbox::{LaunchConfig, SupervisorConfig};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML for [`Settings`]
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or malformed
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine section of the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub backend: EngineBackend,
    pub executable: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backend: EngineBackend::default(),
            executable: PathBuf::from(env::DEFAULT_ENGINE_EXECUTABLE),
        }
    }
}

/// Settings file contents. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub image: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub runner_command: String,
    pub archive_suffix: String,
    pub container_path: String,
    pub network: String,
    pub format: ReportFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            image: env::DEFAULT_IMAGE.to_string(),
            endpoint: env::DEFAULT_ENDPOINT.to_string(),
            timeout_secs: env::DEFAULT_TIMEOUT_SECS,
            poll_interval_secs: env::POLL_INTERVAL.as_secs(),
            runner_command: env::DEFAULT_RUNNER_COMMAND.to_string(),
            archive_suffix: env::DEFAULT_ARCHIVE_SUFFIX.to_string(),
            container_path: env::DEFAULT_CONTAINER_PATH.to_string(),
            network: crate::engine::DEFAULT_NETWORK_NAME.to_string(),
            format: ReportFormat::default(),
        }
    }
}

impl Settings {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Fully resolved, immutable configuration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub engine: EngineSettings,
    pub launch: LaunchConfig,
    pub supervisor: SupervisorConfig,
    pub format: ReportFormat,
    pub submissions: Vec<PathBuf>,
}

impl RunConfig {
    /// Merge command line arguments over settings and validate the result.
    pub fn resolve(settings: Settings, args: &RunArgs) -> Result<Self, ConfigError> {
        let endpoint_text = args.endpoint.as_deref().unwrap_or(&settings.endpoint);
        let endpoint = Url::parse(endpoint_text).map_err(|e| {
            ConfigError::Invalid(format!("endpoint {:?} is not a valid URI: {}", endpoint_text, e))
        })?;

        let timeout_secs = args.timeout.unwrap_or(settings.timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout must be at least 1 second".to_string()));
        }
        if settings.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("client id", &args.client_id),
            ("assignment id", &args.assignment_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        let mut launch = LaunchConfig::new(
            args.image.clone().unwrap_or(settings.image),
            endpoint,
            args.client_id.clone(),
            args.assignment_id.clone(),
        )
        .with_runner_command(settings.runner_command)
        .with_archive_suffix(settings.archive_suffix)
        .with_container_path(settings.container_path)
        .with_isolation(NetworkIsolation::named(settings.network));

        if args.no_isolation {
            launch = launch.without_isolation();
        }

        let supervisor = SupervisorConfig::new(Duration::from_secs(timeout_secs))
            .with_poll_interval(Duration::from_secs(settings.poll_interval_secs));

        let mut engine = settings.engine;
        if let Some(backend) = args.backend {
            engine.backend = backend;
        }
        if let Some(ref executable) = args.engine {
            engine.executable = executable.clone();
        }

        Ok(Self {
            engine,
            launch,
            supervisor,
            format: args.format.unwrap_or(settings.format),
            submissions: args.submissions.clone(),
        })
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load `explicit` if given, otherwise the first file in the hierarchy.
    pub fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {:?}", path);
            return Settings::from_toml_file(path);
        }
        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<Settings, ConfigError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return Settings::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(Settings::default())
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "EXISTS"
                } else {
                    "NOT A FILE"
                }
            } else {
                "NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}
