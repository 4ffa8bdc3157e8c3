//! Container engine adapter.
//!
//! A thin interface over the container engine that actually runs submissions.
//! Every operation maps to one engine call and either succeeds or fails; nothing
//! here retries, and nothing here knows about timeouts or grading.
//!
//! ## Backends
//!
//! - [`cli`]: drives a Podman-compatible executable through `tokio::process`
//! - [`docker`]: talks to the Docker/Podman API via bollard (requires the
//!   `containers` feature)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use labbox::engine::{CliEngine, ContainerEngine, CreateRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = CliEngine::new("podman")?;
//!
//!     let request = CreateRequest::builder()
//!         .image("labwork-runner:latest")
//!         .cmd(vec!["labwork-runner", "http://127.0.0.1:8000/", "client", "lab-1"])
//!         .build()?;
//!
//!     let id = engine.create(&request).await?;
//!     engine.start(&id).await?;
//!     let code = engine.wait(&id).await?;
//!     println!("exited with {}", code);
//!     Ok(())
//! }
//! ```

pub mod cli;
#[cfg(feature = "containers")]
pub mod docker;
mod request;
mod status;

pub use cli::CliEngine;
#[cfg(feature = "containers")]
pub use docker::DockerEngine;
pub use request::{CreateRequest, CreateRequestBuilder, NetworkIsolation, DEFAULT_NETWORK_NAME};
pub use status::ContainerStatus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How the engine is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Run the engine executable
    #[default]
    Cli,
    /// Talk to the Docker/Podman API socket
    Api,
}

impl fmt::Display for EngineBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineBackend::Cli => write!(f, "cli"),
            EngineBackend::Api => write!(f, "api"),
        }
    }
}

/// Open the configured backend.
///
/// `executable` is only used by the CLI backend.
///
/// # Errors
///
/// Returns error if the executable is missing, the API is unreachable, or the
/// API backend was not compiled in.
pub async fn connect(backend: EngineBackend, executable: &Path) -> Result<Arc<dyn ContainerEngine>> {
    let engine: Arc<dyn ContainerEngine> = match backend {
        EngineBackend::Cli => Arc::new(CliEngine::new(executable)?),
        #[cfg(feature = "containers")]
        EngineBackend::Api => Arc::new(DockerEngine::connect().await?),
        #[cfg(not(feature = "containers"))]
        EngineBackend::Api => {
            return Err(EngineError::Config(
                "the api backend requires the `containers` feature".to_string(),
            ));
        }
    };

    info!("Using {} engine backend", engine.name());
    Ok(engine)
}

/// Opaque handle the engine returns for a created container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wrap an engine-provided identifier.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Full identifier as the engine reported it.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, the form engines print in listings.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContainerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Operations the supervisor needs from a container engine.
///
/// All calls block the caller until the engine answers.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Create (but do not start) a container.
    async fn create(&self, request: &CreateRequest) -> Result<ContainerId>;

    /// Copy a host file into the container filesystem at `container_path`.
    async fn copy_in(&self, id: &ContainerId, host_path: &Path, container_path: &str)
    -> Result<()>;

    /// Start a created container.
    async fn start(&self, id: &ContainerId) -> Result<()>;

    /// Read the container's current runtime status.
    ///
    /// Unrecognized status values are reported as [`EngineError::UnknownStatus`].
    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus>;

    /// Stop a container. `None` uses the engine's default grace period.
    async fn stop(&self, id: &ContainerId, grace: Option<Duration>) -> Result<()>;

    /// Block until the container has a terminal exit code and return it.
    async fn wait(&self, id: &ContainerId) -> Result<i64>;

    /// Combined stdout and stderr, as raw bytes in delivery order.
    async fn logs(&self, id: &ContainerId) -> Result<Vec<u8>>;

    /// Make sure the isolation network exists, creating it when missing.
    async fn ensure_network(&self, isolation: &NetworkIsolation) -> Result<()>;

    /// Backend name for log lines.
    fn name(&self) -> &'static str;
}

/// Container engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Docker/Podman API error
    #[cfg(feature = "containers")]
    #[error("Container API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Engine executable could not be found or launched
    #[error("Failed to run engine executable {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine command exited unsuccessfully
    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// Engine reported a status outside the known set
    #[error("Container {container} reported unknown status {status:?}")]
    UnknownStatus { container: String, status: String },

    /// Engine output could not be interpreted
    #[error("Malformed engine output: {0}")]
    MalformedOutput(String),

    /// Container not found
    #[error("Container not found: {0}")]
    NotFound(String),

    /// Request or backend configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
