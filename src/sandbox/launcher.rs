//! Turns submission artifacts into running containers.

use super::{Instance, LaunchConfig, Result, SandboxError};
use crate::engine::{ContainerEngine, CreateRequest};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Why a submission artifact was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Missing, a directory, or otherwise not a regular file
    NotAFile,
    /// File name lacks the expected archive suffix
    WrongSuffix { expected: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAFile => write!(f, "not a regular file"),
            Rejection::WrongSuffix { expected } => {
                write!(f, "file name does not end with {}", expected)
            }
        }
    }
}

/// Check that `path` is a regular file whose name ends with `suffix`.
///
/// The suffix comparison ignores ASCII case.
pub fn validate_artifact(path: &Path, suffix: &str) -> std::result::Result<(), Rejection> {
    if !path.is_file() {
        return Err(Rejection::NotAFile);
    }

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if !name.ends_with(&suffix.to_ascii_lowercase()) {
        return Err(Rejection::WrongSuffix {
            expected: suffix.to_string(),
        });
    }

    Ok(())
}

/// Creates, provisions and starts one container per submission.
pub struct Launcher<'a> {
    engine: &'a dyn ContainerEngine,
    config: &'a LaunchConfig,
}

impl<'a> Launcher<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, config: &'a LaunchConfig) -> Self {
        Self { engine, config }
    }

    /// Whether `path` may be launched. Rejections are logged, not raised.
    pub fn accepts(&self, path: &Path) -> bool {
        match validate_artifact(path, &self.config.archive_suffix) {
            Ok(()) => true,
            Err(rejection) => {
                warn!("Skipping {}: {}", path.display(), rejection);
                false
            }
        }
    }

    /// Creation request for a submission.
    pub fn request_for(&self, path: &Path) -> Result<CreateRequest> {
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        CreateRequest::builder()
            .image(&self.config.image)
            .cmd(self.config.runner_invocation())
            .name(format!("labbox-{}", uuid::Uuid::new_v4()))
            .label("labbox.managed", "true")
            .label("labbox.client", &self.config.client_id)
            .label("labbox.assignment", &self.config.assignment_id)
            .label("labbox.source", source)
            .isolation(self.config.isolation.clone())
            .build()
            .map_err(|e| SandboxError::Config(e.to_string()))
    }

    /// Create the container, copy the submission in and start it.
    ///
    /// The artifact must already have been accepted. Any engine failure is fatal.
    pub async fn start(&self, path: &Path) -> Result<Instance> {
        let request = self.request_for(path)?;
        let launch_error = |source| SandboxError::Launch {
            path: path.to_path_buf(),
            source,
        };

        debug!(
            "Creating container for {} (isolated: {})",
            path.display(),
            request.is_isolated()
        );
        let id = self.engine.create(&request).await.map_err(launch_error)?;

        self.engine
            .copy_in(&id, path, &self.config.container_path)
            .await
            .map_err(launch_error)?;

        self.engine.start(&id).await.map_err(launch_error)?;
        let start_time = Instant::now();

        info!("Launched {} in container {}", path.display(), id.short());
        Ok(Instance::new(path.to_path_buf(), id, start_time))
    }

    /// Validate and start a submission; `None` when it was rejected.
    pub async fn launch(&self, path: &Path) -> Result<Option<Instance>> {
        if !self.accepts(path) {
            return Ok(None);
        }
        self.start(path).await.map(Some)
    }

    /// Accepted artifacts, in the order given.
    pub fn accepted(&self, paths: &[PathBuf]) -> Vec<PathBuf> {
        paths
            .iter()
            .filter(|path| self.accepts(path))
            .cloned()
            .collect()
    }
}
