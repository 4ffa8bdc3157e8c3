//! Immutable run configuration handed to each orchestration component.

use crate::engine::NetworkIsolation;
use crate::env;
use std::time::Duration;
use url::Url;

/// Everything the launcher needs to turn a submission into a container.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Image reference
    pub image: String,
    /// Program started inside the container
    pub runner_command: String,
    /// Remote test server passed to the runner
    pub endpoint: Url,
    /// Client identifier passed to the runner
    pub client_id: String,
    /// Assignment identifier passed to the runner
    pub assignment_id: String,
    /// Network sandbox; `None` only when isolation was explicitly disabled
    pub isolation: Option<NetworkIsolation>,
    /// Suffix a submission file name must carry
    pub archive_suffix: String,
    /// Where the submission lands inside the container
    pub container_path: String,
}

impl LaunchConfig {
    /// Configuration with isolation on and default runner settings.
    pub fn new(
        image: impl Into<String>,
        endpoint: Url,
        client_id: impl Into<String>,
        assignment_id: impl Into<String>,
    ) -> Self {
        Self {
            image: image.into(),
            runner_command: env::DEFAULT_RUNNER_COMMAND.to_string(),
            endpoint,
            client_id: client_id.into(),
            assignment_id: assignment_id.into(),
            isolation: Some(NetworkIsolation::default()),
            archive_suffix: env::DEFAULT_ARCHIVE_SUFFIX.to_string(),
            container_path: env::DEFAULT_CONTAINER_PATH.to_string(),
        }
    }

    /// Turn network isolation off.
    pub fn without_isolation(mut self) -> Self {
        self.isolation = None;
        self
    }

    /// Use a specific isolation network.
    pub fn with_isolation(mut self, isolation: NetworkIsolation) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn with_runner_command(mut self, command: impl Into<String>) -> Self {
        self.runner_command = command.into();
        self
    }

    pub fn with_archive_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.archive_suffix = suffix.into();
        self
    }

    pub fn with_container_path(mut self, path: impl Into<String>) -> Self {
        self.container_path = path.into();
        self
    }

    /// Runner command followed by its three positional arguments.
    pub fn runner_invocation(&self) -> Vec<String> {
        vec![
            self.runner_command.clone(),
            self.endpoint.to_string(),
            self.client_id.clone(),
            self.assignment_id.clone(),
        ]
    }
}

/// Timing of the supervision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Elapsed time after which a running instance is stopped
    pub timeout: Duration,
    /// Delay between two polling passes
    pub poll_interval: Duration,
}

impl SupervisorConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: env::POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(env::DEFAULT_TIMEOUT_SECS))
    }
}
