//! Container runtime status as reported by inspection.

use std::fmt;

/// Closed set of runtime states Docker and Podman report.
///
/// Parsing is strict: anything else is an unknown status, never a finished one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Created,
    Configured,
    Initialized,
    Running,
    Paused,
    Restarting,
    Stopping,
    Stopped,
    Exited,
    Removing,
    Dead,
}

impl ContainerStatus {
    /// Parse an engine status string. Returns `None` for unrecognized values.
    pub fn parse(status: &str) -> Option<Self> {
        let status = match status.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "configured" => Self::Configured,
            "initialized" => Self::Initialized,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "stopping" => Self::Stopping,
            "stopped" => Self::Stopped,
            "exited" => Self::Exited,
            "removing" => Self::Removing,
            "dead" => Self::Dead,
            _ => return None,
        };
        Some(status)
    }

    /// Parse, turning unrecognized values into [`super::EngineError::UnknownStatus`].
    pub fn parse_for(container: &str, status: &str) -> super::Result<Self> {
        Self::parse(status).ok_or_else(|| super::EngineError::UnknownStatus {
            container: container.to_string(),
            status: status.to_string(),
        })
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Exited => "exited",
            Self::Removing => "removing",
            Self::Dead => "dead",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
