//! Submission lifecycle orchestration.
//!
//! Launches one container per submission, polls the running set until it is
//! empty, stops anything that outlived its timeout and collects an exit code and
//! log for every instance exactly once.
//!
//! ## Flow
//!
//! ```text
//! artifacts ──▶ Launcher ──▶ running set
//!                              │
//!                  ┌───────────┘
//!                  ▼
//!               Poller ──▶ still running ──(sleep)──┐
//!                  │  │                             │
//!                  │  └──▶ timed out ──▶ Enforcer   │
//!                  ▼                       │        │
//!              finished                    ▼        │
//!                  └──────────────▶ Collector ◀─────┘ (once empty)
//!                                          │
//!                                          ▼
//!                                  FinishedInstance
//! ```
//!
//! Everything runs on one control task. Containers started by a run that is
//! killed before collection are left behind on the engine.

mod collector;
mod config;
mod enforcer;
mod launcher;
mod poller;
mod supervisor;

pub use collector::Collector;
pub use config::{LaunchConfig, SupervisorConfig};
pub use enforcer::Enforcer;
pub use launcher::{Launcher, Rejection, validate_artifact};
pub use poller::{Classification, Partition, Poller, classify};
pub use supervisor::Supervisor;

use crate::engine::{ContainerId, EngineError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::time::Instant;

/// One tracked container execution of a single submission.
#[derive(Debug)]
pub struct Instance {
    source_path: PathBuf,
    container_id: ContainerId,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

impl Instance {
    /// Track a container that has just been started.
    pub fn new(source_path: PathBuf, container_id: ContainerId, start_time: Instant) -> Self {
        Self {
            source_path,
            container_id,
            start_time,
            started_at: Utc::now(),
        }
    }

    /// Submission artifact this instance runs.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn container_id(&self) -> &ContainerId {
        &self.container_id
    }

    /// Monotonic start time; the basis for timeout decisions.
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Wall-clock start time, for reporting only.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// How an instance left the running set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExitReason {
    Exited,
    TimedOut,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Exited => write!(f, "Exited"),
            ExitReason::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Terminal record of an instance.
#[derive(Debug)]
pub struct FinishedInstance {
    pub instance: Instance,
    pub exit_reason: ExitReason,
    pub return_code: i64,
    /// Combined stdout and stderr exactly as the engine delivered it
    pub log: Vec<u8>,
}

impl FinishedInstance {
    /// Log decoded for display; invalid UTF-8 is replaced, never dropped.
    pub fn log_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.log)
    }
}

/// Orchestration errors. All of them abort the run.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// An engine call failed while launching a submission
    #[error("Failed to launch {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// An engine call failed while supervising or collecting
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for orchestration.
pub type Result<T> = std::result::Result<T, SandboxError>;
