//! # Labbox
//!
//! Runs untrusted labwork submissions in isolated containers, one container per
//! submission, and reports how each of them ended.
//!
//! ## Architecture Overview
//!
//! - **[`engine`]**: Container engine adapter (executable or API socket)
//! - **[`sandbox`]**: Launch, poll, timeout enforcement and result collection
//! - **[`report`]**: Text and JSON rendering of the collected results
//! - **[`cli`]**: Argument parsing and configuration discovery
//!
//! A run is strictly sequential: a single control task launches every accepted
//! submission, polls until nothing is running, stops whatever outlived the
//! timeout and then collects exit codes and logs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use labbox::engine::{self, EngineBackend};
//! use labbox::sandbox::{LaunchConfig, Supervisor, SupervisorConfig};
//! use std::path::{Path, PathBuf};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = engine::connect(EngineBackend::Cli, Path::new("podman")).await?;
//!     let launch = LaunchConfig::new(
//!         "localhost/labwork-runner:latest",
//!         "http://127.0.0.1:8000/".parse()?,
//!         "client-1",
//!         "lab-1",
//!     );
//!
//!     let supervisor = Supervisor::new(engine, launch, SupervisorConfig::new(Duration::from_secs(60)))?;
//!     for finished in supervisor.run(&[PathBuf::from("submission.zip")]).await? {
//!         println!("{}: {}", finished.exit_reason, finished.return_code);
//!     }
//!     Ok(())
//! }
//! ```

/// Container engine adapter.
pub mod engine;

/// Submission lifecycle orchestration.
pub mod sandbox;

/// Result rendering.
pub mod report;

/// Defaults and well-known paths.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use engine::{ContainerEngine, ContainerId, ContainerStatus, EngineBackend, EngineError};
pub use report::{Presenter, ReportFormat};
pub use sandbox::{
    ExitReason, FinishedInstance, Instance, LaunchConfig, SandboxError, Supervisor,
    SupervisorConfig,
};
