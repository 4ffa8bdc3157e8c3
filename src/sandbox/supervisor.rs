//! Drives a whole run: launch, poll until nothing runs, enforce, collect.

use super::{
    Collector, Enforcer, FinishedInstance, Instance, LaunchConfig, Launcher, Poller, Result,
    SandboxError, SupervisorConfig,
};
use crate::engine::ContainerEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the engine and the immutable configuration of one run.
pub struct Supervisor {
    engine: Arc<dyn ContainerEngine>,
    launch: LaunchConfig,
    config: SupervisorConfig,
}

impl Supervisor {
    /// # Errors
    ///
    /// Returns error if the timeout or polling interval is zero.
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        launch: LaunchConfig,
        config: SupervisorConfig,
    ) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(SandboxError::Config("timeout must be positive".to_string()));
        }
        if config.poll_interval.is_zero() {
            return Err(SandboxError::Config(
                "poll interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            engine,
            launch,
            config,
        })
    }

    pub fn launch_config(&self) -> &LaunchConfig {
        &self.launch
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Launch every acceptable artifact, supervise them and collect the results.
    ///
    /// Rejected artifacts are skipped. Any engine failure aborts the run; containers
    /// launched so far are left on the engine.
    pub async fn run(&self, artifacts: &[PathBuf]) -> Result<Vec<FinishedInstance>> {
        let running = self.launch_all(artifacts).await?;
        self.supervise(running).await
    }

    /// Start a container for each accepted artifact.
    pub async fn launch_all(&self, artifacts: &[PathBuf]) -> Result<Vec<Instance>> {
        let launcher = Launcher::new(&*self.engine, &self.launch);
        let accepted = launcher.accepted(artifacts);

        if accepted.is_empty() {
            info!("No submissions to run");
            return Ok(Vec::new());
        }

        if let Some(ref isolation) = self.launch.isolation {
            self.engine.ensure_network(isolation).await?;
        }

        let mut running = Vec::with_capacity(accepted.len());
        for path in &accepted {
            running.push(launcher.start(path).await?);
        }

        Ok(running)
    }

    /// Poll until the running set is empty, then collect every instance.
    ///
    /// Timed-out instances are stopped right after the pass that detected them.
    pub async fn supervise(&self, mut running: Vec<Instance>) -> Result<Vec<FinishedInstance>> {
        let engine = &*self.engine;
        let poller = Poller::new(engine, self.config.timeout);
        let enforcer = Enforcer::new(engine);

        let mut timed_out = Vec::new();
        let mut finished = Vec::new();
        let mut pass = 0u64;

        loop {
            pass += 1;
            let partition = poller.poll(running).await?;
            debug!(
                "Pass {}: {} running, {} timed out, {} finished",
                pass,
                partition.still_running.len(),
                partition.timed_out.len(),
                partition.finished.len()
            );

            enforcer.enforce(&partition.timed_out).await?;
            timed_out.extend(partition.timed_out);
            finished.extend(partition.finished);
            running = partition.still_running;

            if running.is_empty() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        info!(
            "All instances left the running set ({} timed out, {} exited)",
            timed_out.len(),
            finished.len()
        );

        Collector::new(engine)
            .collect_all(timed_out, finished)
            .await
    }
}
