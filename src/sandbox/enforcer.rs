//! Stops instances that outlived their timeout.

use super::{Instance, Result};
use crate::engine::ContainerEngine;
use tracing::info;

/// Issues a stop for every timed-out instance.
pub struct Enforcer<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> Enforcer<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Stop each instance with the engine's default grace period.
    ///
    /// Must run before the instances are collected: a running container has no
    /// exit code to wait for.
    pub async fn enforce(&self, timed_out: &[Instance]) -> Result<()> {
        for instance in timed_out {
            info!(
                "Stopping timed-out container {} ({})",
                instance.container_id().short(),
                instance.source_path().display()
            );
            self.engine.stop(instance.container_id(), None).await?;
        }
        Ok(())
    }
}
