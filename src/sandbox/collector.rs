//! Resolves exit codes and logs for instances that left the running set.

use super::{ExitReason, FinishedInstance, Instance, Result};
use crate::engine::ContainerEngine;
use tracing::{debug, info};

/// Builds the terminal record of an instance.
pub struct Collector<'a> {
    engine: &'a dyn ContainerEngine,
}

impl<'a> Collector<'a> {
    pub fn new(engine: &'a dyn ContainerEngine) -> Self {
        Self { engine }
    }

    /// Wait for the exit code, then fetch the full log.
    ///
    /// `reason` is taken as given; by now every container is stopped, so the
    /// engine can no longer tell a timeout from a natural exit.
    pub async fn collect(&self, instance: Instance, reason: ExitReason) -> Result<FinishedInstance> {
        let id = instance.container_id();

        let return_code = self.engine.wait(id).await?;
        let log = self.engine.logs(id).await?;
        debug!("Collected {} log bytes from {}", log.len(), id.short());

        info!(
            "{} {} with code {}",
            instance.source_path().display(),
            match reason {
                ExitReason::Exited => "exited",
                ExitReason::TimedOut => "timed out",
            },
            return_code
        );

        Ok(FinishedInstance {
            instance,
            exit_reason: reason,
            return_code,
            log,
        })
    }

    /// Collect timed-out instances first, then naturally finished ones.
    pub async fn collect_all(
        &self,
        timed_out: Vec<Instance>,
        finished: Vec<Instance>,
    ) -> Result<Vec<FinishedInstance>> {
        let mut results = Vec::with_capacity(timed_out.len() + finished.len());

        for instance in timed_out {
            results.push(self.collect(instance, ExitReason::TimedOut).await?);
        }
        for instance in finished {
            results.push(self.collect(instance, ExitReason::Exited).await?);
        }

        Ok(results)
    }
}
