//! Status polling over the running set.

use super::{Instance, Result};
use crate::engine::{ContainerEngine, ContainerStatus};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Outcome of classifying one instance in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    StillRunning,
    TimedOut,
    Finished,
}

/// Classify an instance from its status and how long it has been running.
///
/// A non-running status is finished regardless of elapsed time.
pub fn classify(status: ContainerStatus, elapsed: Duration, timeout: Duration) -> Classification {
    if !status.is_running() {
        Classification::Finished
    } else if elapsed >= timeout {
        Classification::TimedOut
    } else {
        Classification::StillRunning
    }
}

/// Fresh split of a running set, produced by one polling pass.
#[derive(Debug, Default)]
pub struct Partition {
    pub still_running: Vec<Instance>,
    pub timed_out: Vec<Instance>,
    pub finished: Vec<Instance>,
}

impl Partition {
    /// Number of instances across all three groups.
    pub fn len(&self) -> usize {
        self.still_running.len() + self.timed_out.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Inspects every running instance once per pass.
pub struct Poller<'a> {
    engine: &'a dyn ContainerEngine,
    timeout: Duration,
}

impl<'a> Poller<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Inspect each instance and split the set by classification.
    ///
    /// Takes ownership of the running set; every instance ends up in exactly one
    /// group of the returned partition.
    pub async fn poll(&self, running: Vec<Instance>) -> Result<Partition> {
        let mut partition = Partition::default();

        for instance in running {
            let status = self.engine.inspect(instance.container_id()).await?;
            let elapsed = Instant::now().saturating_duration_since(instance.start_time());

            match classify(status, elapsed, self.timeout) {
                Classification::StillRunning => partition.still_running.push(instance),
                Classification::TimedOut => {
                    warn!(
                        "{} timed out after {:.1}s",
                        instance.source_path().display(),
                        elapsed.as_secs_f64()
                    );
                    partition.timed_out.push(instance);
                }
                Classification::Finished => {
                    debug!(
                        "{} finished with status {}",
                        instance.container_id().short(),
                        status
                    );
                    partition.finished.push(instance);
                }
            }
        }

        Ok(partition)
    }
}
