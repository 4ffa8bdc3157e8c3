//! Scripted in-memory engine shared by the integration tests.
//!
//! Each submission file name maps to a [`Behavior`]; a container runs for the
//! scripted duration on the tokio clock, so tests drive it with a paused runtime.

#![allow(dead_code)]

use async_trait::async_trait;
use labbox::engine::{
    ContainerEngine, ContainerId, ContainerStatus, CreateRequest, EngineError, NetworkIsolation,
    Result,
};
use labbox::sandbox::{LaunchConfig, SupervisorConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

/// Exit code the fake reports for a container that was stopped early.
pub const STOPPED_EXIT_CODE: i64 = 143;

/// How a scripted container behaves once started.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub runtime: Duration,
    pub exit_code: i64,
    pub log: Vec<u8>,
    pub status: Option<&'static str>,
}

impl Behavior {
    pub fn exits(code: i64, after: Duration) -> Self {
        Self {
            runtime: after,
            exit_code: code,
            ..Default::default()
        }
    }

    pub fn with_log(mut self, log: &[u8]) -> Self {
        self.log = log.to_vec();
        self
    }

    /// Report a raw status string instead of the simulated one.
    pub fn reporting(mut self, status: &'static str) -> Self {
        self.status = Some(status);
        self
    }
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: &'static str,
    pub id: Option<String>,
}

#[derive(Debug)]
pub struct FakeContainer {
    pub request: CreateRequest,
    pub source: Option<String>,
    pub behavior: Behavior,
    pub started: Option<Instant>,
    pub stopped: Option<Instant>,
}

impl FakeContainer {
    fn running(&self, now: Instant) -> bool {
        match self.started {
            Some(started) => {
                self.stopped.is_none() && now.duration_since(started) < self.behavior.runtime
            }
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: usize,
    containers: HashMap<String, FakeContainer>,
    calls: Vec<Call>,
    networks: Vec<NetworkIsolation>,
}

/// In-memory [`ContainerEngine`] driven by a script.
#[derive(Debug, Default)]
pub struct FakeEngine {
    script: HashMap<String, Behavior>,
    fail_on: Option<&'static str>,
    state: Mutex<State>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, file_name: &str, behavior: Behavior) -> Self {
        self.script.insert(file_name.to_string(), behavior);
        self
    }

    /// Make every call of `op` fail.
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Operations recorded for one container, in call order.
    pub fn ops_for(&self, id: &str) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|call| call.id.as_deref() == Some(id))
            .map(|call| call.op)
            .collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|call| call.op == op).count()
    }

    pub fn networks(&self) -> Vec<NetworkIsolation> {
        self.state.lock().unwrap().networks.clone()
    }

    /// Run a closure against a container's recorded state.
    pub fn with_container<T>(&self, id: &str, f: impl FnOnce(&FakeContainer) -> T) -> T {
        let state = self.state.lock().unwrap();
        f(state.containers.get(id).expect("unknown container"))
    }

    fn record(&self, op: &'static str, id: Option<&ContainerId>) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call {
            op,
            id: id.map(|id| id.as_str().to_string()),
        });
        if self.fail_on == Some(op) {
            return Err(EngineError::CommandFailed {
                command: format!("fake {}", op),
                status: "exit status: 125".to_string(),
                stderr: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    fn update<T>(
        &self,
        id: &ContainerId,
        f: impl FnOnce(&mut FakeContainer) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        let container = state
            .containers
            .get_mut(id.as_str())
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        f(container)
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn create(&self, request: &CreateRequest) -> Result<ContainerId> {
        self.record("create", None)?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("fake{:04}", state.next_id);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                request: request.clone(),
                source: None,
                behavior: Behavior::default(),
                started: None,
                stopped: None,
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn copy_in(&self, id: &ContainerId, host_path: &Path, _container_path: &str) -> Result<()> {
        self.record("copy_in", Some(id))?;
        let name = host_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let behavior = self.script.get(&name).cloned().unwrap_or_default();
        self.update(id, |container| {
            container.source = Some(name);
            container.behavior = behavior;
            Ok(())
        })
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.record("start", Some(id))?;
        self.update(id, |container| {
            container.started = Some(Instant::now());
            Ok(())
        })
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus> {
        self.record("inspect", Some(id))?;
        let now = Instant::now();
        self.update(id, |container| {
            if let Some(raw) = container.behavior.status {
                return ContainerStatus::parse_for(id.as_str(), raw);
            }
            Ok(if container.running(now) {
                ContainerStatus::Running
            } else {
                ContainerStatus::Exited
            })
        })
    }

    async fn stop(&self, id: &ContainerId, _grace: Option<Duration>) -> Result<()> {
        self.record("stop", Some(id))?;
        let now = Instant::now();
        self.update(id, |container| {
            if container.running(now) {
                container.stopped = Some(now);
            }
            Ok(())
        })
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        self.record("wait", Some(id))?;
        let now = Instant::now();
        self.update(id, |container| {
            if container.running(now) {
                return Err(EngineError::MalformedOutput(format!(
                    "wait on running container {}",
                    id
                )));
            }
            Ok(if container.stopped.is_some() {
                STOPPED_EXIT_CODE
            } else {
                container.behavior.exit_code
            })
        })
    }

    async fn logs(&self, id: &ContainerId) -> Result<Vec<u8>> {
        self.record("logs", Some(id))?;
        self.update(id, |container| Ok(container.behavior.log.clone()))
    }

    async fn ensure_network(&self, isolation: &NetworkIsolation) -> Result<()> {
        self.record("ensure_network", None)?;
        self.state.lock().unwrap().networks.push(isolation.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Temporary directory holding submission files.
pub struct Submissions {
    pub dir: TempDir,
}

impl Submissions {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write a file and return its path.
    pub fn file(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"PK\x03\x04").unwrap();
        path
    }

    /// Create a directory and return its path.
    pub fn folder(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir(&path).unwrap();
        path
    }
}

pub fn launch_config() -> LaunchConfig {
    LaunchConfig::new(
        "localhost/labwork-runner:test",
        "http://grader.test:8000/".parse().unwrap(),
        "client-1",
        "lab-1",
    )
}

pub fn supervisor_config(timeout_secs: u64) -> SupervisorConfig {
    SupervisorConfig::new(Duration::from_secs(timeout_secs))
}
