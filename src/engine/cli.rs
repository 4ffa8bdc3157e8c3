//! Engine backend driving a Podman-compatible executable.
//!
//! Each operation runs one engine subcommand through `tokio::process::Command`
//! and waits for it to exit. A non-zero exit is an error; output is parsed only
//! after the command succeeded.

use super::{
    ContainerEngine, ContainerId, ContainerStatus, CreateRequest, EngineError, NetworkIsolation,
    Result,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Container engine reached through its command line.
#[derive(Debug, Clone)]
pub struct CliEngine {
    executable: PathBuf,
}

impl CliEngine {
    /// Resolve `executable` on `PATH` (or as given, if it is a path).
    ///
    /// # Errors
    ///
    /// Returns error if the executable cannot be found.
    pub fn new<S: AsRef<std::ffi::OsStr>>(executable: S) -> Result<Self> {
        let requested = executable.as_ref().to_string_lossy().into_owned();
        let executable = which::which(executable.as_ref()).map_err(|e| EngineError::Spawn {
            executable: requested,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })?;

        debug!("Using engine executable {}", executable.display());
        Ok(Self { executable })
    }

    /// Use `executable` exactly as given, without looking it up.
    pub fn with_path(executable: PathBuf) -> Self {
        Self { executable }
    }

    /// Path of the engine executable.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn describe(&self, args: &[String]) -> String {
        let mut command = self.executable.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }

    /// Run one engine command to completion, failing on a non-zero exit.
    async fn run(&self, args: Vec<String>) -> Result<Output> {
        debug!("Running engine command: {}", self.describe(&args));

        let output = Command::new(&self.executable)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                executable: self.executable.display().to_string(),
                source,
            })?;

        check_status(self.describe(&args), output)
    }

    /// Command line that streams both log channels into one pipe.
    fn merged_logs_script(&self, id: &ContainerId) -> String {
        let executable = self.executable.to_string_lossy();
        format!(
            "exec {} logs {} 2>&1",
            shell_escape::escape(executable),
            shell_escape::escape(Cow::Borrowed(id.as_str()))
        )
    }
}

fn check_status(command: String, output: Output) -> Result<Output> {
    if output.status.success() {
        return Ok(output);
    }

    Err(EngineError::CommandFailed {
        command,
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Arguments for `create`.
pub fn create_args(request: &CreateRequest) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    if let Some(ref name) = request.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }

    for (key, value) in &request.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }

    if let Some(ref isolation) = request.isolation {
        args.push("--network".to_string());
        args.push(isolation.network.clone());
        if isolation.disable_dns {
            args.push("--dns".to_string());
            args.push("none".to_string());
        }
        if isolation.disable_dns_search {
            args.push("--dns-search".to_string());
            args.push(".".to_string());
        }
    }

    args.push(request.image.clone());
    args.extend(request.cmd.iter().cloned());
    args
}

/// Arguments for `network create`.
pub fn network_create_args(isolation: &NetworkIsolation) -> Vec<String> {
    let mut args = vec!["network".to_string(), "create".to_string()];
    if isolation.internal {
        args.push("--internal".to_string());
    }
    if isolation.disable_dns {
        args.push("--disable-dns".to_string());
    }
    args.push(isolation.network.clone());
    args
}

/// Arguments for `stop`; `None` leaves the grace period to the engine.
pub fn stop_args(id: &ContainerId, grace: Option<Duration>) -> Vec<String> {
    let mut args = vec!["stop".to_string()];
    if let Some(grace) = grace {
        args.push("-t".to_string());
        args.push(grace.as_secs().to_string());
    }
    args.push(id.to_string());
    args
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
}

/// Extract `State.Status` from `container inspect` JSON.
pub fn parse_inspect_output(id: &ContainerId, stdout: &[u8]) -> Result<ContainerStatus> {
    let entries: Vec<InspectEntry> = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::MalformedOutput(format!("container inspect: {}", e)))?;

    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

    ContainerStatus::parse_for(id.as_str(), &entry.state.status)
}

/// Fields of `network inspect` that decide whether a network isolates.
///
/// Podman prints lowercase keys and reports `dns_enabled`; Docker prints
/// `Internal` and has no DNS switch.
#[derive(Debug, Deserialize)]
struct NetworkEntry {
    #[serde(alias = "Internal", default)]
    internal: bool,
    #[serde(default)]
    dns_enabled: Option<bool>,
}

/// Check `network inspect` JSON of an existing network against `isolation`.
pub fn check_network_inspect_output(isolation: &NetworkIsolation, stdout: &[u8]) -> Result<()> {
    let entries: Vec<NetworkEntry> = serde_json::from_slice(stdout)
        .map_err(|e| EngineError::MalformedOutput(format!("network inspect: {}", e)))?;

    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::NotFound(isolation.network.clone()))?;

    isolation.verify_existing(entry.internal, entry.dns_enabled)
}

/// Extract the container ID printed by `create`.
pub fn parse_created_id(stdout: &[u8]) -> Result<ContainerId> {
    String::from_utf8_lossy(stdout)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ContainerId::new)
        .ok_or_else(|| EngineError::MalformedOutput("create printed no container ID".to_string()))
}

/// Extract the exit code printed by `wait`.
pub fn parse_exit_code(stdout: &[u8]) -> Result<i64> {
    let text = String::from_utf8_lossy(stdout);
    let line = text.lines().map(str::trim).find(|line| !line.is_empty());

    line.and_then(|line| line.parse::<i64>().ok())
        .ok_or_else(|| EngineError::MalformedOutput(format!("wait printed {:?}", text.trim())))
}

#[async_trait]
impl ContainerEngine for CliEngine {
    async fn create(&self, request: &CreateRequest) -> Result<ContainerId> {
        let output = self.run(create_args(request)).await?;
        let id = parse_created_id(&output.stdout)?;
        info!("Created container {}", id.short());
        Ok(id)
    }

    async fn copy_in(
        &self,
        id: &ContainerId,
        host_path: &Path,
        container_path: &str,
    ) -> Result<()> {
        let target = format!("{}:{}", id, container_path);
        self.run(vec![
            "cp".to_string(),
            host_path.display().to_string(),
            target,
        ])
        .await?;
        debug!("Copied {} into {}", host_path.display(), id.short());
        Ok(())
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.run(vec!["start".to_string(), id.to_string()]).await?;
        info!("Started container {}", id.short());
        Ok(())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let output = self
            .run(vec![
                "container".to_string(),
                "inspect".to_string(),
                id.to_string(),
            ])
            .await?;
        parse_inspect_output(id, &output.stdout)
    }

    async fn stop(&self, id: &ContainerId, grace: Option<Duration>) -> Result<()> {
        self.run(stop_args(id, grace)).await?;
        info!("Stopped container {}", id.short());
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        let output = self.run(vec!["wait".to_string(), id.to_string()]).await?;
        parse_exit_code(&output.stdout)
    }

    async fn logs(&self, id: &ContainerId) -> Result<Vec<u8>> {
        let script = self.merged_logs_script(id);
        debug!("Fetching logs: sh -c {}", script);

        let output = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                executable: "sh".to_string(),
                source,
            })?;

        let output = check_status(script, output)?;
        Ok(output.stdout)
    }

    async fn ensure_network(&self, isolation: &NetworkIsolation) -> Result<()> {
        let inspect = self
            .run(vec![
                "network".to_string(),
                "inspect".to_string(),
                isolation.network.clone(),
            ])
            .await;

        match inspect {
            Ok(output) => {
                check_network_inspect_output(isolation, &output.stdout)?;
                debug!("Network {} already exists and is isolated", isolation.network);
                Ok(())
            }
            Err(EngineError::CommandFailed { .. }) => {
                self.run(network_create_args(isolation)).await?;
                info!("Created isolation network {}", isolation.network);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}
