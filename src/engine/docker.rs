//! Engine backend speaking the Docker/Podman API.
//!
//! Provides a [`ContainerEngine`] on top of bollard with automatic connection
//! handling: Docker local defaults first, then the rootless and system Podman
//! sockets.

use super::{
    ContainerEngine, ContainerId, ContainerStatus, CreateRequest, EngineError, NetworkIsolation,
    Result,
};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, LogsOptions, StartContainerOptions,
    StopContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Container engine reached through its HTTP API.
#[derive(Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect to Docker or Podman and verify the connection.
    ///
    /// # Errors
    ///
    /// Returns error if neither Docker nor Podman are reachable.
    pub async fn connect() -> Result<Self> {
        let docker = Self::connect_any()?;
        docker.ping().await?;
        debug!("Container runtime ping successful");
        Ok(Self { docker })
    }

    /// Wrap an existing bollard client.
    pub fn with_docker(docker: Docker) -> Self {
        Self { docker }
    }

    /// Get the underlying Docker client.
    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    fn connect_any() -> Result<Docker> {
        debug!("Attempting to connect to container runtime...");

        match Docker::connect_with_local_defaults() {
            Ok(docker) => {
                info!("Connected to container runtime via local defaults");
                return Ok(docker);
            }
            Err(e) => debug!("Local defaults failed: {}", e),
        }

        #[cfg(unix)]
        {
            let mut sockets = Vec::new();
            if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
                sockets.push(format!("unix://{}/podman/podman.sock", runtime_dir));
            }
            sockets.push("unix:///run/podman/podman.sock".to_string());

            for socket in sockets {
                debug!("Trying Podman socket: {}", socket);
                match Docker::connect_with_socket(&socket, 120, bollard::API_DEFAULT_VERSION) {
                    Ok(docker) => {
                        info!("Connected to Podman via {}", socket);
                        return Ok(docker);
                    }
                    Err(e) => debug!("Podman socket {} failed: {}", socket, e),
                }
            }
        }

        Err(EngineError::Config(
            "Failed to connect to Docker or Podman. Please ensure Docker or Podman is installed and running.".to_string(),
        ))
    }

    fn not_found(id: &ContainerId, e: bollard::errors::Error) -> EngineError {
        match e {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            } => EngineError::NotFound(id.to_string()),
            e => EngineError::Api(e),
        }
    }
}

/// Resolver handed to isolated containers. Nothing listens on it inside the
/// container's network namespace, so every lookup fails.
pub const UNREACHABLE_RESOLVER: &str = "127.0.0.1";

/// Network options that switch the engine's own resolver off (Podman).
const DNS_DISABLED_OPTION: (&str, &str) = ("dns_enabled", "false");

/// Treat 304 Not Modified from `stop` as success: the container already stopped.
pub fn stopped_already(
    result: std::result::Result<(), bollard::errors::Error>,
) -> std::result::Result<(), bollard::errors::Error> {
    match result {
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        other => other,
    }
}

/// Translate a request into the API creation body.
pub fn create_body(request: &CreateRequest) -> ContainerCreateBody {
    let mut host_config = HostConfig::default();

    if let Some(ref isolation) = request.isolation {
        host_config.network_mode = Some(isolation.network.clone());
        if isolation.disable_dns {
            host_config.dns = Some(vec![UNREACHABLE_RESOLVER.to_string()]);
        }
        if isolation.disable_dns_search {
            host_config.dns_search = Some(vec![".".to_string()]);
        }
    }

    ContainerCreateBody {
        image: Some(request.image.clone()),
        cmd: if request.cmd.is_empty() {
            None
        } else {
            Some(request.cmd.clone())
        },
        labels: if request.labels.is_empty() {
            None
        } else {
            Some(
                request
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        },
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// Split an in-container file path into (directory, file name).
pub fn split_container_path(container_path: &str) -> Result<(String, String)> {
    let path = Path::new(container_path);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            EngineError::Config(format!("{} does not name a file", container_path))
        })?;
    let directory = path
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .filter(|dir| !dir.is_empty())
        .unwrap_or_else(|| "/".to_string());

    Ok((directory, file_name.to_string()))
}

/// Pack a single host file into a tar archive under `file_name`.
pub fn archive_file(host_path: &Path, file_name: &str) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_path_with_name(host_path, file_name)?;
    Ok(builder.into_inner()?)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn create(&self, request: &CreateRequest) -> Result<ContainerId> {
        let options = Some(CreateContainerOptions {
            name: request.name.clone(),
            ..Default::default()
        });

        let response = self
            .docker
            .create_container(options, create_body(request))
            .await?;

        let id = ContainerId::new(response.id);
        info!("Created container {}", id.short());
        Ok(id)
    }

    async fn copy_in(
        &self,
        id: &ContainerId,
        host_path: &Path,
        container_path: &str,
    ) -> Result<()> {
        let (directory, file_name) = split_container_path(container_path)?;
        let archive = archive_file(host_path, &file_name)?;

        self.docker
            .upload_to_container(
                id.as_str(),
                Some(UploadToContainerOptions {
                    path: directory,
                    ..Default::default()
                }),
                bollard::body_full(archive.into()),
            )
            .await
            .map_err(|e| Self::not_found(id, e))?;

        debug!("Copied {} into {}", host_path.display(), id.short());
        Ok(())
    }

    async fn start(&self, id: &ContainerId) -> Result<()> {
        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions>)
            .await
            .map_err(|e| Self::not_found(id, e))?;
        info!("Started container {}", id.short());
        Ok(())
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerStatus> {
        let inspect = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|e| Self::not_found(id, e))?;

        let status = inspect
            .state
            .and_then(|state| state.status)
            .map(|status| status.to_string())
            .unwrap_or_default();

        ContainerStatus::parse_for(id.as_str(), &status)
    }

    async fn stop(&self, id: &ContainerId, grace: Option<Duration>) -> Result<()> {
        let options = grace.map(|grace| StopContainerOptions {
            t: Some(grace.as_secs().min(i32::MAX as u64) as i32),
            ..Default::default()
        });

        stopped_already(self.docker.stop_container(id.as_str(), options).await)
            .map_err(|e| Self::not_found(id, e))?;
        info!("Stopped container {}", id.short());
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(id.as_str(), None::<WaitContainerOptions>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(Self::not_found(id, e)),
            None => Err(EngineError::MalformedOutput(format!(
                "wait stream for {} ended without a status",
                id
            ))),
        }
    }

    async fn logs(&self, id: &ContainerId) -> Result<Vec<u8>> {
        let mut stream = self.docker.logs(
            id.as_str(),
            Some(LogsOptions {
                stdout: true,
                stderr: true,
                tail: "all".to_string(),
                ..Default::default()
            }),
        );

        let mut output = Vec::new();
        while let Some(result) = stream.next().await {
            let frame = result.map_err(|e| Self::not_found(id, e))?;
            output.extend_from_slice(&frame.into_bytes());
        }

        Ok(output)
    }

    async fn ensure_network(&self, isolation: &NetworkIsolation) -> Result<()> {
        match self
            .docker
            .inspect_network(
                &isolation.network,
                None::<bollard::network::InspectNetworkOptions<String>>,
            )
            .await
        {
            Ok(network) => {
                let dns_enabled = network
                    .options
                    .as_ref()
                    .and_then(|options| options.get(DNS_DISABLED_OPTION.0))
                    .map(|value| value != DNS_DISABLED_OPTION.1);
                isolation.verify_existing(network.internal.unwrap_or(false), dns_enabled)?;
                debug!("Network {} already exists and is isolated", isolation.network);
                return Ok(());
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(EngineError::Api(e)),
        }

        let mut options = HashMap::new();
        if isolation.internal {
            options.insert("com.docker.network.bridge.enable_ip_masquerade", "false");
        }
        if isolation.disable_dns {
            options.insert(DNS_DISABLED_OPTION.0, DNS_DISABLED_OPTION.1);
        }

        let response = self
            .docker
            .create_network(bollard::network::CreateNetworkOptions {
                name: isolation.network.as_str(),
                driver: "bridge",
                internal: isolation.internal,
                options,
                ..Default::default()
            })
            .await?;

        info!(
            "Created isolation network {} ({})",
            isolation.network, response.id
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "api"
    }
}
