//! Container creation requests.
//!
//! Provides a fluent builder for the engine-neutral description of a container
//! to create. Backends translate it into CLI flags or API bodies.

use super::{EngineError, Result};
use std::collections::BTreeMap;

/// Name of the network sandboxed submissions are attached to.
pub const DEFAULT_NETWORK_NAME: &str = "labbox-isolated";

/// Network sandbox for untrusted workloads.
///
/// The network is internal (no outbound NAT) and the container gets neither DNS
/// servers nor search domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIsolation {
    /// Network name
    pub network: String,
    /// No outbound address translation
    pub internal: bool,
    /// No resolver configured inside the container
    pub disable_dns: bool,
    /// No search domains injected into the container
    pub disable_dns_search: bool,
}

impl Default for NetworkIsolation {
    fn default() -> Self {
        Self::named(DEFAULT_NETWORK_NAME)
    }
}

impl NetworkIsolation {
    /// Fully isolated network with the given name.
    pub fn named<S: Into<String>>(network: S) -> Self {
        Self {
            network: network.into(),
            internal: true,
            disable_dns: true,
            disable_dns_search: true,
        }
    }

    /// Check that an already existing network is at least as closed as requested.
    ///
    /// `dns_enabled` is `None` when the engine does not report it; the
    /// per-container resolver settings still apply in that case.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the network routes outbound traffic or
    /// runs a resolver while isolation asks for neither.
    pub fn verify_existing(&self, internal: bool, dns_enabled: Option<bool>) -> Result<()> {
        let mut problems = Vec::new();
        if self.internal && !internal {
            problems.push("it is not internal");
        }
        if self.disable_dns && dns_enabled == Some(true) {
            problems.push("it has DNS enabled");
        }

        if problems.is_empty() {
            return Ok(());
        }

        Err(EngineError::Config(format!(
            "network {} cannot be used for isolation: {}; remove it or configure another network name",
            self.network,
            problems.join(" and ")
        )))
    }
}

/// Container creation request builder.
#[derive(Debug, Default)]
pub struct CreateRequestBuilder {
    image: Option<String>,
    cmd: Vec<String>,
    name: Option<String>,
    labels: BTreeMap<String, String>,
    isolation: Option<NetworkIsolation>,
}

impl CreateRequestBuilder {
    /// Create a new request builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the container image.
    pub fn image<S: Into<String>>(mut self, image: S) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the command (program followed by its arguments).
    pub fn cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = cmd.into_iter().map(|s| s.into()).collect();
        self
    }

    /// Set the container name.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a label to the container.
    pub fn label<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Attach the container to an isolation network, or to the engine default with `None`.
    pub fn isolation(mut self, isolation: Option<NetworkIsolation>) -> Self {
        self.isolation = isolation;
        self
    }

    /// Build the request.
    ///
    /// # Errors
    ///
    /// Returns error if the image is missing or empty.
    pub fn build(self) -> Result<CreateRequest> {
        let image = self
            .image
            .filter(|image| !image.trim().is_empty())
            .ok_or_else(|| EngineError::Config("Image is required".to_string()))?;

        Ok(CreateRequest {
            image,
            cmd: self.cmd,
            name: self.name,
            labels: self.labels,
            isolation: self.isolation,
        })
    }
}

/// Engine-neutral container creation request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Image reference
    pub image: String,
    /// Command and arguments; empty keeps the image default
    pub cmd: Vec<String>,
    /// Container name
    pub name: Option<String>,
    /// Labels
    pub labels: BTreeMap<String, String>,
    /// Network sandbox, if any
    pub isolation: Option<NetworkIsolation>,
}

impl CreateRequest {
    /// Create a new request builder.
    pub fn builder() -> CreateRequestBuilder {
        CreateRequestBuilder::new()
    }

    /// Whether the container will be network isolated.
    pub fn is_isolated(&self) -> bool {
        self.isolation.is_some()
    }
}
