use std::collections::HashMap;
use async_trait::async_trait;
use anyhow::{bail, Context, Result};
use bollard::container::ListContainersOptions;
use bollard::{Docker, API_DEFAULT_VERSION};

/// A running container as seen by the poller
#[derive(Debug, Clone, Default)]
pub struct ContainerRecord {
    pub id: String,
    pub labels: HashMap<String, String>,
}

/// Source of "which containers are running right now"
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_running(&self) -> Result<Vec<ContainerRecord>>;
}

/// Docker Engine API client
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the daemon at `endpoint` and verify it answers a ping.
    ///
    /// Accepts `unix:///path/to/docker.sock`, `tcp://host:port` and
    /// `http://host:port`.
    pub async fn connect(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = if endpoint.starts_with("unix://") {
            Docker::connect_with_unix(endpoint, timeout_secs, API_DEFAULT_VERSION)
        } else if let Some(addr) = endpoint.strip_prefix("tcp://") {
            Docker::connect_with_http(&format!("http://{}", addr), timeout_secs, API_DEFAULT_VERSION)
        } else if endpoint.starts_with("http://") {
            Docker::connect_with_http(endpoint, timeout_secs, API_DEFAULT_VERSION)
        } else {
            bail!("Unsupported runtime endpoint: {}", endpoint);
        };
        let docker = client
            .with_context(|| format!("Failed to create Docker client for {}", endpoint))?;

        docker
            .ping()
            .await
            .with_context(|| format!("Docker daemon at {} is not reachable", endpoint))?;

        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_running(&self) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .context("Failed to list containers")?;

        Ok(containers
            .into_iter()
            .map(|summary| ContainerRecord {
                id: summary.id.unwrap_or_default(),
                labels: summary.labels.unwrap_or_default(),
            })
            .collect())
    }
}
