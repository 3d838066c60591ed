use std::path::Path;
use std::time::Duration;
use serde::Deserialize;
use anyhow::{bail, Context, Result};
use shared::protocol::{LABEL_SERVICE_ADDRESS, LABEL_SERVICE_NAME};

/// Upper bound for every duration setting (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Read when no config file is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "/etc/registryd/registryd.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Docker endpoint: unix:// socket path, or tcp:// / http:// address
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Label keys a container uses to advertise itself
#[derive(Debug, Clone, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_address_label")]
    pub address: String,
    #[serde(default = "default_name_label")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Falls back to `ttl_secs` when unset
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_endpoint() -> String {
    "unix:///var/run/docker.sock".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_address_label() -> String {
    LABEL_SERVICE_ADDRESS.to_string()
}

fn default_name_label() -> String {
    LABEL_SERVICE_NAME.to_string()
}

fn default_poll_interval() -> u64 {
    10
}

fn default_ttl() -> u64 {
    60
}

fn default_listen() -> String {
    "0.0.0.0:80".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            address: default_address_label(),
            name: default_name_label(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.unwrap_or(self.ttl_secs))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load `path` if given, otherwise the default config file if it exists,
    /// otherwise built-in defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = Self::load(path)?;
                tracing::info!("Loaded config from {}", path.display());
                Ok(config)
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                let config = Self::load(DEFAULT_CONFIG_PATH)?;
                tracing::info!("Loaded config from {}", DEFAULT_CONFIG_PATH);
                Ok(config)
            }
            None => {
                tracing::info!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values that would make the poll or sweep loops spin or never expire
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            bail!("poller.interval_secs must be greater than zero");
        }
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than zero");
        }
        if self.cache.sweep_interval_secs == Some(0) {
            bail!("cache.sweep_interval_secs must be greater than zero");
        }
        if self.runtime.timeout_secs == 0 {
            bail!("runtime.timeout_secs must be greater than zero");
        }
        for (key, secs) in [
            ("poller.interval_secs", self.poller.interval_secs),
            ("cache.ttl_secs", self.cache.ttl_secs),
            ("cache.sweep_interval_secs", self.cache.sweep_interval_secs.unwrap_or(0)),
            ("runtime.timeout_secs", self.runtime.timeout_secs),
        ] {
            if secs > MAX_DURATION_SECS {
                bail!("{} must be at most {} seconds, got {}", key, MAX_DURATION_SECS, secs);
            }
        }
        if self.labels.address.is_empty() || self.labels.name.is_empty() {
            bail!("labels.address and labels.name must not be empty");
        }
        Ok(())
    }
}
