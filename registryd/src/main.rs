mod config;
mod cache;
mod cache_manager;
mod discovery;
mod api;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::cache_manager::CacheHandle;
use crate::config::Config;
use crate::discovery::{ContainerRuntime, DockerRuntime};

/// How long open HTTP connections may linger after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Service registry fed by container labels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (default: /etc/registryd/registryd.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Docker endpoint, e.g. unix:///var/run/docker.sock or tcp://host:2375
    #[arg(long)]
    docker_addr: Option<String>,

    /// HTTP listen address, e.g. 0.0.0.0:80
    #[arg(long)]
    listen: Option<String>,

    /// Seconds between container polls
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds a service stays listed after it was last seen
    #[arg(long)]
    ttl: Option<u64>,
}

impl Args {
    fn apply(self, config: &mut Config) {
        if let Some(endpoint) = self.docker_addr {
            config.runtime.endpoint = endpoint;
        }
        if let Some(listen) = self.listen {
            config.api.listen = listen;
        }
        if let Some(secs) = self.poll_interval {
            config.poller.interval_secs = secs;
        }
        if let Some(secs) = self.ttl {
            config.cache.ttl_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("registryd=info"))
        )
        .init();

    tracing::info!("Starting registryd");

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // Connect to the container runtime; unreachable at startup is fatal
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(
        DockerRuntime::connect(&config.runtime.endpoint, config.runtime.timeout_secs).await?,
    );
    tracing::info!("Connected to container runtime at {}", config.runtime.endpoint);

    // Start cache task
    let cache_handle = CacheHandle::spawn(config.cache.ttl());
    tracing::info!("Service TTL is {:?}", config.cache.ttl());

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn cache maintenance task
    let mgr_cancel = cancel.clone();
    let mgr_cache = cache_handle.clone();
    let sweep_interval = config.cache.sweep_interval();
    let mgr_handle = tokio::spawn(async move {
        if let Err(e) = cache_manager::run(mgr_cache, sweep_interval, mgr_cancel).await {
            tracing::error!("Cache manager error: {}", e);
        }
    });

    // Spawn container poller task
    let poller_cancel = cancel.clone();
    let poller_cache = cache_handle.clone();
    let labels = config.labels.clone();
    let interval = config.poller.interval();
    let poller_handle = tokio::spawn(async move {
        if let Err(e) = discovery::poller::run_poller(runtime, poller_cache, labels, interval, poller_cancel).await {
            tracing::error!("Container poller error: {}", e);
        }
    });

    // Build API router
    let app = api::routes::router(api::routes::AppState {
        cache: cache_handle.clone(),
    });

    // Bind HTTP server
    let listener = tokio::net::TcpListener::bind(&config.api.listen)
        .await
        .with_context(|| format!("Failed to bind to {}", config.api.listen))?;

    tracing::info!("API listening on {}", config.api.listen);

    // Run server; once cancelled, in-flight requests get a short grace period
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = api::server::serve(listener, app, server_cancel, SHUTDOWN_GRACE).await {
            tracing::error!("Server error: {:#}", e);
        }
    });

    shutdown_signal().await?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(poller_handle, mgr_handle, server_handle);

    // Shutdown cache task
    if let Err(e) = cache_handle.shutdown().await {
        tracing::error!("Failed to shutdown cache: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to listen for SIGTERM")?;

        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    Ok(())
}
