use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::cache_manager::CacheHandle;
use crate::config::LabelConfig;
use super::runtime::{ContainerRecord, ContainerRuntime};

/// A service advertised through container labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub name: String,
}

/// Extract the advertised service, if the container carries both labels
/// with non-empty values
pub fn advertisement(container: &ContainerRecord, labels: &LabelConfig) -> Option<Advertisement> {
    let address = container.labels.get(&labels.address).filter(|v| !v.is_empty())?;
    let name = container.labels.get(&labels.name).filter(|v| !v.is_empty())?;

    Some(Advertisement {
        address: address.clone(),
        name: name.clone(),
    })
}

/// One poll tick: list running containers and keep the labeled ones,
/// in the order the runtime returned them
pub async fn poll_once(runtime: &dyn ContainerRuntime, labels: &LabelConfig) -> Result<Vec<Advertisement>> {
    let containers = runtime.list_running().await?;

    let found: Vec<Advertisement> = containers
        .iter()
        .filter_map(|c| {
            let ad = advertisement(c, labels)?;
            tracing::trace!("Container {} advertises {} at {}", c.id, ad.name, ad.address);
            Some(ad)
        })
        .collect();

    tracing::debug!("Polled {} container(s), {} advertising a service", containers.len(), found.len());
    Ok(found)
}

async fn poll_tick(runtime: &dyn ContainerRuntime, cache: &CacheHandle, labels: &LabelConfig) {
    let found = match poll_once(runtime, labels).await {
        Ok(found) => found,
        Err(e) => {
            tracing::warn!("Container poll failed, retrying next tick: {:#}", e);
            return;
        }
    };

    for ad in found {
        if let Err(e) = cache.upsert(ad.address, ad.name).await {
            tracing::error!("Failed to upsert service: {}", e);
            return;
        }
    }
}

pub async fn run_poller(
    runtime: Arc<dyn ContainerRuntime>,
    cache: CacheHandle,
    labels: LabelConfig,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!("Starting container poller (every {:?})", interval);

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        // A slow runtime query must not hold up shutdown
        tokio::select! {
            _ = poll_tick(runtime.as_ref(), &cache, &labels) => {}
            _ = cancel.cancelled() => break,
        }
    }

    tracing::info!("Container poller shutting down");
    Ok(())
}
