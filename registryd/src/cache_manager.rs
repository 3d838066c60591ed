use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::Service;
use crate::cache::store::{ServiceStore, UpsertOutcome};

/// Commands sent to the cache task
pub enum CacheCommand {
    Upsert {
        address: String,
        name: String,
        reply: oneshot::Sender<UpsertOutcome>,
    },
    Sweep(oneshot::Sender<usize>),
    Snapshot(oneshot::Sender<Vec<Service>>),
    Shutdown,
}

/// Handle to the service cache.
///
/// The store lives on a single task and commands are applied one at a time,
/// so no caller ever observes a partially updated entry. The command channel
/// is bounded: when it fills up, senders wait.
#[derive(Clone)]
pub struct CacheHandle {
    tx: mpsc::Sender<CacheCommand>,
}

impl CacheHandle {
    /// Spawn the cache task with the given entry TTL
    pub fn spawn(ttl: Duration) -> Self {
        let (tx, mut rx) = mpsc::channel::<CacheCommand>(256);
        let mut store = ServiceStore::new(ttl, Instant::now());

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    CacheCommand::Upsert { address, name, reply } => {
                        let outcome = store.upsert(&address, &name, Instant::now());
                        log_upsert(&address, &name, &outcome);
                        let _ = reply.send(outcome);
                    }
                    CacheCommand::Sweep(reply) => {
                        let removed = store.sweep(Instant::now());
                        if removed > 0 {
                            tracing::info!("Expired {} service(s), {} remaining", removed, store.len());
                        } else if !store.is_empty() {
                            tracing::debug!("Sweep found nothing expired, {} live", store.len());
                        }
                        let _ = reply.send(removed);
                    }
                    CacheCommand::Snapshot(reply) => {
                        let _ = reply.send(store.snapshot(Instant::now()));
                    }
                    CacheCommand::Shutdown => {
                        tracing::info!("Cache task shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Record a discovery of `name` at `address`
    pub async fn upsert(&self, address: String, name: String) -> Result<UpsertOutcome> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::Upsert { address, name, reply }).await?;
        Ok(rx.await?)
    }

    /// Drop expired entries. Returns how many were removed.
    pub async fn sweep(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::Sweep(reply)).await?;
        Ok(rx.await?)
    }

    /// All live services, sorted by name
    pub async fn snapshot(&self) -> Result<Vec<Service>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CacheCommand::Snapshot(reply)).await?;
        Ok(rx.await?)
    }

    /// Shutdown the cache task
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(CacheCommand::Shutdown).await?;
        Ok(())
    }
}

fn log_upsert(address: &str, name: &str, outcome: &UpsertOutcome) {
    match outcome {
        UpsertOutcome::Discovered => {
            tracing::info!("Found new service: {} ({})", name, address);
        }
        UpsertOutcome::Renamed { previous } => {
            tracing::info!("Service at {} renamed: {} -> {}", address, previous, name);
        }
        UpsertOutcome::Refreshed => {}
        UpsertOutcome::Rejected => {
            tracing::debug!("Ignoring malformed service record (address={:?}, name={:?})", address, name);
        }
    }
}

/// Periodic maintenance loop, releases expired entries even when idle
pub async fn run(cache: CacheHandle, sweep_interval: Duration, cancel: CancellationToken) -> Result<()> {
    let mut maintenance_interval = tokio::time::interval(sweep_interval);
    maintenance_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = maintenance_interval.tick() => {
                if let Err(e) = cache.sweep().await {
                    tracing::error!("Failed to run maintenance: {}", e);
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Cache manager shutting down");
                break;
            }
        }
    }

    Ok(())
}
