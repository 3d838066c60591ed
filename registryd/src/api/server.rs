use std::future::IntoFuture;
use std::time::Duration;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};

/// Serve `app` until `cancel` fires, then give open connections at most
/// `grace` to finish before returning. Connections still open after that are
/// dropped with the runtime.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
    grace: Duration,
) -> Result<()> {
    let shutdown = cancel.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => return res.context("HTTP server failed"),
        _ = cancel.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(res) => res.context("HTTP server failed"),
        Err(_) => {
            tracing::warn!("Dropping in-flight connections after {:?}", grace);
            Ok(())
        }
    }
}
