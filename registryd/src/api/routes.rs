use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use shared::protocol::HASH_PATH;
use crate::cache::hash::content_hash;
use crate::cache_manager::CacheHandle;

#[derive(Clone)]
pub struct AppState {
    pub cache: CacheHandle,
}

/// Every path except the hash endpoint serves the service listing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HASH_PATH, get(get_hash))
        .fallback(get_services)
        .with_state(state)
}

/// Serialized listing for one snapshot. Serialization of this shape cannot
/// realistically fail; if it does, the body is empty rather than an error.
async fn listing_body(cache: &CacheHandle) -> Result<Vec<u8>, StatusCode> {
    let services = cache.snapshot().await.map_err(|e| {
        tracing::error!("Failed to query services: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(serde_json::to_vec(&services).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize services: {}", e);
        Vec::new()
    }))
}

async fn get_services(State(state): State<AppState>) -> Response {
    tracing::debug!("Service listing requested");

    let body = match listing_body(&state.cache).await {
        Ok(body) => body,
        Err(status) => return status.into_response(),
    };

    let etag = format!("\"{}\"", content_hash(&body));

    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response()
}

async fn get_hash(State(state): State<AppState>) -> Result<String, StatusCode> {
    let body = listing_body(&state.cache).await?;
    Ok(content_hash(&body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;
    use crate::config::LabelConfig;
    use crate::discovery::poller::run_poller;
    use crate::discovery::runtime::ContainerRecord;
    use crate::discovery::ContainerRuntime;

    fn app(cache: &CacheHandle) -> Router {
        router(AppState { cache: cache.clone() })
    }

    async fn send(app: Router, method: Method, uri: &str) -> Response {
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_empty_cache_lists_empty_array() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        let response = send(app(&cache), Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(body_string(response).await, "[]");
    }

    #[tokio::test]
    async fn test_listing_sorted_by_name() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        cache.upsert("10.0.0.1:80".into(), "web".into()).await.unwrap();
        cache.upsert("10.0.0.2:80".into(), "auth".into()).await.unwrap();

        let response = send(app(&cache), Method::GET, "/").await;
        assert_eq!(
            body_string(response).await,
            r#"[{"Name":"auth","Addr":"10.0.0.2:80"},{"Name":"web","Addr":"10.0.0.1:80"}]"#
        );
    }

    #[tokio::test]
    async fn test_any_path_and_method_serves_listing() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        cache.upsert("h:1".into(), "db".into()).await.unwrap();

        let root = body_string(send(app(&cache), Method::GET, "/").await).await;
        let other = body_string(send(app(&cache), Method::POST, "/services/anything").await).await;
        assert_eq!(root, other);
    }

    #[tokio::test]
    async fn test_repeated_requests_byte_identical() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        for (address, name) in [("h3", "c"), ("h1", "a"), ("h2", "b")] {
            cache.upsert(address.into(), name.into()).await.unwrap();
        }

        let first = send(app(&cache), Method::GET, "/").await;
        let first_etag = first.headers()[header::ETAG].clone();
        let first_body = body_string(first).await;

        // Refresh in a different order; the entry set is unchanged
        for (address, name) in [("h2", "b"), ("h3", "c"), ("h1", "a")] {
            cache.upsert(address.into(), name.into()).await.unwrap();
        }

        let second = send(app(&cache), Method::GET, "/").await;
        assert_eq!(second.headers()[header::ETAG], first_etag);
        assert_eq!(body_string(second).await, first_body);
    }

    #[tokio::test]
    async fn test_hash_matches_listing_etag() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        cache.upsert("10.0.0.1:80".into(), "web".into()).await.unwrap();

        let listing = send(app(&cache), Method::GET, "/").await;
        let etag = listing.headers()[header::ETAG].to_str().unwrap().to_string();

        let hash = send(app(&cache), Method::GET, HASH_PATH).await;
        assert_eq!(hash.status(), StatusCode::OK);
        assert_eq!(format!("\"{}\"", body_string(hash).await), etag);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_service_not_listed() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        cache.upsert("A".into(), "svc".into()).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let response = send(app(&cache), Method::GET, "/").await;
        assert_eq!(body_string(response).await, "[]");
    }

    /// A runtime with nothing running
    struct EmptyRuntime;

    #[async_trait::async_trait]
    impl ContainerRuntime for EmptyRuntime {
        async fn list_running(&self) -> anyhow::Result<Vec<ContainerRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_containers_ever_lists_empty_array() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let poller = tokio::spawn(run_poller(
            Arc::new(EmptyRuntime),
            cache.clone(),
            LabelConfig::default(),
            Duration::from_secs(10),
            cancel.clone(),
        ));

        // Several ticks and a full TTL go by with nothing discovered
        tokio::time::sleep(Duration::from_secs(75)).await;
        let response = send(app(&cache), Method::GET, "/").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "[]");

        cancel.cancel();
        poller.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unavailable_after_cache_shutdown() {
        let cache = CacheHandle::spawn(Duration::from_secs(60));
        cache.shutdown().await.unwrap();

        let response = send(app(&cache), Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
