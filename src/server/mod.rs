// Server side of the shared card record

pub mod routes;
pub mod service;

pub use routes::{router, CARDS_PATH};
pub use service::{CardService, FetchSource, Fetched, ServiceError, STORE_KEY};

use crate::cache::{CacheDb, CacheError, KvStore};
use crate::config::ServerConfig;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

pub type SharedService = Arc<CardService<Arc<dyn KvStore>>>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to open card store: {0}")]
    Store(#[from] CacheError),
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),
}

pub fn shared_service(kv: Arc<dyn KvStore>) -> SharedService {
    Arc::new(CardService::new(kv))
}

/// Open the configured store, bind, and serve until Ctrl-C
pub async fn start_server(config: &ServerConfig) -> Result<(), ServerError> {
    tracing::info!("Card store: {:?}", config.db_path);
    let kv: Arc<dyn KvStore> = Arc::new(CacheDb::new(&config.db_path)?);

    let listener = TcpListener::bind(config.bind).await?;
    tracing::info!("Starting card server on {}", listener.local_addr()?);

    serve(listener, Some(shared_service(kv)), shutdown_signal()).await
}

pub async fn serve<F>(
    listener: TcpListener,
    service: Option<SharedService>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down card server");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::{now_millis, CardStore};
    use crate::remote::{HttpRemote, RemoteError, RemoteStore};
    use crate::sanitize::sanitize;
    use serde_json::{json, Value};
    use tokio::sync::oneshot;

    struct TestServer {
        url: String,
        stop: Option<oneshot::Sender<()>>,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
        }
    }

    async fn spawn_server(service: Option<SharedService>) -> TestServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, service, async {
            rx.await.ok();
        }));
        TestServer {
            url: format!("http://{}", addr),
            stop: Some(tx),
        }
    }

    fn memory_service() -> SharedService {
        shared_service(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_get_before_first_write() {
        let server = spawn_server(Some(memory_service())).await;
        let resp = reqwest::get(format!("{}{}", server.url, CARDS_PATH)).await.unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"],
            "application/json; charset=utf-8"
        );
        assert_eq!(resp.headers()["cache-control"], "no-store");

        let body: Value = resp.json().await.unwrap();
        assert!(body["updatedAt"].is_null());
        assert_eq!(body["cardTypes"][0]["id"], json!("warranty"));
        assert_eq!(body["cards"]["no-warranty"], json!([]));
    }

    #[tokio::test]
    async fn test_http_round_trip() {
        let server = spawn_server(Some(memory_service())).await;
        let remote = HttpRemote::new(&server.url);

        let pushed = json!({
            "cardTypes": [{"id": "gift", "name": "Gift", "allowDuplicate": true, "duplicateCount": "2"}],
            "cards": {"gift": [{"value": "A"}, {"value": "A"}, {"value": " "}]},
            "templates": {"gift": "code:{{card}}"}
        });
        let store: CardStore = sanitize(&pushed);

        let before = now_millis();
        let pushed_back = remote.push(&store).await.unwrap();
        let fetched = remote.fetch().await.unwrap();

        assert_eq!(fetched.store, sanitize(&pushed));
        assert_eq!(fetched.store, pushed_back.store);
        assert_eq!(fetched.updated_at, pushed_back.updated_at);
        assert!(fetched.updated_at.unwrap() >= before);
        assert_eq!(fetched.store.cards["gift"].len(), 2);
    }

    #[tokio::test]
    async fn test_put_invalid_json_is_client_error() {
        let server = spawn_server(Some(memory_service())).await;
        let client = reqwest::Client::new();
        let resp = client
            .put(format!("{}{}", server.url, CARDS_PATH))
            .header("content-type", "application/json")
            .body("{\"cards\":")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(resp.headers()["cache-control"], "no-store");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], json!("Invalid JSON body"));

        // nothing was written
        let fetched = HttpRemote::new(&server.url).fetch().await.unwrap();
        assert!(fetched.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_missing_binding_is_server_error() {
        let server = spawn_server(None).await;
        let remote = HttpRemote::new(&server.url);

        match remote.fetch().await {
            Err(RemoteError::Status { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert!(body.contains("binding is missing"));
            }
            other => panic!("Expected 500, got {:?}", other.map(|s| s.updated_at)),
        }
        assert!(matches!(
            remote.push(&CardStore::default()).await,
            Err(RemoteError::Status { .. })
        ));
    }
}
