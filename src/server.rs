use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::collector::encode_text;
use crate::config::HEALTH_PATH;
use crate::observability::spans;

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

struct AppState {
    registry: Registry,
    metrics_path: String,
}

/// HTTP exposition server
pub struct ExporterServer {
    addr: String,
    metrics_path: String,
    registry: Registry,
}

impl ExporterServer {
    pub fn new(addr: String, metrics_path: String, registry: Registry) -> Self {
        ExporterServer {
            addr,
            metrics_path,
            registry,
        }
    }

    pub fn router(&self) -> Router {
        router(self.registry.clone(), &self.metrics_path)
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();
        let listener = TcpListener::bind(&self.addr).await?;
        info!(
            "Exporter listening on {}{}",
            listener.local_addr()?,
            self.metrics_path
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Routes: `GET <metrics_path>` and `GET /health`.
pub fn router(registry: Registry, metrics_path: &str) -> Router {
    let state = Arc::new(AppState {
        registry,
        metrics_path: metrics_path.to_string(),
    });
    Router::new()
        .route(metrics_path, get(metrics))
        .route(HEALTH_PATH, get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Scrapes run the collectors synchronously, so they go to the blocking pool.
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let span = spans::exposition_span(&state.metrics_path);
    let registry = state.registry.clone();

    let encoded = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        encode_text(&registry)
    })
    .await;

    match encoded {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Ok(Err(e)) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!("Scrape task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScriptCollector;
    use crate::script::{Classifier, Script};
    use crate::store::MemoryExecutor;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn spawn_server(registry: Registry) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(registry, "/metrics");
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let addr = spawn_server(Registry::new()).await;
        let response = http_get(addr, "/health").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("ok"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let registry = Registry::new();
        let collector = ScriptCollector::new(
            MemoryExecutor::from_pairs([("players:online", "42")]),
            vec![Script::new("players.lua", "return {}")],
            Classifier::new(),
            "redis",
        )
        .unwrap();
        registry.register(Box::new(collector)).unwrap();

        let addr = spawn_server(registry).await;
        let response = http_get(addr, "/metrics").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/plain; version=0.0.4"));
        assert!(response.contains(
            r#"redis_script_values{key="players:online",filename="players.lua"} 42"#
        ));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let addr = spawn_server(Registry::new()).await;
        let response = http_get(addr, "/nope").await;
        assert!(response.starts_with("HTTP/1.1 404"));
    }
}
