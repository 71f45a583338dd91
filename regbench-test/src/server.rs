//! Exposes an in-process fake registry for use in integration tests.
//!
//! ```
//! use regbench_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.descriptors_url();
//!    // point the load generator at the URL...
//! }
//! ```

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Value, json};

/// Path under which the fake registry serves descriptors.
pub const DESCRIPTORS_PATH: &str = "/shell-descriptors";

/// Behavior knobs for the fake registry.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Respond with `500` to every n-th create request (1-based), without storing the descriptor.
    pub fail_every_nth_create: Option<usize>,
}

#[derive(Debug, Default)]
struct Registry {
    options: Options,
    create_attempts: AtomicUsize,
    descriptors: Mutex<Vec<(String, Value)>>,
}

type SharedRegistry = Arc<Registry>;

/// An in-process fake registry for use in integration tests.
///
/// The server keeps all descriptors in memory and listens on a random available port on localhost.
/// It is shut down when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    registry: SharedRegistry,
}

impl TestServer {
    /// Starts a fake registry that accepts all well-formed requests.
    pub async fn new() -> Self {
        Self::with_options(Options::default()).await
    }

    /// Starts a fake registry with the given options.
    pub async fn with_options(options: Options) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let registry = Arc::new(Registry {
            options,
            ..Default::default()
        });
        let app = router(Arc::clone(&registry));

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            handle,
            socket,
            registry,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Returns the base URL of the descriptor collection.
    pub fn descriptors_url(&self) -> String {
        self.url(DESCRIPTORS_PATH)
    }

    /// Number of descriptors currently stored.
    pub fn descriptor_count(&self) -> usize {
        self.registry.descriptors.lock().unwrap().len()
    }

    /// Identifiers of all stored descriptors, in insertion order.
    pub fn descriptor_ids(&self) -> Vec<String> {
        let descriptors = self.registry.descriptors.lock().unwrap();
        descriptors.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Number of create requests received, including failed ones.
    pub fn create_attempts(&self) -> usize {
        self.registry.create_attempts.load(Ordering::Relaxed)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(registry: SharedRegistry) -> Router {
    Router::new()
        .route("/health", routing::get(health))
        .route(
            DESCRIPTORS_PATH,
            routing::get(list_descriptors).post(create_descriptor),
        )
        .route(
            &format!("{DESCRIPTORS_PATH}/{{encoded_id}}"),
            routing::get(get_descriptor),
        )
        .with_state(registry)
}

async fn health() -> impl IntoResponse {
    "OK"
}

async fn create_descriptor(
    State(registry): State<SharedRegistry>,
    Json(body): Json<Value>,
) -> Response {
    let attempt = registry.create_attempts.fetch_add(1, Ordering::Relaxed) + 1;

    let Some(id) = body.get("id").and_then(Value::as_str).map(str::to_owned) else {
        return (StatusCode::BAD_REQUEST, "descriptor without id").into_response();
    };

    let inject_failure = registry
        .options
        .fail_every_nth_create
        .is_some_and(|n| n > 0 && attempt % n == 0);
    if inject_failure {
        tracing::debug!(attempt, "injecting create failure");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut descriptors = registry.descriptors.lock().unwrap();
    if descriptors.iter().any(|(existing, _)| *existing == id) {
        return (StatusCode::CONFLICT, "descriptor already exists").into_response();
    }
    descriptors.push((id, body.clone()));

    (StatusCode::CREATED, Json(body)).into_response()
}

async fn get_descriptor(
    State(registry): State<SharedRegistry>,
    Path(encoded_id): Path<String>,
) -> Response {
    let decoded = URL_SAFE_NO_PAD
        .decode(encoded_id.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok());
    let Some(id) = decoded else {
        return (StatusCode::BAD_REQUEST, "identifier is not base64url").into_response();
    };

    let descriptors = registry.descriptors.lock().unwrap();
    match descriptors.iter().find(|(existing, _)| *existing == id) {
        Some((_, descriptor)) => Json(descriptor.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct Paging {
    limit: Option<usize>,
    cursor: Option<String>,
}

async fn list_descriptors(
    State(registry): State<SharedRegistry>,
    Query(paging): Query<Paging>,
) -> Response {
    let descriptors = registry.descriptors.lock().unwrap();

    let start = paging
        .cursor
        .as_deref()
        .and_then(|cursor| descriptors.iter().position(|(id, _)| id == cursor))
        .unwrap_or(0);
    let limit = paging.limit.unwrap_or(usize::MAX);

    let page: Vec<_> = descriptors
        .iter()
        .skip(start)
        .take(limit)
        .map(|(_, descriptor)| descriptor.clone())
        .collect();
    let next_cursor = descriptors
        .get(start.saturating_add(page.len()))
        .map(|(id, _)| id.clone());

    Json(json!({
        "paging_metadata": { "cursor": next_cursor },
        "result": page,
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_and_reads_descriptors() {
        let server = TestServer::new().await;
        let client = reqwest::Client::new();

        let response = client
            .post(server.descriptors_url())
            .json(&json!({"id": "https://example.org/aas/1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);

        let encoded = URL_SAFE_NO_PAD.encode("https://example.org/aas/1");
        let response = client
            .get(format!("{}/{encoded}", server.descriptors_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let duplicate = client
            .post(server.descriptors_url())
            .json(&json!({"id": "https://example.org/aas/1"}))
            .send()
            .await
            .unwrap();
        assert_eq!(duplicate.status(), 409);
        assert_eq!(server.descriptor_count(), 1);
    }

    #[tokio::test]
    async fn pages_from_cursor() {
        let server = TestServer::new().await;
        let client = reqwest::Client::new();
        for i in 0..5 {
            client
                .post(server.descriptors_url())
                .json(&json!({"id": format!("id-{i}")}))
                .send()
                .await
                .unwrap();
        }

        let page: Value = client
            .get(server.descriptors_url())
            .query(&[("limit", "2"), ("cursor", "id-1")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(page["result"].as_array().unwrap().len(), 2);
        assert_eq!(page["result"][0]["id"], "id-1");
        assert_eq!(page["paging_metadata"]["cursor"], "id-3");
    }

    #[tokio::test]
    async fn injects_create_failures() {
        let server = TestServer::with_options(Options {
            fail_every_nth_create: Some(2),
        })
        .await;
        let client = reqwest::Client::new();

        let mut statuses = Vec::new();
        for i in 0..4 {
            let response = client
                .post(server.descriptors_url())
                .json(&json!({"id": format!("id-{i}")}))
                .send()
                .await
                .unwrap();
            statuses.push(response.status().as_u16());
        }

        assert_eq!(statuses, [201, 500, 201, 500]);
        assert_eq!(server.descriptor_count(), 2);
        assert_eq!(server.create_attempts(), 4);
    }
}
