#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use image::{DynamicImage, ImageFormat, RgbImage};
use photo_ingest::config::IngestConfig;
use photo_ingest::error::{LocatorError, StoreError};
use photo_ingest::services::locator::ContentLocator;
use photo_ingest::services::orchestrator::BatchOrchestrator;
use photo_ingest::services::storage::ObjectStore;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// Counters shared with the test server's handlers
#[derive(Default)]
pub struct ServerStats {
    pub in_flight: AtomicUsize,
    pub peak: AtomicUsize,
    pub hits: AtomicUsize,
    /// Requests to `/hang` whose handler has not been dropped yet
    pub open_hangs: AtomicUsize,
}

// Decrements on drop, which happens when the client goes away
struct OpenGuard(Arc<ServerStats>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.open_hangs.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct TestServer {
    pub base: String,
    pub stats: Arc<ServerStats>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn serve_png(
    State(stats): State<Arc<ServerStats>>,
    Path((w, h)): Path<(u32, u32)>,
) -> impl IntoResponse {
    stats.hits.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png(w, h))
}

async fn serve_slow_png(
    State(stats): State<Arc<ServerStats>>,
    Path((w, h)): Path<(u32, u32)>,
) -> impl IntoResponse {
    stats.hits.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(150)).await;
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png(w, h))
}

async fn serve_text() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], "x".repeat(4096))
}

async fn serve_tiny() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], vec![0u8; 8])
}

async fn serve_corrupt() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], vec![0xAB; 4096])
}

async fn serve_status(Path(code): Path<u16>) -> impl IntoResponse {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn serve_hang(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.hits.fetch_add(1, Ordering::SeqCst);
    stats.open_hangs.fetch_add(1, Ordering::SeqCst);
    let _guard = OpenGuard(stats.clone());
    tokio::time::sleep(Duration::from_secs(10)).await;
    ([(header::CONTENT_TYPE, "image/png")], png(500, 500))
}

/// Serves image fixtures on an ephemeral local port
pub async fn spawn_server() -> TestServer {
    let stats = Arc::new(ServerStats::default());
    let app = Router::new()
        .route("/png/:w/:h", get(serve_png))
        .route("/slow/:w/:h", get(serve_slow_png))
        .route("/text", get(serve_text))
        .route("/tiny", get(serve_tiny))
        .route("/corrupt", get(serve_corrupt))
        .route("/status/:code", get(serve_status))
        .route("/hang", get(serve_hang))
        .with_state(stats.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        stats,
    }
}

pub enum LocatorBehavior {
    Url(String),
    NotFound,
    Panic,
}

/// Locator answering from a fixed table
#[derive(Default)]
pub struct MockLocator {
    routes: Mutex<HashMap<String, LocatorBehavior>>,
    pub calls: AtomicUsize,
}

impl MockLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, id: &str, behavior: LocatorBehavior) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(id.to_string(), behavior);
        self
    }

    pub fn url(self, id: &str, url: String) -> Self {
        self.route(id, LocatorBehavior::Url(url))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentLocator for MockLocator {
    async fn resolve(&self, reference: &str) -> Result<String, LocatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let found = match self.routes.lock().unwrap().get(reference) {
            Some(LocatorBehavior::Url(url)) => Some(Ok(url.clone())),
            Some(LocatorBehavior::NotFound) | None => None,
            Some(LocatorBehavior::Panic) => Some(Err(())),
        };
        match found {
            Some(Ok(url)) => Ok(url),
            Some(Err(())) => panic!("locator exploded for {}", reference),
            None => Err(LocatorError::NotFound(format!(
                "Bad Request: invalid file_id {}",
                reference
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub content_type: String,
    pub size: usize,
    pub metadata: HashMap<String, String>,
}

pub enum StoreBehavior {
    Accept,
    Fail(fn() -> StoreError),
    Stall(Duration),
    /// Persists immediately but acknowledges after the delay
    AckLate(Duration),
}

/// In-memory store recording every upload
pub struct MockStore {
    behavior: StoreBehavior,
    pub objects: Mutex<Vec<StoredObject>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::with_behavior(StoreBehavior::Accept)
    }

    pub fn with_behavior(behavior: StoreBehavior) -> Self {
        Self {
            behavior,
            objects: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<StoredObject> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn upload(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String, StoreError> {
        match &self.behavior {
            StoreBehavior::Accept => {}
            StoreBehavior::Fail(make_error) => return Err(make_error()),
            StoreBehavior::Stall(delay) => tokio::time::sleep(*delay).await,
            StoreBehavior::AckLate(_) => {}
        }

        self.objects.lock().unwrap().push(StoredObject {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size: data.len(),
            metadata,
        });
        if let StoreBehavior::AckLate(delay) = &self.behavior {
            tokio::time::sleep(*delay).await;
        }
        Ok(format!("memory://{}", key))
    }

    async fn exists(&self, _bucket: &str) -> Result<bool, StoreError> {
        Ok(true)
    }
}

/// Small limits so fixtures stay cheap
pub fn test_config() -> IngestConfig {
    IngestConfig {
        max_concurrent_downloads: 2,
        max_batch_size: 10,
        max_file_size: 1024 * 1024,
        min_file_size: 16,
        min_image_dimension: 450,
        download_timeout: Duration::from_secs(5),
        batch_timeout: None,
        ..IngestConfig::default()
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

pub fn orchestrator(
    config: IngestConfig,
    locator: Arc<MockLocator>,
    store: Arc<MockStore>,
) -> BatchOrchestrator {
    BatchOrchestrator::new(config, locator, store, http_client())
}
