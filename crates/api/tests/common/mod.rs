#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::TimeDelta;
use http_body_util::BodyExt;
use noshoes_core::{FileStore, LocalFileStore, ScanOutcome, StoredFile, SweepError};
use tower::ServiceExt;

use noshoes_api::config::ServerConfig;
use noshoes_api::router::build_app_router;
use noshoes_api::state::{AppState, RetentionState};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Build the full application router, optionally with a retention sweeper.
pub fn build_test_app(retention: Option<RetentionState>) -> Router {
    let config = test_config();
    let state = AppState {
        config: Arc::new(config.clone()),
        retention,
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri).await
}

async fn send(app: Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Write `body` to `dir/name` and backdate its mtime by `age`.
pub fn write_aged(dir: &Path, name: &str, body: &str, age: TimeDelta) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() - age.to_std().unwrap())
        .unwrap();
    path
}

/// Local storage whose scans take `delay`, to hold the sweep lock.
#[derive(Debug)]
pub struct SlowStore {
    pub delay: Duration,
}

impl FileStore for SlowStore {
    fn scan(&self, root: &Path, recursive: bool) -> Result<ScanOutcome, SweepError> {
        std::thread::sleep(self.delay);
        LocalFileStore.scan(root, recursive)
    }

    fn stat(&self, path: &Path) -> Result<StoredFile, SweepError> {
        LocalFileStore.stat(path)
    }

    fn remove(&self, path: &Path) -> Result<(), SweepError> {
        LocalFileStore.remove(path)
    }
}
