//! In-process mock classifier backend for integration tests
//!
//! Serves every endpoint the client calls on `127.0.0.1:0`. Training status is
//! scripted per test: each `GET /train/status` pops the next entry and repeats
//! the last one once the script runs out.

#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use leafy_client::transport::Transport;
use leafy_client::workflow::{TrainingWorkflowController, WorkflowSnapshot};
use leafy_common::config::{parse_backend_url, ClientConfig};
use leafy_common::events::{EventBus, Phase};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
pub struct MockState {
    pub labels: BTreeSet<String>,
    pub statuses: VecDeque<(String, String)>,
    pub last_status: Option<(String, String)>,
    /// Label accepted by the last successful `/train/start`
    pub training_label: Option<String>,
    pub start_calls: Vec<String>,
    pub status_calls: usize,
    pub preview_requests: Vec<(String, u32)>,
    pub uploaded_files: Vec<String>,
    pub deleted_labels: Vec<String>,
    /// Forced failure for `/train/preview`: (status, error message)
    pub preview_failure: Option<(u16, String)>,
    /// Forced failure for `/train/start`, checked after the duplicate-label rule
    pub start_failure: Option<(u16, String)>,
    /// Forced failure for `/train/upload`
    pub upload_failure: Option<(u16, String)>,
    /// Extra latency before `/train/preview` answers
    pub preview_delay: Duration,
    /// Extra latency before `GET /train/labels` answers
    pub labels_delay: Duration,
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockBackend {
    pub address: SocketAddr,
    pub state: SharedState,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state: SharedState = Arc::new(Mutex::new(MockState::default()));
        let app = Router::new()
            .route("/predict", post(predict))
            .route("/train/status", get(train_status))
            .route("/train/start", post(train_start))
            .route("/train/labels", get(list_labels))
            .route("/train/labels/:label", delete(delete_label))
            .route("/train/preview", post(preview))
            .route("/train/upload", post(upload))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let address = listener.local_addr().expect("mock backend address");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("run mock backend");
        });

        Self {
            address,
            state,
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn config(&self) -> ClientConfig {
        let mut config = ClientConfig::for_backend(parse_backend_url(&self.url()).unwrap());
        config.poll_interval = TEST_POLL_INTERVAL;
        config
    }

    pub fn transport(&self) -> Transport {
        Transport::new(&self.config()).unwrap()
    }

    pub fn controller(&self) -> TrainingWorkflowController {
        self.controller_with(&self.config())
    }

    pub fn controller_with(&self, config: &ClientConfig) -> TrainingWorkflowController {
        TrainingWorkflowController::new(Transport::new(config).unwrap(), config, EventBus::new(256))
    }

    pub fn add_label(&self, label: &str) {
        self.state.lock().unwrap().labels.insert(label.to_string());
    }

    pub fn script_statuses(&self, statuses: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        state.statuses = statuses
            .iter()
            .map(|(s, m)| (s.to_string(), m.to_string()))
            .collect();
    }

    pub fn fail_preview(&self, status: u16, message: &str) {
        self.state.lock().unwrap().preview_failure = Some((status, message.to_string()));
    }

    pub fn fail_start(&self, status: u16, message: &str) {
        self.state.lock().unwrap().start_failure = Some((status, message.to_string()));
    }

    pub fn fail_upload(&self, status: u16, message: &str) {
        self.state.lock().unwrap().upload_failure = Some((status, message.to_string()));
    }

    pub fn delay_preview(&self, delay: Duration) {
        self.state.lock().unwrap().preview_delay = delay;
    }

    pub fn delay_labels(&self, delay: Duration) {
        self.state.lock().unwrap().labels_delay = delay;
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&MockState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Base URL of a port that was bound and released, so nothing answers on it
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", address)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn forced(failure: &Option<(u16, String)>) -> Option<Response> {
    failure.as_ref().map(|(status, message)| {
        let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error(status, message)
    })
}

fn prediction_body() -> Value {
    json!({
        "class": "oak",
        "confidence": 0.87,
        "all_probs": {
            "oak": 0.87,
            "maple": 0.08,
            "elm": 0.03,
            "birch": 0.01,
            "pine": 0.01
        }
    })
}

async fn predict(request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = match Multipart::from_request(request, &()).await {
            Ok(m) => m,
            Err(_) => return error(StatusCode::BAD_REQUEST, "Invalid form"),
        };
        while let Ok(Some(field)) = multipart.next_field().await {
            if field.name() == Some("file") {
                let bytes = field.bytes().await.unwrap_or_default();
                if bytes.is_empty() {
                    return error(StatusCode::BAD_REQUEST, "No selected file");
                }
                return Json(prediction_body()).into_response();
            }
        }
        return error(StatusCode::BAD_REQUEST, "No file part");
    }

    match Json::<Value>::from_request(request, &()).await {
        Ok(Json(body)) => match body.get("url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Json(prediction_body()).into_response(),
            _ => error(StatusCode::BAD_REQUEST, "No URL provided"),
        },
        Err(_) => error(StatusCode::BAD_REQUEST, "No file or URL provided"),
    }
}

async fn train_status(State(state): State<SharedState>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.status_calls += 1;

    let (status, message) = match state.statuses.pop_front() {
        Some(next) => {
            state.last_status = Some(next.clone());
            next
        }
        None => state
            .last_status
            .clone()
            .unwrap_or_else(|| ("idle".to_string(), String::new())),
    };

    if status == "completed" {
        if let Some(label) = state.training_label.take() {
            state.labels.insert(label);
        }
    }

    Json(json!({ "status": status, "message": message }))
}

async fn train_start(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let leaf_name = body
        .get("leaf_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let mut state = state.lock().unwrap();
    state.start_calls.push(leaf_name.clone());

    if leaf_name.is_empty() {
        return error(StatusCode::BAD_REQUEST, "Leaf name is required");
    }
    if state.labels.contains(&leaf_name) {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "error": format!("'{}' has already been trained", leaf_name),
                "already_trained": true
            })),
        )
            .into_response();
    }
    if let Some(response) = forced(&state.start_failure) {
        return response;
    }

    state.training_label = Some(leaf_name);
    Json(json!({ "message": "Training started" })).into_response()
}

async fn list_labels(State(state): State<SharedState>) -> Json<Value> {
    let delay = state.lock().unwrap().labels_delay;
    tokio::time::sleep(delay).await;

    let state = state.lock().unwrap();
    Json(json!({ "labels": state.labels.iter().collect::<Vec<_>>() }))
}

async fn delete_label(State(state): State<SharedState>, Path(label): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    state.deleted_labels.push(label.clone());
    if state.labels.remove(&label) {
        StatusCode::OK.into_response()
    } else {
        error(StatusCode::NOT_FOUND, "Label not found")
    }
}

async fn preview(State(state): State<SharedState>, Json(body): Json<Value>) -> Response {
    let leaf_name = body
        .get("leaf_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let max_images = body.get("max_images").and_then(Value::as_u64).unwrap_or(0) as u32;

    let delay = state.lock().unwrap().preview_delay;
    tokio::time::sleep(delay).await;

    let mut state = state.lock().unwrap();
    state.preview_requests.push((leaf_name.clone(), max_images));

    if let Some(response) = forced(&state.preview_failure) {
        return response;
    }

    let slug = leaf_name.to_lowercase().replace(' ', "_");
    let images: Vec<String> = (0..max_images)
        .map(|i| format!("/static/preview/{}/{:03}.jpg", slug, i))
        .collect();
    Json(json!({ "images": images })).into_response()
}

async fn upload(State(state): State<SharedState>, mut multipart: Multipart) -> Response {
    let mut leaf_name = String::new();
    let mut names = Vec::new();

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("leaf_name") => leaf_name = field.text().await.unwrap_or_default(),
            Some("images") => names.push(field.file_name().unwrap_or("image").to_string()),
            _ => {}
        }
    }

    if leaf_name.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "Leaf name is required");
    }
    if names.is_empty() {
        return error(StatusCode::BAD_REQUEST, "No images uploaded");
    }
    if let Some(response) = forced(&state.lock().unwrap().upload_failure) {
        return response;
    }

    let slug = leaf_name.trim().to_lowercase();
    let images: Vec<String> = names
        .iter()
        .map(|name| format!("/static/uploads/{}/{}", slug, name))
        .collect();

    state.lock().unwrap().uploaded_files.extend(names);
    Json(json!({ "count": images.len(), "images": images })).into_response()
}

/// Poll snapshots until `done` holds, panicking after [`TEST_TIMEOUT`]
pub async fn wait_until(
    controller: &TrainingWorkflowController,
    what: &str,
    mut done: impl FnMut(&WorkflowSnapshot) -> bool,
) -> WorkflowSnapshot {
    tokio::time::timeout(TEST_TIMEOUT, async {
        loop {
            let snapshot = controller.snapshot().await;
            if done(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}

/// Wait until the controller reaches `phase`
pub async fn wait_for_phase(controller: &TrainingWorkflowController, phase: Phase) -> WorkflowSnapshot {
    wait_until(controller, &format!("{:?}", phase), |s| s.session.phase == phase).await
}
