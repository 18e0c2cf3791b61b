//! In-process hub used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::Json;
use hub_binding::{Client, ClientOptions, PoolOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: u64,
    pub name: String,
}

/// One received multipart part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
struct Content {
    bytes: Bytes,
    directory: bool,
}

#[derive(Default)]
pub struct Hub {
    buckets: Mutex<HashMap<String, Content>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    applications: Mutex<Vec<Application>>,
    pub authorization: Mutex<Vec<String>>,
}

impl Hub {
    fn record(&self, headers: &HeaderMap) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.authorization.lock().unwrap().push(auth);
    }
}

type Shared = Arc<Hub>;

/// Start a hub on an ephemeral port; returns its base URL.
pub async fn serve() -> (String, Shared) {
    let hub = Shared::default();
    let app = Router::new()
        .route("/applications", post(create_application))
        .route("/applications/:id", get(get_application))
        .route(
            "/buckets/:id/*path",
            get(bucket_get).put(bucket_put).delete(bucket_delete),
        )
        .route("/files/:name", post(file_post).get(file_get).patch(file_patch))
        .route("/echo", put(echo).post(echo))
        .with_state(hub.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hub)
}

pub fn client(base: &str) -> Client {
    let options = ClientOptions::new(base)
        .token("Bearer test")
        .retry(0)
        .pool(PoolOptions {
            env_proxy: false,
            ..PoolOptions::default()
        });
    Client::new(options).unwrap()
}

async fn create_application(
    State(hub): State<Shared>,
    headers: HeaderMap,
    Json(mut app): Json<Application>,
) -> Response {
    hub.record(&headers);
    let mut apps = hub.applications.lock().unwrap();
    if apps.iter().any(|a| a.name == app.name) {
        let body = serde_json::json!({ "error": format!("application '{}' exists", app.name) });
        return (StatusCode::CONFLICT, Json(body)).into_response();
    }
    app.id = apps.len() as u64 + 7;
    apps.push(app.clone());
    (StatusCode::CREATED, Json(app)).into_response()
}

async fn get_application(
    State(hub): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    hub.record(&headers);
    let apps = hub.applications.lock().unwrap();
    match apps.iter().find(|a| a.id == id) {
        Some(app) => Json(app.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn bucket_get(State(hub): State<Shared>, Path((id, path)): Path<(u64, String)>) -> Response {
    let key = format!("{id}/{path}");
    let buckets = hub.buckets.lock().unwrap();
    match buckets.get(&key) {
        Some(content) if content.bytes.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Some(content) if content.directory => (
            [
                (header::CONTENT_TYPE, "application/octet-stream"),
                (header::HeaderName::from_static("x-directory"), "expand"),
            ],
            content.bytes.clone(),
        )
            .into_response(),
        Some(content) => content.bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn bucket_put(
    State(hub): State<Shared>,
    Path((id, path)): Path<(u64, String)>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> StatusCode {
    let directory = headers
        .get("x-directory")
        .is_some_and(|v| v.as_bytes() == b"expand");
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.unwrap();
            let key = format!("{id}/{path}");
            hub.buckets
                .lock()
                .unwrap()
                .insert(key, Content { bytes, directory });
        }
    }
    StatusCode::NO_CONTENT
}

async fn bucket_delete(State(hub): State<Shared>, Path((id, path)): Path<(u64, String)>) -> StatusCode {
    let key = format!("{id}/{path}");
    match hub.buckets.lock().unwrap().remove(&key) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn file_post(
    State(hub): State<Shared>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let mut content = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        content.extend_from_slice(&field.bytes().await.unwrap());
    }
    let size = content.len();
    hub.files.lock().unwrap().insert(name.clone(), content);
    let body = serde_json::json!({ "name": name, "size": size });
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn file_get(State(hub): State<Shared>, Path(name): Path<String>) -> Response {
    match hub.files.lock().unwrap().get(&name) {
        Some(content) if content.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Some(content) => content.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn file_patch(
    State(hub): State<Shared>,
    Path(name): Path<String>,
    mut multipart: Multipart,
) -> StatusCode {
    if !hub.files.lock().unwrap().contains_key(&name) {
        return StatusCode::NOT_FOUND;
    }
    let mut appended = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        appended.extend_from_slice(&field.bytes().await.unwrap());
    }
    if let Some(content) = hub.files.lock().unwrap().get_mut(&name) {
        content.extend_from_slice(&appended);
    }
    StatusCode::NO_CONTENT
}

async fn echo(mut multipart: Multipart) -> Json<Vec<Part>> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = field.bytes().await.unwrap().len();
        parts.push(Part {
            name,
            filename,
            content_type,
            size,
        });
    }
    Json(parts)
}
