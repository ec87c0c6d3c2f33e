//! Throw-away stores and request helpers shared by the unit tests.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use crate::app_state::{AppState, SharedState};
use crate::data_access::data_context::DataContext;
use crate::web_api::routes::map_routes;

/// A store in its own temp dir, removed on drop.
pub struct TempStore {
    pub context: DataContext,
    _dir: TempDir,
}

impl TempStore {
    pub fn new(name: &str) -> Self {
        let dir = tempfile::Builder::new().prefix(name).tempdir().unwrap();
        let context = DataContext::open(dir.path().join("taskboard.redb")).unwrap();
        TempStore { context, _dir: dir }
    }
}

/// The full router over a fresh store.
pub fn test_app(name: &str) -> (Router, SharedState, TempStore) {
    let store = TempStore::new(name);
    let state = AppState::new(store.context.clone());
    (map_routes(state.clone()), state, store)
}

/// Send one JSON request and decode the JSON body (`Null` when empty).
pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();
    dispatch(app, request).await
}

pub async fn send_form(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    dispatch(app, request).await
}

async fn dispatch(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return (status, Value::Null);
    }
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

pub fn encode_query(value: &Value) -> String {
    urlencoding::encode(&value.to_string()).into_owned()
}
