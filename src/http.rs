use crate::aggregate::Aggregator;
use crate::metrics::Metrics;
use crate::shortcuts::{parse_shortcut_input, ShortcutStore};
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{
    header::{CACHE_CONTROL, CONTENT_TYPE},
    HeaderValue, StatusCode,
};
use axum::response::{Html, IntoResponse, Response};
use axum::{
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

const INDEX_HTML: &str = include_str!("../web/index.html");

#[derive(Clone)]
pub struct HttpAppState {
    pub aggregator: Arc<Aggregator>,
    pub store: Arc<ShortcutStore>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Failures a handler reports to the client. The message is all the client sees.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_handler))
        .route("/api/metrics", get(snapshot_handler))
        .route(
            "/api/shortcuts",
            get(list_shortcuts).post(create_shortcut),
        )
        .route("/api/shortcuts/:id", patch(update_shortcut))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn prometheus_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {err}"),
        )
            .into_response(),
    }
}

async fn snapshot_handler(State(state): State<HttpAppState>) -> Result<Response, ApiError> {
    match state.aggregator.snapshot().await {
        Ok(snapshot) => {
            state.metrics.update_from_snapshot(&snapshot);
            Ok(no_store(Json(snapshot)))
        }
        Err(err) => {
            state.metrics.inc_snapshot_failure();
            error!(error = %err, "failed to collect system metrics");
            Err(ApiError::Internal("Unable to read system metrics"))
        }
    }
}

async fn list_shortcuts(State(state): State<HttpAppState>) -> Result<Response, ApiError> {
    match state.store.list().await {
        Ok(shortcuts) => {
            state.metrics.observe_shortcut_request("list", "ok");
            state.metrics.set_shortcut_count(shortcuts.len());
            Ok(no_store(Json(shortcuts)))
        }
        Err(err) => {
            state.metrics.observe_shortcut_request("list", "error");
            error!(error = %err, "failed to read shortcuts");
            Err(ApiError::Internal("Unable to read shortcuts"))
        }
    }
}

async fn create_shortcut(
    State(state): State<HttpAppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(input) = parse_body(&body) else {
        state.metrics.observe_shortcut_request("create", "invalid");
        return Err(ApiError::BadRequest("Invalid shortcut payload"));
    };

    match state.store.create(input).await {
        Ok((shortcut, total)) => {
            state.metrics.observe_shortcut_request("create", "ok");
            state.metrics.set_shortcut_count(total);
            Ok((StatusCode::CREATED, Json(shortcut)).into_response())
        }
        Err(err) => {
            state.metrics.observe_shortcut_request("create", "error");
            error!(error = %err, "failed to create shortcut");
            Err(ApiError::Internal("Unable to save shortcut"))
        }
    }
}

async fn update_shortcut(
    State(state): State<HttpAppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if id.trim().is_empty() {
        state.metrics.observe_shortcut_request("update", "invalid");
        return Err(ApiError::BadRequest("Shortcut id is required"));
    }
    let Some(input) = parse_body(&body) else {
        state.metrics.observe_shortcut_request("update", "invalid");
        return Err(ApiError::BadRequest("Invalid shortcut payload"));
    };

    match state.store.update(&id, input).await {
        Ok(Some(shortcut)) => {
            state.metrics.observe_shortcut_request("update", "ok");
            Ok(Json(shortcut).into_response())
        }
        Ok(None) => {
            state.metrics.observe_shortcut_request("update", "not_found");
            Err(ApiError::NotFound("Shortcut not found"))
        }
        Err(err) => {
            state.metrics.observe_shortcut_request("update", "error");
            error!(id = %id, error = %err, "failed to update shortcut");
            Err(ApiError::Internal("Unable to update shortcut"))
        }
    }
}

fn parse_body(body: &[u8]) -> Option<crate::shortcuts::ShortcutInput> {
    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "shortcut body is not valid JSON");
            return None;
        }
    };
    parse_shortcut_input(&value)
}

fn no_store(body: impl IntoResponse) -> Response {
    (
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        body,
    )
        .into_response()
}
