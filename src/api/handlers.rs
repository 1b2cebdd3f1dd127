//! HTTP request handlers: health, pipeline listing, and the query
//! endpoint with its JSON and SSE renderings.

use std::convert::Infallible;
use std::pin::Pin;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;

use crate::db::validate_filter;
use crate::pipeline::{Info, QueryRequest, StreamEvent};

use super::{json_response, ApiError, AppState};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct PipelinesResponse {
    pipelines: Vec<Info>,
}

/// GET /v1/health
pub async fn health() -> Response {
    json_response(StatusCode::OK, &HealthResponse { status: "healthy" })
}

/// GET /v1/openapi.json
pub async fn openapi_spec() -> Response {
    json_response(StatusCode::OK, &super::openapi::spec())
}

/// GET /v1/pipelines
pub async fn list_pipelines(State(state): State<AppState>) -> Response {
    let pipelines = state.manager.list();
    json_response(StatusCode::OK, &PipelinesResponse { pipelines })
}

/// POST /v1/pipelines/{name}: run a RAG query. Content negotiation is
/// driven by the decoded body's `stream` flag.
pub async fn query_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let pipeline = match state.manager.get(&name) {
        Some(p) => p,
        None => {
            return ApiError::PipelineNotFound(format!("pipeline not found: {name}"))
                .into_response()
        }
    };

    // Decode by hand so malformed JSON gets the standard error envelope
    let req: QueryRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return ApiError::InvalidRequest(format!("invalid request body: {e}")).into_response()
        }
    };

    if req.query.is_empty() {
        return ApiError::InvalidRequest("query is required".to_string()).into_response();
    }

    // Reject bad request filters before any retrieval work starts
    if let Some(filter) = &req.filter {
        if let Err(e) = validate_filter(filter) {
            return ApiError::InvalidRequest(e.to_string()).into_response();
        }
    }

    if req.stream {
        return streaming_response(&pipeline, req).await;
    }

    match pipeline.execute(req).await {
        Ok(resp) => json_response(StatusCode::OK, &resp),
        Err(e) => {
            tracing::error!(pipeline = %name, error = %e, "pipeline execution failed");
            ApiError::Execution(e.to_string()).into_response()
        }
    }
}

fn sse_event(event: &StreamEvent) -> Result<Event, Infallible> {
    // Wire shape: data: {"type":...}\n\n
    match serde_json::to_string(event) {
        Ok(json) => Ok(Event::default().data(json)),
        Err(e) => Ok(Event::default()
            .data(format!("{{\"type\":\"error\",\"error\":\"{e}\"}}"))),
    }
}

/// Render a streaming query as Server-Sent Events. Execution failures
/// that happen before the first chunk still arrive as an `error` event
/// followed by the terminal `done`.
async fn streaming_response(
    pipeline: &crate::pipeline::Pipeline,
    req: QueryRequest,
) -> Response {
    let events: Pin<Box<dyn Stream<Item = StreamEvent> + Send>> =
        match pipeline.execute_stream(req).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "streaming pipeline execution failed");
                let failure = vec![
                    StreamEvent::Error {
                        error: e.to_string(),
                    },
                    StreamEvent::Done,
                ];
                Box::pin(stream::iter(failure))
            }
        };

    let sse_stream = events.map(|ev| sse_event(&ev));

    let mut resp = Sse::new(sse_stream).into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    // Disable nginx buffering
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    resp
}
