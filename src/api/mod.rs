//! The HTTP surface: routing, middleware, and the JSON error envelope.

pub mod handlers;
pub mod openapi;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::CorsConfig;
use crate::pipeline::Manager;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<Manager>,
}

/// Standard error envelope: `{"error":{"code","message"}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// Application-level error type mapped to stable codes and HTTP statuses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed body, empty query, invalid filter (400).
    InvalidRequest(String),
    /// Unknown pipeline name (404).
    PipelineNotFound(String),
    /// Wrong verb; carries the allowed method (405).
    MethodNotAllowed(&'static str),
    /// Embedding, database, or completion failure (500).
    Execution(String),
    /// SSE capability missing on the transport (500).
    #[allow(dead_code)]
    Streaming(String),
    /// Recovered panic or invariant violation (500).
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PipelineNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Execution(_) | ApiError::Streaming(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::PipelineNotFound(_) => "PIPELINE_NOT_FOUND",
            ApiError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            ApiError::Execution(_) => "EXECUTION_ERROR",
            ApiError::Streaming(_) => "STREAMING_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::InvalidRequest(m)
            | ApiError::PipelineNotFound(m)
            | ApiError::Execution(m)
            | ApiError::Streaming(m)
            | ApiError::Internal(m) => m.clone(),
            ApiError::MethodNotAllowed(_) => "method not allowed".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                message: self.message(),
            },
        };
        let mut resp = json_response(self.status(), &body);
        if let ApiError::MethodNotAllowed(allowed) = self {
            resp.headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allowed));
        }
        resp
    }
}

/// RFC 8631 service description link, attached to every JSON response.
const SERVICE_DESC_LINK: &str = "</v1/openapi.json>; rel=\"service-desc\"";

/// Serialize a JSON response with the service-desc Link header.
pub fn json_response(status: StatusCode, data: &impl Serialize) -> Response {
    let mut resp = (status, axum::Json(serde_json::to_value(data).unwrap_or_default()))
        .into_response();
    resp.headers_mut()
        .insert(header::LINK, HeaderValue::from_static(SERVICE_DESC_LINK));
    resp
}

fn handle_panic(_err: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("panic recovered in request handler");
    ApiError::Internal("internal server error".to_string()).into_response()
}

fn cors_layer(cfg: &CorsConfig) -> Option<CorsLayer> {
    if !cfg.enabled {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(86400));

    let layer = if cfg.allowed_origins.iter().any(|o| o == "*") {
        layer.allow_origin(cors::Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(cors::AllowOrigin::list(origins))
    };

    Some(layer)
}

/// Assemble the application router with its middleware stack:
/// panic recovery wraps request logging, optional CORS wraps both.
pub fn router(manager: Arc<Manager>, cors_cfg: &CorsConfig) -> Router {
    let state = AppState { manager };

    let mut app = Router::new()
        .route(
            "/v1/openapi.json",
            get(handlers::openapi_spec).fallback(method_not_allowed_get),
        )
        .route(
            "/v1/health",
            get(handlers::health).fallback(method_not_allowed_get),
        )
        .route(
            "/v1/pipelines",
            get(handlers::list_pipelines).fallback(method_not_allowed_get),
        )
        .route(
            "/v1/pipelines/{name}",
            post(handlers::query_pipeline).fallback(method_not_allowed_post),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic));

    if let Some(cors) = cors_layer(cors_cfg) {
        app = app.layer(cors);
    }

    app
}

async fn method_not_allowed_get() -> ApiError {
    ApiError::MethodNotAllowed("GET")
}

async fn method_not_allowed_post() -> ApiError {
    ApiError::MethodNotAllowed("POST")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_statuses() {
        let cases = [
            (
                ApiError::InvalidRequest("bad".into()),
                StatusCode::BAD_REQUEST,
                "INVALID_REQUEST",
            ),
            (
                ApiError::PipelineNotFound("nope".into()),
                StatusCode::NOT_FOUND,
                "PIPELINE_NOT_FOUND",
            ),
            (
                ApiError::MethodNotAllowed("GET"),
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
            ),
            (
                ApiError::Execution("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "EXECUTION_ERROR",
            ),
            (
                ApiError::Streaming("no flush".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STREAMING_ERROR",
            ),
            (
                ApiError::Internal("panic".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_error_response_carries_link_header() {
        let resp = ApiError::InvalidRequest("bad".into()).into_response();
        assert_eq!(
            resp.headers().get(header::LINK).unwrap(),
            "</v1/openapi.json>; rel=\"service-desc\""
        );
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let resp = ApiError::MethodNotAllowed("POST").into_response();
        assert_eq!(resp.headers().get(header::ALLOW).unwrap(), "POST");
    }

    #[test]
    fn test_cors_layer_disabled() {
        assert!(cors_layer(&CorsConfig::default()).is_none());
    }

    #[test]
    fn test_cors_layer_enabled_with_origins() {
        let cfg = CorsConfig {
            enabled: true,
            allowed_origins: vec!["https://app.example.com".into()],
        };
        assert!(cors_layer(&cfg).is_some());
    }
}
