//! REST API for registering, listing and removing services.

use crate::types::{AddServiceRequest, AddServiceResponse};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use poller::{MetricsRegistry, ServiceList, StoreHandle};
use serde_json::json;
use std::path::Path as FsPath;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use validator::Validate;

/// API error, rendered as a JSON body with the matching status code
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(format!("Invalid request: {}", errors))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    store: StoreHandle,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl ApiState {
    pub fn new(store: StoreHandle, metrics: Option<Arc<MetricsRegistry>>) -> Self {
        Self { store, metrics }
    }

    fn record(&self, operation: &str, code: StatusCode) {
        if let Some(ref m) = self.metrics {
            m.record_api_request(operation, code.as_u16());
        }
    }

    fn finish<T>(&self, operation: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
        let code = match &result {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        };
        self.record(operation, code);
        result
    }
}

/// Build the API router.
///
/// Paths matching no route are served from `web_root` when one is given.
pub fn router(state: ApiState, web_root: Option<&FsPath>) -> Router {
    let mut app = Router::new()
        .route("/service", get(list_services).post(add_service))
        .route("/service/:id", delete(delete_service))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    if let Some(root) = web_root {
        app = app.fallback_service(ServeDir::new(root));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Handler for `GET /service`
async fn list_services(State(state): State<ApiState>) -> Json<ServiceList> {
    let services = state.store.snapshot().await;
    state.record("list", StatusCode::OK);
    Json(ServiceList { services })
}

/// Handler for `POST /service`
async fn add_service(
    State(state): State<ApiState>,
    payload: Result<Json<AddServiceRequest>, JsonRejection>,
) -> Result<Json<AddServiceResponse>, ApiError> {
    let result = register(&state, payload).await;
    if let Err(ref e) = result {
        warn!(error = %e, "Rejected add service request");
    }
    state.finish("add", result)
}

async fn register(
    state: &ApiState,
    payload: Result<Json<AddServiceRequest>, JsonRejection>,
) -> Result<Json<AddServiceResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;

    let name = req.name.trim().to_string();
    let url = req.url.trim().to_string();
    let id = state.store.add(name.clone(), url.clone()).await;
    info!(id = %id, name = %name, url = %url, "Service added");

    Ok(Json(AddServiceResponse { id }))
}

/// Handler for `DELETE /service/:id`
async fn delete_service(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let result = if state.store.remove(&id).await {
        info!(id = %id, "Service removed");
        Ok(StatusCode::OK)
    } else {
        Err(ApiError::NotFound(format!("Service {} not found", id)))
    };
    state.finish("delete", result)
}

/// Handler for `GET /metrics`
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    let Some(ref registry) = state.metrics else {
        return ApiError::NotFound("Metrics are disabled".to_string()).into_response();
    };

    let (tracked, in_flight) = state.store.counts().await;
    registry.update_service_counts(tracked, in_flight);

    match registry.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            ApiError::Internal(format!("Failed to encode metrics: {}", e)).into_response()
        }
    }
}
