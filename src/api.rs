//! REST API server for the coaching pipeline
//!
//! Thin transport over the orchestrator. Client-caused failures come back
//! as 400/429 with precise reasons; everything else is a generic 500 that
//! exposes nothing but the trace id.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::agent::{CoachOrchestrator, QueryFailure};
use crate::error::CoachError;
use crate::models::QueryRequest;

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<CoachOrchestrator>,
}

/// =============================
/// Error → Status Mapping
/// =============================

fn failure_response(failure: QueryFailure) -> (StatusCode, Json<ApiResponse>) {
    match failure.error {
        CoachError::Validation(reason) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format!("Invalid request: {}", reason))),
        ),
        CoachError::RateLimited { retry_after_ms } => {
            let mut response = ApiResponse::error("Rate limit exceeded".to_string());
            response.data = Some(serde_json::json!({ "retry_after_ms": retry_after_ms }));
            (StatusCode::TOO_MANY_REQUESTS, Json(response))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "The service could not complete the request; reference trace {}",
                failure.trace_id
            ))),
        ),
    }
}

/// 500 for a storage failure. The cause goes to the log, never the body.
fn storage_failure_response(error: &CoachError) -> (StatusCode, Json<ApiResponse>) {
    warn!("Trace lookup failed: {}", error);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error(
            "The service could not complete the request".to_string(),
        )),
    )
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Coach Query Endpoint
/// =============================

async fn coach_query(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    info!("Received coach query");

    match state.orchestrator.handle_query(request).await {
        Ok(response) => (StatusCode::OK, Json(ApiResponse::success(response))),
        Err(failure) => failure_response(failure),
    }
}

/// =============================
/// Trace Lookup Endpoint
/// =============================

async fn get_trace(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse>) {
    match state.orchestrator.traces().get(id).await {
        Ok(Some(trace)) => (StatusCode::OK, Json(ApiResponse::success(trace))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("No trace with id {}", id))),
        ),
        Err(e) => storage_failure_response(&e),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<CoachOrchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", get(health))
        .route("/api/coach/query", post(coach_query))
        .route("/api/traces/:id", get(get_trace))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<CoachOrchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
