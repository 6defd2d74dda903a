//! HTTP front door
//!
//! Thin, stateless glue over the pipeline: `POST /run-audit` takes the
//! request triple, runs one pipeline execution, and maps stage-tagged
//! failures onto status codes (validation → 400, everything else → 500).

use crate::error::Stage;
use crate::pipeline::AuditPipeline;
use crate::request::AuditRequest;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub fn router(pipeline: Arc<AuditPipeline>) -> Router {
    Router::new()
        .route("/run-audit", post(run_audit))
        .route("/healthz", get(healthz))
        .with_state(pipeline)
}

/// Serve until ctrl-c.
pub async fn serve(pipeline: Arc<AuditPipeline>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Audit runner listening on port {}", port);
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
    } else {
        info!("Shutdown signal received");
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn run_audit(
    State(pipeline): State<Arc<AuditPipeline>>,
    Json(request): Json<AuditRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match pipeline.run(&request).await {
        Ok(result) => Ok(Json(json!({ "auditLink": result.shareable_link }))),
        Err(e) => {
            let status = if e.stage() == Stage::Validation {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Err((
                status,
                Json(json!({
                    "error": format!("Failed to generate audit: {}", e),
                    "stage": e.stage().as_str(),
                    "retryable": e.retryable(),
                })),
            ))
        }
    }
}
