//! Request handlers

use super::error::{ApiError, Result};
use super::state::AppState;
use crate::artifacts::store::list_dir;
use crate::artifacts::ArtifactKind;
use crate::error::PredictError;
use crate::types::prediction::PredictionResponse;
use crate::types::record::RawRecord;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<RawRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(record) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let started = Instant::now();

    // Model execution is CPU-bound; keep it off the async workers
    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.predict(&record))
        .await
        .map_err(|e| ApiError::Internal(format!("prediction task failed: {e}")))?;

    match outcome {
        Ok(result) => {
            let elapsed = started.elapsed();
            state.metrics.record_prediction(elapsed, &result.prediction);
            debug!(
                prediction = %result.prediction,
                processing_time_us = elapsed.as_micros() as u64,
                "Prediction served"
            );
            Ok(Json(result.into()))
        }
        Err(PredictError::Validation(e)) => {
            state.metrics.record_validation_failure(e.feature());
            debug!(feature = %e.feature(), error = %e, "Rejected prediction request");
            Err(e.into())
        }
        Err(PredictError::Inference(e)) => {
            state.metrics.record_inference_failure();
            Err(e.into())
        }
    }
}

pub async fn debug_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let listing = |dir: &std::path::Path| match list_dir(dir) {
        Ok(files) => json!(files),
        Err(e) => json!([format!("ERROR: {e}")]),
    };

    let static_files = state.static_dir.as_deref().map(listing);

    Json(json!({
        "artifacts_dir": state.artifacts_dir.display().to_string(),
        "artifact_files": listing(state.artifacts_dir.as_path()),
        "static_dir": state.static_dir.as_ref().map(|d| d.display().to_string()),
        "static_files": static_files,
        "metrics": state.metrics.snapshot(),
        "started_at": state.started_at.to_rfc3339(),
        "server_time": chrono::Utc::now().timestamp(),
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let artifacts = state.pipeline.artifacts();
    let summaries: serde_json::Map<String, Value> = ArtifactKind::ALL
        .iter()
        .map(|&kind| (kind.name().to_string(), json!(artifacts.get(kind).summary())))
        .collect();

    Json(json!({
        "status": "ready",
        "artifacts": summaries,
        "labels": artifacts.label_encoder().classes(),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}
