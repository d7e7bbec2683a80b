use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::ServiceError;
use crate::server::types::{
    round4, AppState, BatchPredictItem, BatchPredictRequest, BatchPredictResponse, HealthResponse,
    PredictRequest, PredictResponse,
};

/// GET / — service identity and endpoint map.
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let info = state.classifier.info();
    Json(json!({
        "name": "Clinical Assertion API",
        "version": env!("CARGO_PKG_VERSION"),
        "model": info.name,
        "endpoints": {
            "health": "/health",
            "predict": "/predict",
            "predict_batch": "/predict/batch",
        },
    }))
}

/// GET /health — always 200; `status` reports whether the model is
/// actually serving.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let info = state.classifier.info();
    Json(HealthResponse {
        status: if info.loaded { "ok" } else { "degraded" },
        model_name: info.name,
        model_loaded: info.loaded,
        device: info.device.to_string(),
    })
}

/// POST /predict — classifies a single sentence.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ServiceError> {
    let sentence = payload.validated_sentence()?;

    let start = Instant::now();
    let classification = state.classifier.classify_one(sentence)?;
    debug!(
        label = %classification.label,
        score = classification.score,
        elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0,
        "predict"
    );

    Ok(Json(PredictResponse {
        label: classification.label,
        score: round4(classification.score),
    }))
}

/// POST /predict/batch — classifies up to the batch limit of sentences
/// in one forward pass. Result order mirrors request order.
pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchPredictRequest>,
) -> Result<Json<BatchPredictResponse>, ServiceError> {
    let sentences = payload.validated_sentences()?;

    let start = Instant::now();
    let classifications = state.classifier.classify_batch(&sentences)?;
    debug!(
        count = classifications.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0,
        "predict batch"
    );

    let results: Vec<BatchPredictItem> = sentences
        .into_iter()
        .zip(classifications)
        .map(|(sentence, classification)| BatchPredictItem {
            sentence,
            label: classification.label,
            score: round4(classification.score),
        })
        .collect();

    Ok(Json(BatchPredictResponse {
        count: results.len(),
        results,
    }))
}
