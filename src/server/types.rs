use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::model::handle::MAX_BATCH_SIZE;
use crate::model::labels::AssertionLabel;
use crate::model::AssertionClassifier;

/// Longest accepted sentence, in characters.
pub const MAX_SENTENCE_CHARS: usize = 2048;

/// Shared application state: the classifier behind the endpoints.
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn AssertionClassifier>,
}

// --- DTOs ---

#[derive(Deserialize)]
pub struct PredictRequest {
    pub sentence: String,
}

impl PredictRequest {
    /// Trims the sentence and rejects blank or overlong input.
    pub fn validated_sentence(&self) -> Result<&str, ServiceError> {
        let sentence = self.sentence.trim();
        if sentence.is_empty() {
            return Err(ServiceError::Validation(
                "sentence must not be blank".to_string(),
            ));
        }
        if sentence.chars().count() > MAX_SENTENCE_CHARS {
            return Err(ServiceError::Validation(format!(
                "sentence exceeds maximum length of {MAX_SENTENCE_CHARS} characters"
            )));
        }
        Ok(sentence)
    }
}

#[derive(Deserialize)]
pub struct BatchPredictRequest {
    pub sentences: Vec<String>,
}

impl BatchPredictRequest {
    /// Validates batch bounds and every member sentence, returning the
    /// trimmed sentences in request order.
    pub fn validated_sentences(&self) -> Result<Vec<String>, ServiceError> {
        if self.sentences.is_empty() {
            return Err(ServiceError::Validation(
                "sentences must contain at least one item".to_string(),
            ));
        }
        if self.sentences.len() > MAX_BATCH_SIZE {
            return Err(ServiceError::Validation(format!(
                "batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                self.sentences.len()
            )));
        }

        let mut trimmed = Vec::with_capacity(self.sentences.len());
        for (i, sentence) in self.sentences.iter().enumerate() {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                return Err(ServiceError::Validation(format!(
                    "sentences[{i}] must not be blank"
                )));
            }
            if sentence.chars().count() > MAX_SENTENCE_CHARS {
                return Err(ServiceError::Validation(format!(
                    "sentences[{i}] exceeds maximum length of {MAX_SENTENCE_CHARS} characters"
                )));
            }
            trimmed.push(sentence.to_string());
        }
        Ok(trimmed)
    }
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub label: AssertionLabel,
    pub score: f32,
}

#[derive(Serialize)]
pub struct BatchPredictItem {
    pub sentence: String,
    pub label: AssertionLabel,
    pub score: f32,
}

#[derive(Serialize)]
pub struct BatchPredictResponse {
    pub count: usize,
    pub results: Vec<BatchPredictItem>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_name: String,
    pub model_loaded: bool,
    pub device: String,
}

/// Scores are rounded to four decimals at the HTTP surface only; the
/// classifier itself reports full precision.
pub fn round4(score: f32) -> f32 {
    (score * 10_000.0).round() / 10_000.0
}
