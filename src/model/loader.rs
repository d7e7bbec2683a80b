use std::collections::HashMap;
use std::path::Path;

use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::Deserialize;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};
use tracing::info;

use crate::error::ServiceError;
use crate::model::labels::LabelTable;

/// Longest token sequence fed to the encoder; longer inputs are truncated.
pub const MAX_SEQUENCE_LENGTH: usize = 512;

// Initialize the global environment for ORT (only needed once)
pub fn init_ort() -> Result<(), ServiceError> {
    ort::init().with_name("clinnx").commit()?;
    Ok(())
}

/// Loads the exported ONNX classifier and creates an inference session.
pub fn load_session(model_path: impl AsRef<Path>) -> Result<Session, ServiceError> {
    let path = model_path.as_ref();
    if !path.exists() {
        return Err(ServiceError::ModelNotFound(path.display().to_string()));
    }

    // Configure Session
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(4)? // Parallelism within an op
        .commit_from_file(path)?;

    info!(model = %path.display(), "loaded ONNX session");
    for (i, input) in session.inputs.iter().enumerate() {
        info!(index = i, name = %input.name, "model input");
    }

    Ok(session)
}

/// Loads the HuggingFace tokenizer and pins truncation to the model's
/// maximum sequence length. Padding to the longest sequence in a batch
/// is configured here so batched encodes come back rectangular.
pub fn load_tokenizer(tokenizer_path: impl AsRef<Path>) -> Result<Tokenizer, ServiceError> {
    let path = tokenizer_path.as_ref();
    if !path.exists() {
        return Err(ServiceError::ModelNotFound(path.display().to_string()));
    }

    let mut tokenizer =
        Tokenizer::from_file(path).map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length: MAX_SEQUENCE_LENGTH,
            ..Default::default()
        }))
        .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;
    tokenizer.with_padding(Some(PaddingParams::default()));

    info!(tokenizer = %path.display(), "loaded tokenizer");
    Ok(tokenizer)
}

#[derive(Deserialize)]
struct HfModelConfig {
    id2label: HashMap<String, String>,
}

/// Reads `config.json` next to the weights and resolves the class
/// index → assertion label table the checkpoint was trained with.
pub fn load_label_table(config_path: impl AsRef<Path>) -> Result<LabelTable, ServiceError> {
    let path = config_path.as_ref();
    if !path.exists() {
        return Err(ServiceError::ModelNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ServiceError::ModelConfig(format!("{}: {e}", path.display())))?;
    let parsed: HfModelConfig = serde_json::from_str(&content)
        .map_err(|e| ServiceError::ModelConfig(format!("{}: {e}", path.display())))?;

    LabelTable::from_id2label(&parsed.id2label)
}
