use std::sync::Mutex;

use ndarray::{ArrayViewD, Axis};
use ort::session::Session;
use ort::value::Value;
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::ServiceError;
use crate::model::labels::{best_class, softmax, LabelTable};
use crate::model::loader;
use crate::model::{AssertionClassifier, Classification, Device, ModelInfo};

/// Upper bound on sentences per batch request.
pub const MAX_BATCH_SIZE: usize = 64;

const INPUT_IDS: &str = "input_ids";
const ATTENTION_MASK: &str = "attention_mask";
const TOKEN_TYPE_IDS: &str = "token_type_ids";

/// Owns the ONNX session, tokenizer and label table for the loaded
/// checkpoint. The session is behind a `Mutex` because `run` needs
/// exclusive access; encoding happens outside the lock.
pub struct ModelHandle {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: LabelTable,
    name: String,
    device: Device,
    wants_type_ids: bool,
}

impl ModelHandle {
    /// Loads tokenizer, label table and ONNX session from the model
    /// directory. Fails fast on any missing or malformed artifact.
    pub fn load(config: &ModelConfig) -> Result<Self, ServiceError> {
        let tokenizer = loader::load_tokenizer(config.dir.join("tokenizer.json"))?;
        let labels = loader::load_label_table(config.dir.join("config.json"))?;
        let session = loader::load_session(config.dir.join("model.onnx"))?;

        let wants_type_ids = Self::check_inputs(&session)?;

        info!(
            model = %config.name,
            classes = labels.len(),
            token_type_ids = wants_type_ids,
            "model ready"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            name: config.name.clone(),
            device: Device::Cpu,
            wants_type_ids,
        })
    }

    /// The exported graph must take `input_ids` and `attention_mask`;
    /// `token_type_ids` is optional (BERT exports carry it, DistilBERT
    /// style exports do not). Anything else means the wrong graph.
    fn check_inputs(session: &Session) -> Result<bool, ServiceError> {
        let mut has_ids = false;
        let mut has_mask = false;
        let mut has_type_ids = false;

        for input in &session.inputs {
            match input.name.as_str() {
                INPUT_IDS => has_ids = true,
                ATTENTION_MASK => has_mask = true,
                TOKEN_TYPE_IDS => has_type_ids = true,
                other => {
                    return Err(ServiceError::ModelConfig(format!(
                        "unexpected model input: {other:?}"
                    )));
                }
            }
        }

        if !has_ids || !has_mask {
            return Err(ServiceError::ModelConfig(format!(
                "model must accept {INPUT_IDS} and {ATTENTION_MASK} inputs"
            )));
        }

        Ok(has_type_ids)
    }

    /// Runs one padded forward pass over the batch and reads a label
    /// and softmax score off each logit row. Row order matches the
    /// encoding order.
    fn forward(&self, encodings: &[Encoding]) -> Result<Vec<Classification>, ServiceError> {
        let batch = encodings.len();
        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        let mut type_ids = Vec::with_capacity(batch * seq_len);
        for encoding in encodings {
            // The tokenizer pads to the longest sequence in the batch,
            // so every row must already be rectangular.
            if encoding.get_ids().len() != seq_len {
                return Err(ServiceError::ShapeMismatch {
                    expected: vec![batch, seq_len],
                    got: vec![batch, encoding.get_ids().len()],
                });
            }
            ids.extend(encoding.get_ids().iter().map(|&v| v as i64));
            mask.extend(encoding.get_attention_mask().iter().map(|&v| v as i64));
            type_ids.extend(encoding.get_type_ids().iter().map(|&v| v as i64));
        }

        let shape = vec![batch as i64, seq_len as i64];
        let ids_value = Value::from_array((shape.clone(), ids.into_boxed_slice()))?;
        let mask_value = Value::from_array((shape.clone(), mask.into_boxed_slice()))?;

        let mut session = self.session.lock().unwrap();
        let outputs = if self.wants_type_ids {
            let type_ids_value = Value::from_array((shape, type_ids.into_boxed_slice()))?;
            session.run(ort::inputs![
                INPUT_IDS => ids_value,
                ATTENTION_MASK => mask_value,
                TOKEN_TYPE_IDS => type_ids_value,
            ])?
        } else {
            session.run(ort::inputs![
                INPUT_IDS => ids_value,
                ATTENTION_MASK => mask_value,
            ])?
        };

        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>()?;
        let dims: Vec<usize> = out_shape.iter().map(|&d| d as usize).collect();
        if dims != [batch, self.labels.len()] {
            return Err(ServiceError::ShapeMismatch {
                expected: vec![batch, self.labels.len()],
                got: dims,
            });
        }

        let logits = ArrayViewD::from_shape(dims.as_slice(), data)?;
        let mut results = Vec::with_capacity(batch);
        for row in logits.axis_iter(Axis(0)) {
            let row: Vec<f32> = row.iter().copied().collect();
            let probs = softmax(&row);
            let (class, score) = best_class(&probs).ok_or_else(|| ServiceError::ShapeMismatch {
                expected: vec![self.labels.len()],
                got: vec![0],
            })?;
            let label = self.labels.get(class).ok_or_else(|| {
                ServiceError::ModelConfig(format!("class {class} missing from label table"))
            })?;
            results.push(Classification { label, score });
        }

        Ok(results)
    }
}

impl AssertionClassifier for ModelHandle {
    fn classify_one(&self, sentence: &str) -> Result<Classification, ServiceError> {
        let encoding = self
            .tokenizer
            .encode(sentence, true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

        let mut results = self.forward(std::slice::from_ref(&encoding))?;
        debug!(label = %results[0].label, score = results[0].score, "classified sentence");
        Ok(results.remove(0))
    }

    fn classify_batch(&self, sentences: &[String]) -> Result<Vec<Classification>, ServiceError> {
        if sentences.is_empty() {
            return Err(ServiceError::Validation(
                "batch must contain at least one sentence".to_string(),
            ));
        }
        if sentences.len() > MAX_BATCH_SIZE {
            return Err(ServiceError::Validation(format!(
                "batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                sentences.len()
            )));
        }

        let encodings = self
            .tokenizer
            .encode_batch(sentences.to_vec(), true)
            .map_err(|e| ServiceError::Tokenizer(e.to_string()))?;

        let results = self.forward(&encodings)?;
        debug!(count = results.len(), "classified batch");
        Ok(results)
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            loaded: true,
            device: self.device,
        }
    }
}
