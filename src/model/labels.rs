use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::error::ServiceError;

/// The assertion model is a three-way classifier; anything else at
/// load time means the wrong weights were supplied.
pub const EXPECTED_CLASSES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionLabel {
    Present,
    Absent,
    Conditional,
}

impl AssertionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertionLabel::Present => "PRESENT",
            AssertionLabel::Absent => "ABSENT",
            AssertionLabel::Conditional => "CONDITIONAL",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "PRESENT" => Some(AssertionLabel::Present),
            "ABSENT" => Some(AssertionLabel::Absent),
            "CONDITIONAL" => Some(AssertionLabel::Conditional),
            _ => None,
        }
    }
}

impl fmt::Display for AssertionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class-index → label mapping taken from the model's `config.json`
/// (`id2label`). Resolved once at startup; the published class order
/// of the checkpoint is authoritative, never assumed.
#[derive(Debug, Clone)]
pub struct LabelTable {
    labels: Vec<AssertionLabel>,
}

impl LabelTable {
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Result<Self, ServiceError> {
        if id2label.len() != EXPECTED_CLASSES {
            return Err(ServiceError::ModelConfig(format!(
                "expected {} classes, model config declares {}",
                EXPECTED_CLASSES,
                id2label.len()
            )));
        }

        let mut labels = vec![None; EXPECTED_CLASSES];
        for (id, name) in id2label {
            let index: usize = id.parse().map_err(|_| {
                ServiceError::ModelConfig(format!("non-numeric class id in id2label: {id:?}"))
            })?;
            if index >= EXPECTED_CLASSES {
                return Err(ServiceError::ModelConfig(format!(
                    "class id {index} out of range for {EXPECTED_CLASSES} classes"
                )));
            }
            let label = AssertionLabel::parse(name).ok_or_else(|| {
                ServiceError::ModelConfig(format!("unknown assertion label in id2label: {name:?}"))
            })?;
            if labels[index].replace(label).is_some() {
                return Err(ServiceError::ModelConfig(format!(
                    "duplicate class id in id2label: {index}"
                )));
            }
        }

        // len == EXPECTED_CLASSES and every distinct id < EXPECTED_CLASSES,
        // so the ids are a permutation of 0..EXPECTED_CLASSES.
        Ok(Self {
            labels: labels.into_iter().map(|l| l.unwrap()).collect(),
        })
    }

    pub fn get(&self, class: usize) -> Option<AssertionLabel> {
        self.labels.get(class).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Numerically stable softmax over a logit row.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp_logits: Vec<f32> = logits.iter().map(|&x| (x - max_logit).exp()).collect();
    let sum: f32 = exp_logits.iter().sum();
    exp_logits.iter().map(|&x| x / sum).collect()
}

/// Index and probability of the most likely class.
pub fn best_class(probs: &[f32]) -> Option<(usize, f32)> {
    probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id2label(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_softmax_preserves_ordering() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert!(probs[2] > probs[1]);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1001.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_best_class_picks_argmax() {
        let (class, score) = best_class(&[0.1, 0.7, 0.2]).unwrap();
        assert_eq!(class, 1);
        assert!((score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_best_class_empty() {
        assert!(best_class(&[]).is_none());
    }

    #[test]
    fn test_label_serialization() {
        let json = serde_json::to_string(&AssertionLabel::Conditional).unwrap();
        assert_eq!(json, "\"CONDITIONAL\"");
    }

    #[test]
    fn test_label_parse_case_insensitive() {
        assert_eq!(
            AssertionLabel::parse("present"),
            Some(AssertionLabel::Present)
        );
        assert_eq!(AssertionLabel::parse("ABSENT"), Some(AssertionLabel::Absent));
        assert_eq!(AssertionLabel::parse("maybe"), None);
    }

    #[test]
    fn test_label_table_ordered_by_class_id() {
        let table = LabelTable::from_id2label(&id2label(&[
            ("0", "PRESENT"),
            ("1", "ABSENT"),
            ("2", "CONDITIONAL"),
        ]))
        .unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some(AssertionLabel::Present));
        assert_eq!(table.get(1), Some(AssertionLabel::Absent));
        assert_eq!(table.get(2), Some(AssertionLabel::Conditional));
        assert_eq!(table.get(3), None);
    }

    #[test]
    fn test_label_table_respects_published_order() {
        // A checkpoint is free to publish any permutation.
        let table = LabelTable::from_id2label(&id2label(&[
            ("0", "CONDITIONAL"),
            ("1", "PRESENT"),
            ("2", "ABSENT"),
        ]))
        .unwrap();
        assert_eq!(table.get(0), Some(AssertionLabel::Conditional));
        assert_eq!(table.get(1), Some(AssertionLabel::Present));
    }

    #[test]
    fn test_label_table_rejects_wrong_cardinality() {
        let result = LabelTable::from_id2label(&id2label(&[("0", "PRESENT"), ("1", "ABSENT")]));
        assert!(matches!(result, Err(ServiceError::ModelConfig(_))));
    }

    #[test]
    fn test_label_table_rejects_unknown_label() {
        let result = LabelTable::from_id2label(&id2label(&[
            ("0", "PRESENT"),
            ("1", "ABSENT"),
            ("2", "POSSIBLE_LATER"),
        ]));
        assert!(matches!(result, Err(ServiceError::ModelConfig(_))));
    }

    #[test]
    fn test_label_table_rejects_out_of_range_id() {
        let result = LabelTable::from_id2label(&id2label(&[
            ("0", "PRESENT"),
            ("1", "ABSENT"),
            ("7", "CONDITIONAL"),
        ]));
        assert!(matches!(result, Err(ServiceError::ModelConfig(_))));
    }

    #[test]
    fn test_label_table_rejects_duplicate_id() {
        // "0" and "00" both parse to class 0.
        let result = LabelTable::from_id2label(&id2label(&[
            ("0", "PRESENT"),
            ("00", "ABSENT"),
            ("2", "CONDITIONAL"),
        ]));
        assert!(matches!(result, Err(ServiceError::ModelConfig(_))));
    }

    #[test]
    fn test_label_table_rejects_non_numeric_id() {
        let result = LabelTable::from_id2label(&id2label(&[
            ("zero", "PRESENT"),
            ("1", "ABSENT"),
            ("2", "CONDITIONAL"),
        ]));
        assert!(matches!(result, Err(ServiceError::ModelConfig(_))));
    }
}
