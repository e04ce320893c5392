//! Sequence-classification model on candle.
//!
//! Expects a Hugging Face export in one directory: `tokenizer.json`,
//! `config.json` and a single `model.safetensors`. The backbone is picked
//! from `model_type` (`distilbert` or `bert`); the classification head is
//! loaded from the same weights file.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use candle_core::{D, DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::distilbert::{Config as DistilBertConfig, DistilBertModel};
use serde_json::Value;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Label count assumed when `config.json` names none.
const DEFAULT_NUM_LABELS: usize = 3;

/// Upper bound on class indices accepted from `config.json`.
const MAX_LABELS: usize = 1024;

/// Raw model output for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub class_index: usize,
    /// Softmax probability of `class_index`.
    pub confidence: f32,
    /// Name from `id2label`, or `LABEL_<n>`.
    pub label: String,
}

enum Backbone {
    Bert { model: BertModel, pooler: Linear },
    DistilBert { model: DistilBertModel, pre_classifier: Linear },
}

pub struct ToxicityModel {
    backbone: Backbone,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    labels: Vec<String>,
}

impl ToxicityModel {
    pub fn load(model_dir: &Path, max_length: usize) -> Result<Self> {
        let device = Device::cuda_if_available(0)?;
        info!("🟦 Loading classifier from {} on {:?}", model_dir.display(), device);

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            anyhow!(
                "Tokenizer load failed ({}): {e}",
                tokenizer_path.display()
            )
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("Tokenizer truncation config failed: {e}"))?;
        // One sequence per call, so padding would only add masked tokens
        tokenizer.with_padding(None);

        let config_path = model_dir.join("config.json");
        let raw: Value = serde_json::from_slice(
            &fs::read(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?,
        )
        .with_context(|| format!("parsing {}", config_path.display()))?;
        let labels = label_names(&raw)?;

        let weights = model_dir.join("model.safetensors");
        if !weights.exists() {
            return Err(anyhow!("model.safetensors not found in {:?}", model_dir));
        }
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };

        let model_type = raw
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or("bert");
        let (backbone, hidden) = match model_type {
            "distilbert" => {
                let config: DistilBertConfig = serde_json::from_value(raw.clone())?;
                let dim = hidden_size(&raw, "dim")?;
                let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
                let pre_classifier = candle_nn::linear(dim, dim, vb.pp("pre_classifier"))?;
                (Backbone::DistilBert { model, pre_classifier }, dim)
            }
            "bert" => {
                let config: BertConfig = serde_json::from_value(raw.clone())?;
                let dim = hidden_size(&raw, "hidden_size")?;
                let model = BertModel::load(vb.pp("bert"), &config)?;
                let pooler = candle_nn::linear(dim, dim, vb.pp("bert.pooler.dense"))?;
                (Backbone::Bert { model, pooler }, dim)
            }
            other => return Err(anyhow!("unsupported model_type '{other}'")),
        };
        let classifier = candle_nn::linear(hidden, labels.len(), vb.pp("classifier"))?;

        info!("🚀 Loaded {model_type} classifier with labels {:?}", labels);

        Ok(Self {
            backbone,
            classifier,
            tokenizer,
            device,
            labels,
        })
    }

    /// Classify one text. Blocking; call from a blocking thread.
    pub fn predict(&self, text: &str) -> Result<Prediction> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow!("Tokenizer encode error: {e}"))?;
        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(anyhow!("tokenizer produced no tokens"));
        }
        debug!("Encoded {} tokens", ids.len());

        // Plain forward pass: candle only tracks gradients for Vars
        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let pooled = match &self.backbone {
            Backbone::Bert { model, pooler } => {
                let type_ids = Tensor::new(encoding.get_type_ids(), &self.device)?.unsqueeze(0)?;
                let mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
                let hidden = model.forward(&input_ids, &type_ids, Some(&mask))?;
                pooler.forward(&hidden.i((.., 0))?)?.tanh()?
            }
            Backbone::DistilBert { model, pre_classifier } => {
                // Non-zero entries are masked out; a lone sequence masks nothing
                let mask = Tensor::zeros((ids.len(), ids.len()), DType::U8, &self.device)?;
                let hidden = model.forward(&input_ids, &mask)?;
                pre_classifier.forward(&hidden.i((.., 0))?)?.relu()?
            }
        };

        let logits = self.classifier.forward(&pooled)?.squeeze(0)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let (class_index, confidence) = argmax(&probs.to_vec1::<f32>()?)?;

        Ok(Prediction {
            class_index,
            confidence,
            label: self
                .labels
                .get(class_index)
                .cloned()
                .unwrap_or_else(|| format!("LABEL_{class_index}")),
        })
    }
}

fn hidden_size(raw: &Value, key: &str) -> Result<usize> {
    raw.get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .ok_or_else(|| anyhow!("config.json has no '{key}'"))
}

/// Label names in class-index order, from `id2label` (or `num_labels`).
fn label_names(raw: &Value) -> Result<Vec<String>> {
    let mut named: Vec<(usize, String)> = raw
        .get("id2label")
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| Some((k.parse().ok()?, v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();

    if named.is_empty() {
        let count = match raw.get("num_labels").and_then(Value::as_u64) {
            Some(n) if n == 0 || n > MAX_LABELS as u64 => {
                return Err(anyhow!("config.json num_labels {n} out of range 1..={MAX_LABELS}"));
            }
            Some(n) => n as usize,
            None => DEFAULT_NUM_LABELS,
        };
        return Ok((0..count).map(|i| format!("LABEL_{i}")).collect());
    }

    named.sort_by_key(|(idx, _)| *idx);
    if let Some((idx, _)) = named.iter().find(|(idx, _)| *idx >= MAX_LABELS) {
        return Err(anyhow!("config.json id2label index {idx} out of range (max {MAX_LABELS})"));
    }
    let count = named.last().map_or(0, |(idx, _)| idx + 1);
    let mut labels: Vec<String> = (0..count).map(|i| format!("LABEL_{i}")).collect();
    for (idx, name) in named {
        labels[idx] = name;
    }
    Ok(labels)
}

fn argmax(values: &[f32]) -> Result<(usize, f32)> {
    let (idx, value) = values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| anyhow!("empty logits tensor"))?;
    Ok((idx, *value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_argmax_picks_highest() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]).unwrap(), (1, 0.7));
        assert_eq!(argmax(&[0.9]).unwrap(), (0, 0.9));
    }

    #[test]
    fn test_argmax_empty() {
        assert!(argmax(&[]).is_err());
    }

    #[test]
    fn test_label_names_from_id2label() {
        let raw = json!({
            "id2label": {"2": "offensive", "0": "neutral", "1": "toxic"}
        });
        assert_eq!(label_names(&raw).unwrap(), vec!["neutral", "toxic", "offensive"]);
    }

    #[test]
    fn test_label_names_fill_gaps() {
        let raw = json!({"id2label": {"0": "neutral", "2": "offensive"}});
        assert_eq!(label_names(&raw).unwrap(), vec!["neutral", "LABEL_1", "offensive"]);
    }

    #[test]
    fn test_label_names_from_num_labels() {
        let raw = json!({"num_labels": 2});
        assert_eq!(label_names(&raw).unwrap(), vec!["LABEL_0", "LABEL_1"]);
    }

    #[test]
    fn test_label_names_default() {
        assert_eq!(label_names(&json!({})).unwrap().len(), DEFAULT_NUM_LABELS);
    }

    #[test]
    fn test_label_names_reject_huge_index() {
        let raw = json!({"id2label": {"18446744073709551615": "x"}});
        let err = label_names(&raw).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");

        let raw = json!({"id2label": {"0": "neutral", "100000000000": "x"}});
        assert!(label_names(&raw).is_err());
    }

    #[test]
    fn test_label_names_reject_bad_num_labels() {
        assert!(label_names(&json!({"num_labels": 0})).is_err());
        assert!(label_names(&json!({"num_labels": 100000000000u64})).is_err());
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = ToxicityModel::load(dir.path(), 256).err().expect("load should fail");
        assert!(err.to_string().contains("tokenizer.json"), "{err}");
    }
}
