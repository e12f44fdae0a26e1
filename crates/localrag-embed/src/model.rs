//! Local XLM-RoBERTa (BGE-M3) sentence embedder running on candle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use localrag_core::config::expand_path;
use localrag_core::{EmbedError, Embedder, Embedding};

use crate::device::select_device;
use crate::pool::masked_mean_l2;

const MAX_TOKENS: usize = 256;
/// XLM-RoBERTa `<pad>` token id.
const PAD_ID: u32 = 1;

pub struct EmbeddingModel {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

impl EmbeddingModel {
    /// Load tokenizer, config and weights from `model_dir`.
    pub fn load(model_dir: &Path, model_name: &str, dim: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)?;
        let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(model = model_name, dim, "embedding model loaded");

        Ok(Self { model, tokenizer, device, dim, id: format!("local:{}:d{}", model_name, dim) })
    }

    /// `[1, MAX_TOKENS]` id and mask tensors; long inputs are cut, short ones padded.
    fn encode(&self, text: &str) -> Result<(Tensor, Tensor)> {
        let enc = self.tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        ids.resize(MAX_TOKENS, PAD_ID);
        mask.resize(MAX_TOKENS, 0);
        let ids = Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let mask = Tensor::new(mask.as_slice(), &self.device)?.unsqueeze(0)?;
        Ok((ids, mask))
    }

    fn forward(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = self.encode(text)?;
        let token_type_ids = Tensor::zeros((1, MAX_TOKENS), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1()?;
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            tracing::debug!(ms = elapsed.as_millis() as u64, "slow embedding");
        }
        Ok(emb)
    }
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> std::result::Result<Embedding, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        let v = self.forward(text).map_err(|e| EmbedError::BackendUnavailable(e.to_string()))?;
        if v.len() != self.dim {
            return Err(EmbedError::MalformedResponse(format!("model produced {} dims, expected {}", v.len(), self.dim)));
        }
        Ok(v)
    }
}

/// Locate the model directory: explicit setting first, then `APP_MODEL_DIR`,
/// `MODEL_DIR`, and finally `models/bge-m3` under the working directory.
pub fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = expand_path(dir);
        if p.exists() {
            return Ok(p);
        }
        return Err(anyhow!("configured model_dir {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() {
                tracing::debug!(var, dir = %p.display(), "model dir from env");
                return Ok(p);
            }
        }
    }
    let default = Path::new("models/bge-m3");
    if default.exists() {
        return Ok(default.to_path_buf());
    }
    Err(anyhow!("Could not locate embedding model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
