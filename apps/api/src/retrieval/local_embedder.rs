use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::retrieval::embedder::{Embedder, EmbedderError};

/// Texts per forward pass. Bounds peak memory on long resumes.
const BATCH_SIZE: usize = 32;

/// Sentence-transformer embeddings computed in-process with candle.
///
/// Loads a BERT-family checkpoint from the Hugging Face hub (cached under
/// `HF_HOME` after the first run), mean-pools the token states over the
/// attention mask and L2-normalizes, as sentence-transformers does.
pub struct LocalBertEmbedder {
    encoder: Arc<BertEncoder>,
    model_id: String,
}

struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl LocalBertEmbedder {
    /// Downloads (or reads from cache) and loads `model_id`. Blocking; call it
    /// from `spawn_blocking` inside the runtime.
    pub fn new(model_id: &str) -> Result<Self, EmbedderError> {
        let device = Device::Cpu;
        info!(model = model_id, "Loading local embedding model");

        let api = Api::new().map_err(|e| EmbedderError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("config.json: {e}")))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer.json: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model.safetensors: {e}")))?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("read config: {e}")))?;
        let config: BertConfig = serde_json::from_str(&config_contents)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("parse config: {e}")))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("tokenizer: {e}")))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: config.max_position_embeddings,
                ..Default::default()
            }))
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("truncation config: {e}")))?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| EmbedderError::ModelLoadFailed(format!("weights: {e}")))?
        };
        let model = BertModel::load(vb, &config)
            .map_err(|e| EmbedderError::ModelLoadFailed(format!("model: {e}")))?;

        info!(model = model_id, "Local embedding model loaded");

        Ok(Self {
            encoder: Arc::new(BertEncoder {
                model,
                tokenizer,
                device,
            }),
            model_id: model_id.to_string(),
        })
    }
}

impl BertEncoder {
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| EmbedderError::InferenceFailed(format!("tokenization: {e}")))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut type_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let pad_len = max_len - encoding.get_ids().len();

            input_ids.extend_from_slice(encoding.get_ids());
            input_ids.extend(std::iter::repeat_n(0u32, pad_len));

            type_ids.extend_from_slice(encoding.get_type_ids());
            type_ids.extend(std::iter::repeat_n(0u32, pad_len));

            attention.extend_from_slice(encoding.get_attention_mask());
            attention.extend(std::iter::repeat_n(0u32, pad_len));
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(input_ids, shape, &self.device).map_err(inference)?;
        let type_ids = Tensor::from_vec(type_ids, shape, &self.device).map_err(inference)?;
        let attention = Tensor::from_vec(attention, shape, &self.device).map_err(inference)?;

        let hidden = self
            .model
            .forward(&input_ids, &type_ids, Some(&attention))
            .and_then(|t| t.to_dtype(DType::F32))
            .map_err(inference)?;

        let pooled = mean_pool(&hidden, &attention).map_err(inference)?;
        let mut vectors: Vec<Vec<f32>> = pooled.to_vec2().map_err(inference)?;
        vectors.iter_mut().for_each(|v| l2_normalize(v));
        Ok(vectors)
    }
}

fn inference(e: candle_core::Error) -> EmbedderError {
    EmbedderError::InferenceFailed(e.to_string())
}

/// Averages `hidden` (batch, seq, dim) over the positions where `mask` is set.
fn mean_pool(hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = mask.to_dtype(DType::F32)?;
    let summed = hidden.broadcast_mul(&mask.unsqueeze(2)?)?.sum(1)?;
    let counts = mask.sum(1)?.unsqueeze(1)?;
    summed.broadcast_div(&counts)
}

fn l2_normalize(v: &mut [f32]) {
    let length: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if length > 0.0 {
        v.iter_mut().for_each(|x| *x /= length);
    }
}

#[async_trait]
impl Embedder for LocalBertEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(BATCH_SIZE) {
            let owned: Vec<String> = batch.iter().map(|t| t.to_string()).collect();
            let encoder = Arc::clone(&self.encoder);
            // candle inference is CPU-bound
            let embedded = tokio::task::spawn_blocking(move || encoder.encode(&owned))
                .await
                .map_err(|e| EmbedderError::InferenceFailed(e.to_string()))??;
            vectors.extend(embedded);
        }

        debug!("Embedded {} texts with {}", texts.len(), self.model_id);
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pool_ignores_padding() {
        // one text, three positions, the last one padding
        let hidden = Tensor::new(&[[[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]]], &Device::Cpu).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &Device::Cpu).unwrap();

        let pooled: Vec<Vec<f32>> = mean_pool(&hidden, &mask).unwrap().to_vec2().unwrap();

        assert_eq!(pooled, vec![vec![2.0, 3.0]]);
    }

    #[test]
    fn test_mean_pool_keeps_batch_rows_apart() {
        let hidden = Tensor::new(
            &[[[2.0f32, 0.0], [0.0, 0.0]], [[1.0, 1.0], [3.0, 3.0]]],
            &Device::Cpu,
        )
        .unwrap();
        let mask = Tensor::new(&[[1u32, 0], [1, 1]], &Device::Cpu).unwrap();

        let pooled: Vec<Vec<f32>> = mean_pool(&hidden, &mask).unwrap().to_vec2().unwrap();

        assert_eq!(pooled, vec![vec![2.0, 0.0], vec![2.0, 2.0]]);
    }

    #[test]
    fn test_l2_normalize_unit_length_and_zero_safe() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
