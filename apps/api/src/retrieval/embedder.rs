use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const HTTP_BATCH_SIZE: usize = 64;

#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("failed to load embedding model: {0}")]
    ModelLoadFailed(String),

    #[error("embedding inference failed: {0}")]
    InferenceFailed(String),
}

/// Turns text into vectors. Implementations must return one vector per input,
/// in input order, all of the same length.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("no vector returned".to_string()))
    }

    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama,
/// text-embeddings-inference, ...).
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, model: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    async fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbedderError::ApiRequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::ApiRequestFailed(format!("status {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;

        order_embeddings(parsed.data, texts.len())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(HTTP_BATCH_SIZE) {
            vectors.extend(self.embed_chunk(chunk).await?);
        }
        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Puts API results back into input order and checks nothing is missing.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    if data.len() != expected {
        return Err(EmbedderError::InvalidResponse(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    if data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(EmbedderError::InvalidResponse(
            "embedding indices are not contiguous".to_string(),
        ));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_embeddings_sorts_by_index() {
        let data = vec![
            EmbeddingData {
                embedding: vec![2.0],
                index: 1,
            },
            EmbeddingData {
                embedding: vec![1.0],
                index: 0,
            },
        ];
        assert_eq!(order_embeddings(data, 2).unwrap(), vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_embeddings_rejects_count_mismatch() {
        let data = vec![EmbeddingData {
            embedding: vec![1.0],
            index: 0,
        }];
        assert!(order_embeddings(data, 2).is_err());
    }

    #[test]
    fn test_embedding_response_parses_openai_shape() {
        let body = r#"{"object":"list","data":[{"object":"embedding","embedding":[0.1,0.2],"index":0}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, 0.2]);
    }
}
