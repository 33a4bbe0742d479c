//! Embedding client
//!
//! Maps text onto fixed-dimension unit-norm vectors through an
//! HTTP embedding server. One client is built at start-up and shared
//! behind an `Arc`; concurrent encodes go through the same handle.

use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result, RESOURCE_EXHAUSTION_MARKERS};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Embedding dimension produced by the configured model family.
/// The vector index is created with this dimension and refuses to
/// operate against any other.
pub const EMBEDDING_DIM: usize = 768;

/// Trait for embedding backends. The batched form preserves input
/// order; inputs must be non-empty after trimming.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a unit-norm vector of [`EMBEDDING_DIM`]
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, one vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding client against an Ollama-style HTTP API
pub struct HttpEmbedder {
    client: reqwest::Client,
    config: EmbeddingConfig,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Create a new embedding client
    pub fn new(config: EmbeddingConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/api/{}", self.config.url.trim_end_matches('/'), endpoint)
    }

    async fn request_embeddings(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let request = EmbedRequest {
            model: self.config.model.clone(),
            input: texts,
        };

        let response = self
            .client
            .post(self.api_url("embed"))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let lowered = body.to_lowercase();
            if RESOURCE_EXHAUSTION_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
            {
                return Err(EmbeddingError::ResourceExhausted(body).into());
            }
            return Err(
                EmbeddingError::EncodeFailed(format!("server returned {status}: {body}")).into(),
            );
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::EncodeFailed(e.to_string()))?;

        if parsed.embeddings.len() != expected {
            return Err(EmbeddingError::EncodeFailed(format!(
                "expected {expected} embeddings, got {}",
                parsed.embeddings.len()
            ))
            .into());
        }

        parsed
            .embeddings
            .into_iter()
            .map(|mut vector| {
                if vector.len() != EMBEDDING_DIM {
                    return Err(EmbeddingError::InvalidDimension {
                        expected: EMBEDDING_DIM,
                        actual: vector.len(),
                    }
                    .into());
                }
                l2_normalize(&mut vector);
                Ok(vector)
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput.into());
        }

        let mut vectors = self.request_embeddings(vec![text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::EncodeFailed("empty response".to_string()).into())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput.into());
        }

        debug!("Embedding batch of {} texts", texts.len());
        self.request_embeddings(texts.to_vec()).await
    }
}

/// Scale a vector to unit L2 norm in place; zero vectors are left as-is
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < f32::EPSILON);
        assert!((v[1] - 0.8).abs() < f32::EPSILON);

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let embedder = HttpEmbedder::new(EmbeddingConfig::default());
        let err = embedder.embed("   ").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Embedding(EmbeddingError::EmptyInput)
        ));

        let err = embedder
            .embed_batch(&["ok".to_string(), " ".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ServiceError::Embedding(EmbeddingError::EmptyInput)
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let embedder = HttpEmbedder::new(EmbeddingConfig::default());
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }
}
