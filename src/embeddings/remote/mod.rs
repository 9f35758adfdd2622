#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{Embedding, EmbeddingProvider, preprocess};
use crate::config::{EmbeddingConfig, OllamaConfig};
use crate::retry::RetryPolicy;
use crate::{DocqaError, Result};

/// Embedding backend speaking the Ollama HTTP API.
///
/// Declares a fixed model and dimension; every response vector is checked
/// against the declared dimension before it is accepted.
#[derive(Debug, Clone)]
pub struct RemoteEmbeddingProvider {
    base_url: Url,
    model: String,
    dimension: usize,
    batch_size: usize,
    agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest {
    model: String,
    #[serde(rename = "input")]
    inputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl RemoteEmbeddingProvider {
    #[inline]
    pub fn new(
        ollama: &OllamaConfig,
        embedding: &EmbeddingConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let base_url = ollama
            .base_url()
            .map_err(|e| DocqaError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(embedding.timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: embedding.model.clone(),
            dimension: embedding.dimension,
            batch_size: embedding.batch_size.max(1),
            agent,
            retry,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    /// Check that the embedding server is reachable.
    #[inline]
    pub fn ping(&self) -> Result<()> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| DocqaError::Config(format!("Failed to build ping URL: {}", e)))?;

        debug!("pinging embedding server at {}", url);

        self.retry.execute("embedding server ping", || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        Ok(())
    }

    fn embed_url(&self) -> Result<Url> {
        self.base_url
            .join("/api/embed")
            .map_err(|e| DocqaError::Config(format!("Failed to build embedding URL: {}", e)))
    }

    /// Request a single embedding and validate its dimension.
    fn request_one(&self, processed: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: processed.to_string(),
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| DocqaError::Other(anyhow::anyhow!("serialize embed request: {}", e)))?;
        let url = self.embed_url()?;

        let response_text = self.retry.execute("embedding request", || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocqaError::BackendUnavailable(format!("bad embedding response: {}", e)))?;

        self.check_dimension(&response.embedding)?;
        Ok(response.embedding)
    }

    /// Request embeddings for several texts at once.
    fn request_batch(&self, processed: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            model: self.model.clone(),
            inputs: processed.to_vec(),
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| DocqaError::Other(anyhow::anyhow!("serialize batch request: {}", e)))?;
        let url = self.embed_url()?;

        let response_text = self.retry.execute("batch embedding request", || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: BatchEmbedResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocqaError::BackendUnavailable(format!("bad batch response: {}", e)))?;

        if response.embeddings.len() != processed.len() {
            return Err(DocqaError::BackendUnavailable(format!(
                "batch embedding count mismatch: sent {}, received {}",
                processed.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(DocqaError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Embed one batch, mapping per-item problems to degraded markers so a
    /// bad item never takes its neighbors down with it.
    fn embed_batch(&self, batch: &[String]) -> Vec<Embedding> {
        let mut results: Vec<Embedding> = batch
            .iter()
            .map(|_| Embedding::degraded(self.dimension, &self.model))
            .collect();

        let processed: Vec<(usize, String)> = batch
            .iter()
            .enumerate()
            .map(|(i, text)| (i, preprocess(text)))
            .filter(|(_, p)| !p.is_empty())
            .collect();

        if processed.is_empty() {
            return results;
        }

        if processed.len() == 1 {
            let (index, text) = &processed[0];
            match self.request_one(text) {
                Ok(vector) => results[*index] = Embedding::new(vector, &self.model),
                Err(e) => warn!("embedding failed for item {}: {}", index, e),
            }
            return results;
        }

        let texts: Vec<String> = processed.iter().map(|(_, p)| p.clone()).collect();
        match self.request_batch(&texts) {
            Ok(vectors) => {
                for ((index, _), vector) in processed.iter().zip(vectors) {
                    if vector.len() == self.dimension {
                        results[*index] = Embedding::new(vector, &self.model);
                    } else {
                        warn!(
                            "dropping embedding for item {}: dimension {} != {}",
                            index,
                            vector.len(),
                            self.dimension
                        );
                    }
                }
            }
            Err(e) => warn!("batch embedding failed, degrading {} items: {}", batch.len(), e),
        }

        results
    }
}

impl EmbeddingProvider for RemoteEmbeddingProvider {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let processed = preprocess(text);
        if processed.is_empty() {
            return Err(DocqaError::EmptyInput);
        }

        debug!("embedding text ({} chars)", processed.chars().count());
        self.request_one(&processed)
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Vec<Embedding> {
        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            results.extend(self.embed_batch(batch));
        }

        debug!(
            "embedded {} texts, {} degraded",
            results.len(),
            results.iter().filter(|e| e.degraded).count()
        );

        results
    }
}
