
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::GenerativeBackend;
use crate::config::{GenerationConfig, OllamaConfig};
use crate::retry::RetryPolicy;
use crate::{DocqaError, Result};

/// Generative backend speaking the Ollama HTTP API.
///
/// Generation requests run under the shared retry policy with the
/// configured timeout. The health probe uses a separate short-timeout
/// agent so an unresponsive server is detected quickly instead of eating
/// the full generation timeout.
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    temperature: f32,
    max_tokens: u32,
    agent: ureq::Agent,
    probe_agent: ureq::Agent,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(
        ollama: &OllamaConfig,
        generation: &GenerationConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let base_url = ollama
            .base_url()
            .map_err(|e| DocqaError::Config(e.to_string()))?;

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(generation.timeout_secs)))
            .build()
            .into();
        let probe_agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(generation.probe_timeout_secs)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: generation.model.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            agent,
            probe_agent,
            retry,
        })
    }
}

impl GenerativeBackend for OllamaGenerator {
    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }

    #[inline]
    fn health_check(&self) -> bool {
        let Ok(url) = self.base_url.join("/api/tags") else {
            return false;
        };

        debug!("probing generative backend at {}", url);

        match self
            .probe_agent
            .get(url.as_str())
            .call()
            .and_then(|mut resp| resp.body_mut().read_to_string())
        {
            Ok(_) => true,
            Err(e) => {
                warn!("generative backend probe failed: {}", e);
                false
            }
        }
    }

    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| DocqaError::Other(anyhow::anyhow!("serialize generate request: {}", e)))?;

        let url = self
            .base_url
            .join("/api/generate")
            .map_err(|e| DocqaError::Config(format!("Failed to build generate URL: {}", e)))?;

        debug!(
            "generation request to {} (prompt {} chars)",
            url,
            prompt.chars().count()
        );

        let response_text = self.retry.execute("generation request", || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: GenerateResponse = serde_json::from_str(&response_text)
            .map_err(|e| DocqaError::BackendUnavailable(format!("bad generate response: {}", e)))?;

        Ok(response.response)
    }
}
