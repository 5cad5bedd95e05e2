//! Answer generation providers.
//!
//! The Gemini provider calls the `generateContent` REST endpoint with the
//! configured model and sampling parameters. The API key comes from the
//! `GEMINI_API_KEY` environment variable, never from the config file.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use mirqab_core::rag::pipeline::{GenerationParams, Generator};

use crate::config::GenerationConfig;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiGenerator {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .context("GEMINI_API_KEY environment variable not set")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            model: config.model.clone(),
            api_key,
        })
    }

    /// Cheap reachability probe used by the health endpoint: asks the API
    /// for the model's metadata without generating anything.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/{}", GEMINI_API_BASE, self.model);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": params.temperature,
                "maxOutputTokens": params.max_output_tokens,
                "topP": 0.95,
                "topK": 40,
            }
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, text);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let answer = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Gemini response contained no candidate text"))?;

        Ok(answer.to_string())
    }
}

/// Stand-in provider used when generation is disabled in config. Every
/// call fails, which the pipeline degrades to its fixed apologetic
/// answer.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        bail!("generation provider is disabled")
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    if config.is_enabled() {
        Ok(Arc::new(GeminiGenerator::new(config)?))
    } else {
        Ok(Arc::new(DisabledGenerator))
    }
}
