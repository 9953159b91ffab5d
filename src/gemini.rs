use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::assess::RiskRequester;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Gemini `generateContent` client used as the risk requester.
#[derive(Debug, Clone)]
pub struct GeminiRequester {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiRequester {
    /// Fails when the API key is empty.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            bail!("Gemini API key required");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("portrisk/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Point the client at a different base URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl RiskRequester for GeminiRequester {
    async fn request(&self, prompt: &str) -> Result<String> {
        log::debug!("[gemini] generate_content: model={} prompt_len={}", self.model, prompt.len());
        let body = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to send request to Gemini")?
            .error_for_status()
            .context("Gemini returned an error status")?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("failed to parse Gemini response")?;

        extract_text(parsed)
    }
}

fn extract_text(resp: GenerateResponse) -> Result<String> {
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .context("Gemini response has no candidates")?
        .content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    if text.trim().is_empty() {
        bail!("Gemini response has no text");
    }
    Ok(text)
}
