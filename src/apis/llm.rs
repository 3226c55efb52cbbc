//! Generic LLM completion client for the sentiment source
//!
//! Speaks the common chat-completions shape: `POST {model, messages}`
//! returning `choices[0].message.content`. The caller decides what to
//! do with missing credentials; this module only reports them.

use crate::config::with_config;
use crate::errors::SwarmBotError;
use serde_json::{json, Value};
use std::time::Duration;

pub struct LlmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn from_config() -> Self {
        let (api_url, api_key, model, timeout_secs) = with_config(|cfg| {
            (
                cfg.sentiment.api_url.clone(),
                cfg.sentiment.api_key.clone(),
                cfg.sentiment.model.clone(),
                cfg.sentiment.request_timeout_secs,
            )
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            api_url,
            api_key,
            model,
        }
    }

    /// Whether credentials are configured at all
    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Send a prompt, returning the raw completion text
    pub async fn complete(&self, prompt: &str) -> Result<String, SwarmBotError> {
        if !self.has_credentials() {
            return Err(SwarmBotError::validation("no sentiment API key configured"));
        }

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| SwarmBotError::transient(format!("LLM body read failed: {}", e)))?;

        if !(200..300).contains(&status) {
            return Err(SwarmBotError::Exchange { status, body: text });
        }

        let value: Value = serde_json::from_str(&text)?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| SwarmBotError::MalformedResponse {
                endpoint: "llm".to_string(),
                message: "missing choices[0].message.content".to_string(),
            })
    }
}
