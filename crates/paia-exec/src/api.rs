//! Direct Messages API strategy.
//!
//! Re-sends the whole conversation as alternating user/assistant messages in
//! one blocking POST. Auth goes in the `x-api-key` header alongside the
//! required `anthropic-version` header. No streaming, no retry.

use std::time::Duration;

use paia_core::ApiConfig;
use paia_core::Exchange;
use paia_core::ROLE_ASSISTANT;
use paia_core::ROLE_USER;
use reqwest::blocking::Client;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::error;

use crate::contracts::AdapterError;
use crate::contracts::AssistantAdapter;
use crate::prompt::SYSTEM_PROMPT;

pub struct DirectApiAdapter {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    api_version: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl DirectApiAdapter {
    /// `api_key` is resolved by the caller; `None` makes every invoke fail
    /// with `MissingCredential` before any request is built.
    pub fn new(config: &ApiConfig, api_key: Option<String>) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(config.request_timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|err| AdapterError::Transport {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self::with_client(config, api_key, client))
    }

    pub fn with_client(config: &ApiConfig, api_key: Option<String>, client: Client) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_version: config.api_version.clone(),
            api_key_env: config.api_key_env.clone(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        }
    }

    /// Reads the key from the environment variable named in `config`.
    pub fn from_env(config: &ApiConfig) -> Result<Self, AdapterError> {
        Self::new(config, std::env::var(&config.api_key_env).ok())
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn build_request_body(&self, outbound: &str, prior: &[Exchange]) -> Value {
        let mut messages = Vec::with_capacity(prior.len() * 2 + 1);
        for exchange in prior {
            messages.push(json!({ "role": ROLE_USER, "content": exchange.input }));
            messages.push(json!({ "role": ROLE_ASSISTANT, "content": exchange.output }));
        }
        messages.push(json!({ "role": ROLE_USER, "content": outbound }));

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
            "system": SYSTEM_PROMPT,
        })
    }
}

/// Text of the first content block, or `InvalidResponse`.
pub fn parse_response(body: &str) -> Result<String, AdapterError> {
    let value: Value = serde_json::from_str(body).map_err(|err| AdapterError::InvalidResponse {
        message: format!("response is not JSON: {err}"),
    })?;
    value["content"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AdapterError::InvalidResponse {
            message: match value["error"]["message"].as_str() {
                Some(message) => format!("no content in response: {message}"),
                None => "no content in response".to_string(),
            },
        })
}

impl AssistantAdapter for DirectApiAdapter {
    fn name(&self) -> &'static str {
        "direct_api"
    }

    fn invoke(&self, outbound: &str, prior: &[Exchange]) -> Result<String, AdapterError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AdapterError::MissingCredential {
                variable: self.api_key_env.clone(),
            });
        };

        let body = self.build_request_body(outbound, prior);
        let url = format!("{}/messages", self.base_url);
        debug!(
            model = self.model.as_str(),
            url = url.as_str(),
            messages = prior.len() * 2 + 1,
            "Sending messages request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|err| AdapterError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        let text = response.text().map_err(|err| AdapterError::Transport {
            message: format!("failed to read response body: {err}"),
        })?;
        if !status.is_success() {
            error!(%status, "Messages API returned an error status");
        }

        parse_response(&text)
    }
}
