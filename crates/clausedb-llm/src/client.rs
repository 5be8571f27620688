//! Minimal chat-completions client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, LlmConfig, Result, prompt::Prompt};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
  model:           &'a str,
  messages:        [Message<'a>; 2],
  temperature:     f32,
  response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
  role:    &'static str,
  content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")]
  kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
  choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
  message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
  content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct OpenAiClient {
  http_client: reqwest::Client,
  api_key:     String,
  base_url:    String,
  model:       String,
}

impl OpenAiClient {
  pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
    let http_client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| Error::Config(e.to_string()))?;
    Ok(Self {
      http_client,
      api_key: api_key.into(),
      base_url: config.base_url.trim_end_matches('/').to_owned(),
      model: config.model.clone(),
    })
  }

  /// Build a client with the key read from `config.api_key_env`.
  pub fn from_config(config: &LlmConfig) -> Result<Self> {
    let api_key = config.api_key()?;
    Self::new(config, api_key)
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into().trim_end_matches('/').to_owned();
    self
  }

  pub fn model(&self) -> &str { &self.model }

  /// Send `prompt` in JSON mode and return the raw message content.
  pub(crate) async fn complete_json(&self, prompt: &Prompt) -> Result<String> {
    let request = ChatRequest {
      model:           &self.model,
      messages:        [
        Message { role: "system", content: prompt.system },
        Message { role: "user", content: &prompt.user },
      ],
      temperature:     0.0,
      response_format: ResponseFormat { kind: "json_object" },
    };

    let response = self
      .http_client
      .post(format!("{}/chat/completions", self.base_url))
      .bearer_auth(&self.api_key)
      .json(&request)
      .send()
      .await
      .map_err(|e| Error::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(Error::Status { status: status.as_u16(), body });
    }

    let chat: ChatResponse = response
      .json()
      .await
      .map_err(|e| Error::Parse(e.to_string()))?;
    let content = chat
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| Error::Parse("response has no message content".into()))?;
    debug!(model = %self.model, %content, "chat completion");
    Ok(content)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_normalises_base_url() {
    let config = LlmConfig { base_url: "http://localhost:9000/v1/".into(), ..LlmConfig::default() };
    let client = OpenAiClient::new(&config, "test-key").unwrap();
    assert_eq!(client.base_url, "http://localhost:9000/v1");
    assert_eq!(client.model(), "gpt-4o-mini");
    let client = client.with_base_url("http://proxy/");
    assert_eq!(client.base_url, "http://proxy");
  }

  #[test]
  fn missing_key_is_a_config_error() {
    let config = LlmConfig {
      api_key_env: "CLAUSEDB_TEST_KEY_THAT_IS_NEVER_SET".into(),
      ..LlmConfig::default()
    };
    assert!(matches!(OpenAiClient::from_config(&config), Err(Error::Config(_))));
  }
}
