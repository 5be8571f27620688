//! Model endpoint settings.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
  /// When false the engine runs on its lexical capabilities only.
  pub enabled:      bool,
  /// Base URL of an OpenAI-compatible API, without `/chat/completions`.
  pub base_url:     String,
  pub model:        String,
  /// Environment variable holding the API key.
  pub api_key_env:  String,
  pub timeout_secs: u64,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      enabled:      false,
      base_url:     "https://api.openai.com/v1".into(),
      model:        "gpt-4o-mini".into(),
      api_key_env:  "OPENAI_API_KEY".into(),
      timeout_secs: 30,
    }
  }
}

impl LlmConfig {
  /// Read the API key from the configured environment variable.
  pub fn api_key(&self) -> Result<String> {
    std::env::var(&self.api_key_env)
      .map_err(|_| Error::Config(format!("{} is not set", self.api_key_env)))
  }
}
