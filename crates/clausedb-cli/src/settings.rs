//! Runtime settings, layered from `clausedb.toml` and `CLAUSEDB__*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clausedb_engine::ExtractionConfig;
use clausedb_llm::LlmConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite database file. `~/` is expanded.
  pub store_path:   PathBuf,
  /// JSONL corpus read by `rebuild`.
  pub corpus_path:  PathBuf,
  /// Ingest at most this many clauses.
  pub clause_limit: Option<usize>,
  /// Fields extracted eagerly on rebuild.
  pub base_fields:  Vec<String>,
  pub extraction:   ExtractionConfig,
  pub llm:          LlmConfig,
  pub host:         String,
  pub port:         u16,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:   PathBuf::from("clausedb.sqlite"),
      corpus_path:  PathBuf::from("clauses.jsonl"),
      clause_limit: None,
      base_fields:  vec!["company".into()],
      extraction:   ExtractionConfig::default(),
      llm:          LlmConfig::default(),
      host:         "127.0.0.1".into(),
      port:         8080,
    }
  }
}

impl Settings {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `CLAUSEDB__LLM__ENABLED=true`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("CLAUSEDB").separator("__"))
      .build()
      .context("failed to read config file")?;
    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.store_path = expand_tilde(&settings.store_path);
    settings.corpus_path = expand_tilde(&settings.corpus_path);
    Ok(settings)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
