//! Error types for `clausedb-engine`.

use clausedb_core::log::{ProcessingLog, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] clausedb_core::Error),

  #[error("failed to read corpus {path}: {source}")]
  Io {
    path:   String,
    #[source]
    source: std::io::Error,
  },

  #[error("corpus {path} line {line}: {reason}")]
  Corpus { path: String, line: usize, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A query that stopped at `stage`.
///
/// Carries the processing log up to and including the failing stage, so the
/// caller can show how far the request got.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct QueryFailure {
  pub stage:  Stage,
  /// The field under discovery when the failure happened.
  pub field:  Option<String>,
  #[source]
  pub source: clausedb_core::Error,
  pub log:    ProcessingLog,
}

impl QueryFailure {
  pub fn is_retryable(&self) -> bool { self.source.is_retryable() }
}
