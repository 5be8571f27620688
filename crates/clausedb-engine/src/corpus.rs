//! Corpus loading.
//!
//! The corpus is JSON Lines, one object per clause with the text under a
//! `provision` key. Blank lines are skipped; duplicate texts collapse to one
//! clause since clause ids are content hashes.

use std::{collections::HashSet, path::Path};

use clausedb_core::clause::Clause;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct CorpusLine {
  provision: String,
}

/// Parse JSON Lines text into at most `limit` distinct clauses.
pub fn parse_corpus(path: &str, text: &str, limit: Option<usize>) -> Result<Vec<Clause>> {
  let mut seen = HashSet::new();
  let mut clauses = Vec::new();

  for (index, line) in text.lines().enumerate() {
    if limit.is_some_and(|limit| clauses.len() >= limit) {
      break;
    }
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let parsed: CorpusLine = serde_json::from_str(line).map_err(|e| Error::Corpus {
      path:   path.to_owned(),
      line:   index + 1,
      reason: e.to_string(),
    })?;
    if parsed.provision.trim().is_empty() {
      debug!(line = index + 1, "skipping empty provision");
      continue;
    }
    let clause = Clause::new(parsed.provision);
    if seen.insert(clause.clause_id.clone()) {
      clauses.push(clause);
    }
  }

  Ok(clauses)
}

/// Read and parse a corpus file.
pub async fn load_corpus(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Vec<Clause>> {
  let path = path.as_ref().display().to_string();
  let text = tokio::fs::read_to_string(&path)
    .await
    .map_err(|source| Error::Io { path: path.clone(), source })?;
  let clauses = parse_corpus(&path, &text, limit)?;
  info!(%path, clauses = clauses.len(), "loaded corpus");
  Ok(clauses)
}
