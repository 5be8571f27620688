//! Clauses, each an immutable unit of legal source text.
//!
//! Clauses are fixed at ingestion time. Query processing never mutates or
//! deletes them; every derived attribute lives in the registry as a field
//! value keyed by [`ClauseId`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable clause identifier: the first 16 hex characters of the SHA-256 of the
/// trimmed clause text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClauseId(String);

impl ClauseId {
  pub fn for_text(text: &str) -> Self {
    let digest = Sha256::digest(text.trim().as_bytes());
    Self(hex::encode(&digest[..8]))
  }

  /// Wrap an id read back from storage.
  pub fn from_raw(raw: impl Into<String>) -> Self { Self(raw.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ClauseId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
  pub clause_id: ClauseId,
  pub text:      String,
}

impl Clause {
  pub fn new(text: impl Into<String>) -> Self {
    let text = text.into().trim().to_owned();
    Self { clause_id: ClauseId::for_text(&text), text }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_is_stable_and_ignores_surrounding_whitespace() {
    let a = Clause::new("The fee shall be $500.");
    let b = Clause::new("  The fee shall be $500.\n");
    assert_eq!(a.clause_id, b.clause_id);
    assert_eq!(a.clause_id.as_str().len(), 16);
    assert_eq!(b.text, "The fee shall be $500.");
  }

  #[test]
  fn different_text_gives_different_id() {
    assert_ne!(ClauseId::for_text("a"), ClauseId::for_text("b"));
  }
}
