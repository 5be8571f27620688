//! Narrow boundaries to the external text-understanding capability.
//!
//! The engine never depends on transport details. Each trait is small enough
//! for a deterministic test double; `clausedb-llm` implements all four over an
//! HTTP chat-completions API, and `clausedb-engine` ships lexical versions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
  clause::Clause,
  field::FieldDescriptor,
  plan::PlanDraft,
  record::FieldProposal,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
  /// Transport failure, rate limiting or outage. Retryable.
  #[error("capability unavailable: {0}")]
  Unavailable(String),

  /// The call completed but produced nothing usable for this input.
  #[error("capability rejected the request: {0}")]
  Rejected(String),
}

impl CapabilityError {
  pub fn is_unavailable(&self) -> bool { matches!(self, Self::Unavailable(_)) }
}

/// Routing verdict proposed by a classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
  Hit,
  Miss,
  /// The classifier could not decide.
  Unsure,
}

/// What the capability found for one field in one clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
  Value(serde_json::Value),
  /// Explicit "not present" signal.
  Absent,
}

#[async_trait]
pub trait QueryClassifier: Send + Sync {
  async fn classify(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Verdict, CapabilityError>;
}

#[async_trait]
pub trait FieldNamer: Send + Sync {
  /// Propose the new field a query needs. `Ok(None)` means no confident name.
  async fn propose(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Option<FieldProposal>, CapabilityError>;
}

#[async_trait]
pub trait FieldExtractor: Send + Sync {
  async fn extract(
    &self,
    clause: &Clause,
    field: &FieldProposal,
  ) -> Result<Extracted, CapabilityError>;
}

#[async_trait]
pub trait QueryInterpreter: Send + Sync {
  /// Structure `query` over `fields`. `focus` names the fields routing or
  /// discovery already tied to the query.
  async fn interpret(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
    focus: &[String],
  ) -> Result<PlanDraft, CapabilityError>;
}
