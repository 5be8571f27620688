//! Error types for `clausedb-core`.
//!
//! The variants mirror the failure taxonomy of the query pipeline. Registry
//! contract violations (`DuplicateField`, `InvalidParent`, `UnknownField`)
//! always indicate a logic defect in the caller and are never retried.

use thiserror::Error;

use crate::{clause::ClauseId, field::FieldType};

#[derive(Debug, Error)]
pub enum Error {
  /// The router could not decide between HIT and MISS.
  #[error("routing is ambiguous for query {0:?}")]
  RoutingAmbiguity(String),

  /// Field discovery could not name a field with enough confidence.
  #[error("could not resolve a field for query {0:?}")]
  UnresolvedField(String),

  /// The extraction capability was unavailable for the batch. Retryable.
  #[error("extraction capability failed for field {field:?}: {reason}")]
  ExtractionCapabilityFailure { field: String, reason: String },

  /// A single value could not be coerced to the field's type.
  #[error("cannot coerce {value:?} to {expected}")]
  Coercion { value: String, expected: FieldType },

  #[error("field already registered: {0}")]
  DuplicateField(String),

  #[error("field {field:?} names parent {parent:?}, which is not registered")]
  InvalidParent { field: String, parent: String },

  #[error("unknown field: {0}")]
  UnknownField(String),

  #[error("unknown clause: {0}")]
  UnknownClause(ClauseId),

  /// The compiler referenced a field the registry does not hold.
  #[error("schema inconsistency: {0}")]
  SchemaInconsistency(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether the triggering request may be retried as-is.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::ExtractionCapabilityFailure { .. })
  }

  /// Whether the error is a registry contract violation.
  pub fn is_contract_violation(&self) -> bool {
    matches!(
      self,
      Self::DuplicateField(_) | Self::InvalidParent { .. } | Self::UnknownField(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
