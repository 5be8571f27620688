//! Transient records passed between discovery, extraction and merge.
//!
//! None of these are persisted: a [`FieldProposal`] lives for one discovery,
//! an [`ExtractionRecord`] batch is consumed exactly once by the merge engine.

use serde::{Deserialize, Serialize};

use crate::{
  clause::ClauseId,
  field::{FieldType, FieldValue},
};

/// The resolver's answer to "which new field does this query need?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProposal {
  /// Sanitised, schema-safe name.
  pub name:        String,
  /// Existing field whose non-null clauses scope extraction.
  pub parent:      Option<String>,
  /// Expected type, when the name or the capability suggests one.
  pub type_hint:   Option<FieldType>,
  pub description: Option<String>,
}

impl FieldProposal {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), parent: None, type_hint: None, description: None }
  }

  pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
    self.parent = Some(parent.into());
    self
  }

  pub fn with_type_hint(mut self, hint: FieldType) -> Self {
    self.type_hint = Some(hint);
    self
  }
}

/// Outcome of extracting one field from one clause.
///
/// `valid == false` always comes with `value == None`: the capability said
/// "not present", the call failed for this clause, or coercion rejected the
/// value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionRecord {
  pub clause_id: ClauseId,
  pub field:     String,
  pub value:     Option<FieldValue>,
  pub valid:     bool,
}

impl ExtractionRecord {
  pub fn valid(clause_id: ClauseId, field: impl Into<String>, value: FieldValue) -> Self {
    Self { clause_id, field: field.into(), value: Some(value), valid: true }
  }

  pub fn invalid(clause_id: ClauseId, field: impl Into<String>) -> Self {
    Self { clause_id, field: field.into(), value: None, valid: false }
  }
}

/// Result of merging one extraction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
  pub field:          String,
  pub field_added:    bool,
  pub values_written: usize,
}
