//! The `SchemaRegistry` trait, the single owner of schema and field values.
//!
//! Implemented by storage backends (`MemoryRegistry` here, `SqliteRegistry` in
//! `clausedb-store-sqlite`). The engine depends on this abstraction only.
//!
//! Columns are append-only: a field, once added, is never removed or renamed
//! by query processing. Rows are fixed at ingestion time. Every successful
//! mutation is durable before the returned future resolves.

use std::{collections::BTreeMap, future::Future};

use serde::Serialize;

use crate::{
  Error, Result,
  clause::{Clause, ClauseId},
  field::{FieldDescriptor, FieldValue},
};

/// Upsert batch for [`SchemaRegistry::set_values`].
pub type ValueMap = BTreeMap<ClauseId, FieldValue>;

/// A clause together with its non-null field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
  pub clause: Clause,
  pub values: BTreeMap<String, FieldValue>,
}

impl Row {
  pub fn value(&self, field: &str) -> Option<&FieldValue> { self.values.get(field) }
}

pub trait SchemaRegistry: Send + Sync {
  /// All registered fields, in registration order.
  fn list_fields(
    &self,
  ) -> impl Future<Output = Result<Vec<FieldDescriptor>>> + Send + '_;

  fn has_field<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<bool>> + Send + 'a;

  /// Register a new field.
  ///
  /// Fails with `DuplicateField` if the name is taken and `InvalidParent` if
  /// the named parent is not already registered.
  fn add_field(
    &self,
    descriptor: FieldDescriptor,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Register a new field and upsert its values in one atomic step.
  ///
  /// Same failure modes as [`add_field`](Self::add_field) and
  /// [`set_values`](Self::set_values); on failure nothing is applied.
  /// Returns the number of values written.
  fn add_field_with_values(
    &self,
    descriptor: FieldDescriptor,
    values: ValueMap,
  ) -> impl Future<Output = Result<usize>> + Send + '_;

  fn get_value<'a>(
    &'a self,
    clause_id: &'a ClauseId,
    field: &'a str,
  ) -> impl Future<Output = Result<Option<FieldValue>>> + Send + 'a;

  /// Upsert values for an already-registered field.
  ///
  /// Fails with `UnknownField` if the field is not registered and
  /// `UnknownClause` if any id is not ingested; on failure nothing is
  /// applied. Returns the number of values written.
  fn set_values<'a>(
    &'a self,
    field: &'a str,
    values: ValueMap,
  ) -> impl Future<Output = Result<usize>> + Send + 'a;

  /// All clauses, in ingestion order.
  fn clauses(&self) -> impl Future<Output = Result<Vec<Clause>>> + Send + '_;

  /// A consistent snapshot of every row, in ingestion order.
  fn rows(&self) -> impl Future<Output = Result<Vec<Row>>> + Send + '_;

  /// Administrative reset: drop every field and value and replace the clause
  /// set. Never called by query processing.
  fn reset(
    &self,
    clauses: Vec<Clause>,
  ) -> impl Future<Output = Result<()>> + Send + '_;
}

// ─── Shared contract checks ──────────────────────────────────────────────────

/// Validate `descriptor` against the currently registered `fields`.
///
/// Backends call this inside their write path so every implementation
/// enforces the same contract.
pub fn check_new_field(fields: &[FieldDescriptor], descriptor: &FieldDescriptor) -> Result<()> {
  if crate::field::RESERVED_NAMES.contains(&descriptor.name.as_str())
    || fields.iter().any(|f| f.name == descriptor.name)
  {
    return Err(Error::DuplicateField(descriptor.name.clone()));
  }
  if let Some(parent) = &descriptor.parent
    && !fields.iter().any(|f| &f.name == parent)
  {
    return Err(Error::InvalidParent {
      field:  descriptor.name.clone(),
      parent: parent.clone(),
    });
  }
  Ok(())
}

/// Convert every value to the declared type of `descriptor`.
pub fn conform_values(descriptor: &FieldDescriptor, values: ValueMap) -> Result<ValueMap> {
  values
    .into_iter()
    .map(|(id, v)| match v.convert(descriptor.field_type) {
      Some(converted) => Ok((id, converted)),
      None => Err(Error::Coercion { value: v.to_string(), expected: descriptor.field_type }),
    })
    .collect()
}
