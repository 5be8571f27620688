//! In-process [`SchemaRegistry`] backed by plain collections.
//!
//! Used by tests, by the self-test battery and anywhere a scratch registry is
//! needed. Each mutation takes the write lock once, so it is atomic with
//! respect to every other call.

use std::{
  collections::{BTreeMap, HashMap},
  sync::{PoisonError, RwLock},
};

use crate::{
  Error, Result,
  clause::{Clause, ClauseId},
  field::{FieldDescriptor, FieldValue},
  registry::{Row, SchemaRegistry, ValueMap, check_new_field, conform_values},
};

#[derive(Default)]
struct State {
  fields:  Vec<FieldDescriptor>,
  clauses: Vec<Clause>,
  /// Clause id → position in `clauses`.
  index:   HashMap<ClauseId, usize>,
  /// Field name → clause id → value.
  values:  HashMap<String, BTreeMap<ClauseId, FieldValue>>,
}

impl State {
  fn descriptor(&self, name: &str) -> Result<&FieldDescriptor> {
    self
      .fields
      .iter()
      .find(|f| f.name == name)
      .ok_or_else(|| Error::UnknownField(name.to_owned()))
  }

  fn check_clauses(&self, values: &ValueMap) -> Result<()> {
    match values.keys().find(|id| !self.index.contains_key(*id)) {
      Some(id) => Err(Error::UnknownClause(id.clone())),
      None => Ok(()),
    }
  }

  fn upsert(&mut self, field: &str, values: ValueMap) -> usize {
    let written = values.len();
    self.values.entry(field.to_owned()).or_default().extend(values);
    written
  }
}

#[derive(Default)]
pub struct MemoryRegistry {
  state: RwLock<State>,
}

impl MemoryRegistry {
  pub fn new() -> Self { Self::default() }

  /// A registry pre-loaded with `clauses` and no fields.
  pub fn with_clauses(clauses: Vec<Clause>) -> Self {
    let registry = Self::new();
    registry.replace(clauses);
    registry
  }

  fn replace(&self, clauses: Vec<Clause>) {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    *state = State::default();
    for clause in clauses {
      if state.index.contains_key(&clause.clause_id) {
        continue;
      }
      let position = state.clauses.len();
      state.index.insert(clause.clause_id.clone(), position);
      state.clauses.push(clause);
    }
  }
}

impl SchemaRegistry for MemoryRegistry {
  async fn list_fields(&self) -> Result<Vec<FieldDescriptor>> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    Ok(state.fields.clone())
  }

  async fn has_field(&self, name: &str) -> Result<bool> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    Ok(state.fields.iter().any(|f| f.name == name))
  }

  async fn add_field(&self, descriptor: FieldDescriptor) -> Result<()> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    check_new_field(&state.fields, &descriptor)?;
    state.fields.push(descriptor);
    Ok(())
  }

  async fn add_field_with_values(
    &self,
    descriptor: FieldDescriptor,
    values:     ValueMap,
  ) -> Result<usize> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    check_new_field(&state.fields, &descriptor)?;
    state.check_clauses(&values)?;
    let values = conform_values(&descriptor, values)?;
    let name = descriptor.name.clone();
    state.fields.push(descriptor);
    Ok(state.upsert(&name, values))
  }

  async fn get_value(&self, clause_id: &ClauseId, field: &str) -> Result<Option<FieldValue>> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    state.descriptor(field)?;
    Ok(state.values.get(field).and_then(|col| col.get(clause_id)).cloned())
  }

  async fn set_values(&self, field: &str, values: ValueMap) -> Result<usize> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    let descriptor = state.descriptor(field)?.clone();
    state.check_clauses(&values)?;
    let values = conform_values(&descriptor, values)?;
    Ok(state.upsert(field, values))
  }

  async fn clauses(&self) -> Result<Vec<Clause>> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    Ok(state.clauses.clone())
  }

  async fn rows(&self) -> Result<Vec<Row>> {
    let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
    let rows = state
      .clauses
      .iter()
      .map(|clause| Row {
        clause: clause.clone(),
        values: state
          .values
          .iter()
          .filter_map(|(field, col)| {
            col.get(&clause.clause_id).map(|v| (field.clone(), v.clone()))
          })
          .collect(),
      })
      .collect();
    Ok(rows)
  }

  async fn reset(&self, clauses: Vec<Clause>) -> Result<()> {
    self.replace(clauses);
    Ok(())
  }
}
