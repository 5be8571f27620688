//! Schema merge: fold one extraction batch into the registry.
//!
//! A new field is registered together with its values in one atomic registry
//! call; an existing field only has its values upserted. Merging the same
//! batch twice leaves the registry unchanged after the first time.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use clausedb_core::{
  Error, Result,
  clause::ClauseId,
  coerce::infer_field_type,
  field::{FieldDescriptor, FieldValue},
  record::{ExtractionRecord, FieldProposal, MergeReport},
  registry::{SchemaRegistry, ValueMap},
};
use tokio::sync::OwnedMutexGuard;
use tracing::{info, warn};

/// Merge `records` for the field described by `proposal`.
///
/// Returns the report and the field's descriptor as registered.
pub async fn merge<R: SchemaRegistry>(
  registry: &R,
  proposal: &FieldProposal,
  records: Vec<ExtractionRecord>,
) -> Result<(MergeReport, FieldDescriptor)> {
  if let Some(stray) = records.iter().find(|r| r.field != proposal.name) {
    return Err(Error::SchemaInconsistency(format!(
      "record for {:?} in a batch for {:?}",
      stray.field, proposal.name
    )));
  }

  let extracted: Vec<(ClauseId, FieldValue)> = records
    .into_iter()
    .filter(|r| r.valid)
    .filter_map(|r| r.value.map(|v| (r.clause_id, v)))
    .collect();

  let fields = registry.list_fields().await?;
  if let Some(existing) = fields.into_iter().find(|f| f.name == proposal.name) {
    let values = conform(&existing, extracted);
    let written = registry.set_values(&existing.name, values).await?;
    info!(field = %existing.name, written, "merged values into existing field");
    let report = MergeReport { field: existing.name.clone(), field_added: false, values_written: written };
    return Ok((report, existing));
  }

  let observed: Vec<FieldValue> = extracted.iter().map(|(_, v)| v.clone()).collect();
  let field_type = infer_field_type(&observed, proposal.type_hint);
  let descriptor = FieldDescriptor {
    name:        proposal.name.clone(),
    field_type,
    parent:      proposal.parent.clone(),
    description: proposal.description.clone(),
  };
  let values = conform(&descriptor, extracted);
  let written = registry.add_field_with_values(descriptor.clone(), values).await?;
  info!(field = %descriptor.name, %field_type, written, "added field");

  let report = MergeReport { field: descriptor.name.clone(), field_added: true, values_written: written };
  Ok((report, descriptor))
}

/// Values converted to the field's type; those with no representation in it
/// are dropped.
fn conform(descriptor: &FieldDescriptor, extracted: Vec<(ClauseId, FieldValue)>) -> ValueMap {
  extracted
    .into_iter()
    .filter_map(|(id, v)| match v.convert(descriptor.field_type) {
      Some(converted) => Some((id, converted)),
      None => {
        warn!(field = %descriptor.name, clause = %id, value = %v, "value does not fit field type, skipped");
        None
      }
    })
    .collect()
}

// ─── Field locks ─────────────────────────────────────────────────────────────

/// Serialises discovery of the same field name across concurrent requests.
///
/// Holders re-check the registry after acquiring: whoever got there first
/// has already added the field. An entry lives only while someone holds or
/// waits on it.
#[derive(Debug, Default)]
pub struct FieldLocks {
  locks: Arc<Mutex<LockMap>>,
}

type LockMap = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

impl FieldLocks {
  pub fn new() -> Self { Self::default() }

  pub async fn lock(&self, field: &str) -> FieldGuard {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.entry(field.to_owned()).or_default().clone()
    };
    FieldGuard {
      guard: Some(lock.lock_owned().await),
      field: field.to_owned(),
      locks: self.locks.clone(),
    }
  }

  /// Names currently held or waited on.
  pub fn len(&self) -> usize { self.locks.lock().unwrap_or_else(PoisonError::into_inner).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Exclusive hold on one field name. Releasing the last hold forgets the name.
#[derive(Debug)]
pub struct FieldGuard {
  guard: Option<OwnedMutexGuard<()>>,
  field: String,
  locks: Arc<Mutex<LockMap>>,
}

impl Drop for FieldGuard {
  fn drop(&mut self) {
    drop(self.guard.take());
    let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
    // The map's own reference is the only one left: nobody holds or waits.
    if locks.get(&self.field).is_some_and(|l| Arc::strong_count(l) == 1) {
      locks.remove(&self.field);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use clausedb_core::{clause::Clause, field::FieldType, memory::MemoryRegistry};

  use super::*;

  fn setup() -> (MemoryRegistry, Vec<Clause>) {
    let clauses = vec![Clause::new("one"), Clause::new("two"), Clause::new("three")];
    (MemoryRegistry::with_clauses(clauses.clone()), clauses)
  }

  fn batch(clauses: &[Clause], field: &str, values: &[Option<FieldValue>]) -> Vec<ExtractionRecord> {
    clauses
      .iter()
      .zip(values)
      .map(|(c, v)| match v {
        Some(v) => ExtractionRecord::valid(c.clause_id.clone(), field, v.clone()),
        None => ExtractionRecord::invalid(c.clause_id.clone(), field),
      })
      .collect()
  }

  #[tokio::test]
  async fn new_field_is_added_with_inferred_type() {
    let (registry, clauses) = setup();
    let records = batch(&clauses, "fee", &[
      Some(FieldValue::Number(100.0)),
      None,
      Some(FieldValue::Number(250.0)),
    ]);
    let (report, descriptor) = merge(&registry, &FieldProposal::new("fee"), records).await.unwrap();

    assert_eq!(report, MergeReport { field: "fee".into(), field_added: true, values_written: 2 });
    assert_eq!(descriptor.field_type, FieldType::Numeric);
    assert_eq!(
      registry.get_value(&clauses[2].clause_id, "fee").await.unwrap(),
      Some(FieldValue::Number(250.0))
    );
    assert_eq!(registry.get_value(&clauses[1].clause_id, "fee").await.unwrap(), None);
  }

  #[tokio::test]
  async fn merging_twice_is_idempotent() {
    let (registry, clauses) = setup();
    let records = batch(&clauses, "law", &[
      Some(FieldValue::Text("Delaware".into())),
      Some(FieldValue::Text("New York".into())),
      None,
    ]);
    let proposal = FieldProposal::new("law");
    merge(&registry, &proposal, records.clone()).await.unwrap();
    let fields_before = registry.list_fields().await.unwrap();
    let rows_before = registry.rows().await.unwrap();

    let (report, _) = merge(&registry, &proposal, records).await.unwrap();
    assert!(!report.field_added);
    assert_eq!(registry.list_fields().await.unwrap(), fields_before);
    assert_eq!(registry.rows().await.unwrap(), rows_before);
  }

  #[tokio::test]
  async fn empty_batch_still_registers_the_field() {
    let (registry, clauses) = setup();
    let records = batch(&clauses, "escrow_agent", &[None, None, None]);
    let proposal = FieldProposal::new("escrow_agent").with_type_hint(FieldType::Text);
    let (report, descriptor) = merge(&registry, &proposal, records).await.unwrap();
    assert!(report.field_added);
    assert_eq!(report.values_written, 0);
    assert_eq!(descriptor.field_type, FieldType::Text);
    assert!(registry.has_field("escrow_agent").await.unwrap());
  }

  #[tokio::test]
  async fn unknown_parent_aborts_without_changes() {
    let (registry, clauses) = setup();
    let records = batch(&clauses, "penalty_amount", &[Some(FieldValue::Number(1.0)), None, None]);
    let proposal = FieldProposal::new("penalty_amount").with_parent("amount");
    let err = merge(&registry, &proposal, records).await.unwrap_err();
    assert!(matches!(err, Error::InvalidParent { .. }));
    assert!(registry.list_fields().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn stray_records_are_rejected() {
    let (registry, clauses) = setup();
    let records = batch(&clauses, "other", &[None, None, None]);
    let err = merge(&registry, &FieldProposal::new("fee"), records).await.unwrap_err();
    assert!(matches!(err, Error::SchemaInconsistency(_)));
  }

  #[tokio::test]
  async fn field_locks_serialise_the_same_name() {
    let locks = Arc::new(FieldLocks::new());
    let guard = locks.lock("fee").await;

    let other = locks.clone();
    let waiter = tokio::spawn(async move {
      let _g = other.lock("fee").await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    // A different name is not blocked.
    let _unrelated = locks.lock("law").await;

    drop(guard);
    waiter.await.unwrap();
  }

  #[tokio::test]
  async fn field_locks_forget_released_names() {
    let locks = FieldLocks::new();
    for i in 0..100 {
      let _g = locks.lock(&format!("field_{i}")).await;
      assert_eq!(locks.len(), 1);
    }
    assert!(locks.is_empty());
  }

  #[tokio::test]
  async fn field_locks_keep_a_name_while_someone_waits() {
    let locks = Arc::new(FieldLocks::new());
    let guard = locks.lock("fee").await;

    let other = locks.clone();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let waiter = tokio::spawn(async move {
      let _g = other.lock("fee").await;
      let _ = rx.await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(guard);
    assert_eq!(locks.len(), 1);

    tx.send(()).unwrap();
    waiter.await.unwrap();
    assert!(locks.is_empty());
  }
}
