//! Extraction: run the capability over the clauses in scope for a new field.
//!
//! Calls run concurrently up to a configured limit. Per-clause outcomes are
//! independent: a clause the capability rejects yields an invalid record and
//! the batch continues. An outage that outlasts the retry budget fails the
//! whole batch, so a partially extracted field is never merged.

use std::{sync::Arc, time::Duration};

use clausedb_core::{
  Error, Result,
  capability::{CapabilityError, Extracted, FieldExtractor},
  clause::Clause,
  coerce::{classify_value, coerce_value, is_absent_marker},
  record::{ExtractionRecord, FieldProposal},
  registry::SchemaRegistry,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

/// Concurrency and retry limits for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
  /// Maximum concurrent capability calls, shared by every batch.
  pub concurrency:      usize,
  /// Attempts per clause while the capability is unavailable.
  pub max_attempts:     u32,
  /// Base delay between attempts; grows linearly.
  pub retry_backoff_ms: u64,
}

impl Default for ExtractionConfig {
  fn default() -> Self { Self { concurrency: 4, max_attempts: 3, retry_backoff_ms: 500 } }
}

pub struct Orchestrator {
  extractor: Arc<dyn FieldExtractor>,
  config:    ExtractionConfig,
  /// Capability call slots; concurrent requests draw from the same pool.
  permits:   Arc<Semaphore>,
}

impl Orchestrator {
  pub fn new(extractor: Arc<dyn FieldExtractor>, config: ExtractionConfig) -> Self {
    let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
    Self { extractor, config, permits }
  }

  /// The clauses to extract from: every clause, or with `parent` only those
  /// holding a non-null parent value.
  pub async fn scope<R: SchemaRegistry>(&self, registry: &R, parent: Option<&str>) -> Result<Vec<Clause>> {
    let Some(parent) = parent else {
      return registry.clauses().await;
    };
    if !registry.has_field(parent).await? {
      return Err(Error::UnknownField(parent.to_owned()));
    }
    let rows = registry.rows().await?;
    Ok(
      rows
        .into_iter()
        .filter(|row| row.value(parent).is_some())
        .map(|row| row.clause)
        .collect(),
    )
  }

  /// One record per clause, in input order.
  pub async fn extract(&self, field: &FieldProposal, clauses: Vec<Clause>) -> Result<Vec<ExtractionRecord>> {
    let field = Arc::new(field.clone());
    let mut tasks = JoinSet::new();
    let total = clauses.len();

    for (index, clause) in clauses.into_iter().enumerate() {
      let permits = self.permits.clone();
      let extractor = self.extractor.clone();
      let field = field.clone();
      let config = self.config.clone();
      tasks.spawn(async move {
        let _permit = permits.acquire_owned().await;
        let outcome = extract_with_retry(extractor.as_ref(), &clause, &field, &config).await;
        (index, clause, outcome)
      });
    }

    let mut slots: Vec<Option<ExtractionRecord>> = vec![None; total];
    while let Some(joined) = tasks.join_next().await {
      let (index, clause, outcome) = joined.map_err(|e| Error::ExtractionCapabilityFailure {
        field:  field.name.clone(),
        reason: format!("extraction task failed: {e}"),
      })?;
      let record = match outcome {
        Ok(extracted) => validate(&clause, &field, extracted),
        Err(CapabilityError::Rejected(reason)) => {
          warn!(clause = %clause.clause_id, field = %field.name, %reason, "extraction rejected");
          ExtractionRecord::invalid(clause.clause_id, &field.name)
        }
        Err(CapabilityError::Unavailable(reason)) => {
          tasks.abort_all();
          return Err(Error::ExtractionCapabilityFailure { field: field.name.clone(), reason });
        }
      };
      slots[index] = Some(record);
    }

    Ok(slots.into_iter().flatten().collect())
  }
}

async fn extract_with_retry(
  extractor: &dyn FieldExtractor,
  clause: &Clause,
  field: &FieldProposal,
  config: &ExtractionConfig,
) -> Result<Extracted, CapabilityError> {
  let attempts = config.max_attempts.max(1);
  let mut attempt = 1;
  loop {
    match extractor.extract(clause, field).await {
      Err(CapabilityError::Unavailable(reason)) if attempt < attempts => {
        warn!(clause = %clause.clause_id, attempt, %reason, "extraction capability unavailable, retrying");
        tokio::time::sleep(Duration::from_millis(config.retry_backoff_ms * u64::from(attempt))).await;
        attempt += 1;
      }
      other => return other,
    }
  }
}

/// Turn a capability answer into a record, coercing to the proposal's type
/// hint or, lacking one, the value's natural type.
pub fn validate(clause: &Clause, field: &FieldProposal, extracted: Extracted) -> ExtractionRecord {
  let invalid = || ExtractionRecord::invalid(clause.clause_id.clone(), &field.name);
  let raw = match extracted {
    Extracted::Absent | Extracted::Value(Value::Null) => return invalid(),
    Extracted::Value(Value::String(s)) if is_absent_marker(&s) => return invalid(),
    Extracted::Value(raw) => raw,
  };
  let Some(ty) = field.type_hint.or_else(|| classify_value(&raw)) else {
    return invalid();
  };
  match coerce_value(&raw, ty) {
    Ok(value) => ExtractionRecord::valid(clause.clause_id.clone(), &field.name, value),
    Err(e) => {
      debug!(clause = %clause.clause_id, error = %e, "discarding uncoercible value");
      invalid()
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use clausedb_core::{
    field::{FieldDescriptor, FieldType, FieldValue},
    memory::MemoryRegistry,
    registry::ValueMap,
  };
  use serde_json::json;

  use super::*;

  /// Answers from a fixed script keyed by clause text; counts calls and the
  /// peak number in flight.
  #[derive(Default)]
  struct Scripted {
    calls:      AtomicUsize,
    inflight:   AtomicUsize,
    peak:       AtomicUsize,
    fail_first: usize,
  }

  #[async_trait]
  impl FieldExtractor for Scripted {
    async fn extract(&self, clause: &Clause, _: &FieldProposal) -> Result<Extracted, CapabilityError> {
      let n = self.calls.fetch_add(1, Ordering::SeqCst);
      let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
      self.peak.fetch_max(now, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(5)).await;
      self.inflight.fetch_sub(1, Ordering::SeqCst);
      if n < self.fail_first {
        return Err(CapabilityError::Unavailable("503".into()));
      }
      match clause.text.as_str() {
        t if t.starts_with("reject") => Err(CapabilityError::Rejected("garbled".into())),
        t if t.starts_with("none") => Ok(Extracted::Absent),
        t if t.starts_with("na") => Ok(Extracted::Value(json!("N/A"))),
        t if t.starts_with("bad") => Ok(Extracted::Value(json!("lots"))),
        t => Ok(Extracted::Value(json!(t.split_whitespace().last().unwrap()))),
      }
    }
  }

  fn config(concurrency: usize) -> ExtractionConfig {
    ExtractionConfig { concurrency, max_attempts: 3, retry_backoff_ms: 1 }
  }

  fn clauses(texts: &[&str]) -> Vec<Clause> { texts.iter().map(|t| Clause::new(*t)).collect() }

  fn fee() -> FieldProposal { FieldProposal::new("fee").with_type_hint(FieldType::Numeric) }

  #[tokio::test]
  async fn one_record_per_clause_in_order() {
    let input = clauses(&["fee 10", "none here", "reject me", "na", "bad value", "fee $2,500"]);
    let orchestrator = Orchestrator::new(Arc::new(Scripted::default()), config(3));
    let records = orchestrator.extract(&fee(), input.clone()).await.unwrap();

    assert_eq!(records.len(), input.len());
    for (record, clause) in records.iter().zip(&input) {
      assert_eq!(record.clause_id, clause.clause_id);
    }
    let values: Vec<_> = records.iter().map(|r| r.value.clone()).collect();
    assert_eq!(values, vec![
      Some(FieldValue::Number(10.0)),
      None,
      None,
      None,
      None,
      Some(FieldValue::Number(2500.0)),
    ]);
    assert!(records.iter().all(|r| r.valid == r.value.is_some()));
  }

  #[tokio::test]
  async fn concurrency_is_capped() {
    let extractor = Arc::new(Scripted::default());
    let orchestrator = Orchestrator::new(extractor.clone(), config(2));
    let input = clauses(&["a 1", "b 2", "c 3", "d 4", "e 5", "f 6"]);
    orchestrator.extract(&fee(), input).await.unwrap();
    assert!(extractor.peak.load(Ordering::SeqCst) <= 2);
  }

  #[tokio::test]
  async fn concurrent_batches_share_the_cap() {
    let extractor = Arc::new(Scripted::default());
    let orchestrator = Orchestrator::new(extractor.clone(), config(1));
    let fees = FieldProposal::new("fee").with_type_hint(FieldType::Numeric);
    let rates = FieldProposal::new("rate").with_type_hint(FieldType::Numeric);
    let (a, b) = tokio::join!(
      orchestrator.extract(&fees, clauses(&["a 1", "b 2", "c 3"])),
      orchestrator.extract(&rates, clauses(&["d 4", "e 5", "f 6"])),
    );
    assert_eq!(a.unwrap().len(), 3);
    assert_eq!(b.unwrap().len(), 3);
    assert_eq!(extractor.peak.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn transient_outage_is_retried() {
    let extractor = Arc::new(Scripted { fail_first: 1, ..Default::default() });
    let orchestrator = Orchestrator::new(extractor.clone(), config(1));
    let records = orchestrator.extract(&fee(), clauses(&["fee 7"])).await.unwrap();
    assert_eq!(records[0].value, Some(FieldValue::Number(7.0)));
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn persistent_outage_fails_the_batch() {
    let extractor = Arc::new(Scripted { fail_first: usize::MAX, ..Default::default() });
    let orchestrator = Orchestrator::new(extractor, config(2));
    let err = orchestrator.extract(&fee(), clauses(&["fee 1", "fee 2"])).await.unwrap_err();
    assert!(matches!(err, Error::ExtractionCapabilityFailure { ref field, .. } if field == "fee"));
    assert!(err.is_retryable());
  }

  #[tokio::test]
  async fn scope_follows_parent_values() {
    let input = clauses(&["amount 5", "no amount", "amount 9"]);
    let registry = MemoryRegistry::with_clauses(input.clone());
    let values: ValueMap = [
      (input[0].clause_id.clone(), FieldValue::Number(5.0)),
      (input[2].clause_id.clone(), FieldValue::Number(9.0)),
    ]
    .into_iter()
    .collect();
    registry
      .add_field_with_values(FieldDescriptor::new("amount", FieldType::Numeric), values)
      .await
      .unwrap();

    let orchestrator = Orchestrator::new(Arc::new(Scripted::default()), config(1));
    let scoped = orchestrator.scope(&registry, Some("amount")).await.unwrap();
    assert_eq!(scoped, vec![input[0].clone(), input[2].clone()]);
    assert_eq!(orchestrator.scope(&registry, None).await.unwrap().len(), 3);
  }

  #[test]
  fn untyped_values_take_their_natural_type() {
    let clause = Clause::new("x");
    let field = FieldProposal::new("start");
    let record = validate(&clause, &field, Extracted::Value(json!("2024-02-29")));
    assert_eq!(record.value.unwrap().field_type(), FieldType::Date);
  }
}
