use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use clausedb_core::{
  Error as CoreError,
  capability::{CapabilityError, Extracted, FieldExtractor},
  clause::Clause,
  field::{FieldType, FieldValue},
  log::Stage,
  memory::MemoryRegistry,
  record::FieldProposal,
  registry::SchemaRegistry,
  response::Classification,
};

use crate::{
  engine::{Capabilities, Engine},
  lexical::PatternExtractor,
  orchestrator::ExtractionConfig,
  selftest::{FIXTURE, FIXTURE_BASE_FIELDS},
};

fn config() -> ExtractionConfig {
  ExtractionConfig { concurrency: 4, max_attempts: 2, retry_backoff_ms: 1 }
}

async fn engine_with(capabilities: Capabilities) -> Engine<MemoryRegistry> {
  let engine = Engine::new(Arc::new(MemoryRegistry::new()), capabilities, config());
  let clauses = FIXTURE.iter().map(|t| Clause::new(*t)).collect();
  let base: Vec<String> = FIXTURE_BASE_FIELDS.iter().map(|f| (*f).to_owned()).collect();
  engine.rebuild(clauses, &base).await.unwrap();
  engine
}

async fn engine() -> Engine<MemoryRegistry> { engine_with(Capabilities::lexical()).await }

async fn field_names(engine: &Engine<MemoryRegistry>) -> Vec<String> {
  engine.list_schema().await.unwrap().into_iter().map(|f| f.name).collect()
}

/// Counts calls and the highest number in flight at once, then defers to the
/// pattern extractor.
#[derive(Default)]
struct Counting {
  calls:    AtomicUsize,
  inflight: AtomicUsize,
  peak:     AtomicUsize,
  delay:    Duration,
}

#[async_trait]
impl FieldExtractor for Counting {
  async fn extract(&self, clause: &Clause, field: &FieldProposal) -> Result<Extracted, CapabilityError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(self.delay).await;
    self.inflight.fetch_sub(1, Ordering::SeqCst);
    Ok(PatternExtractor.extract_now(clause, field))
  }
}

/// Always down.
struct Outage;

#[async_trait]
impl FieldExtractor for Outage {
  async fn extract(&self, _: &Clause, _: &FieldProposal) -> Result<Extracted, CapabilityError> {
    Err(CapabilityError::Unavailable("connection refused".into()))
  }
}

// ─── Rebuild ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rebuild_ingests_and_extracts_base_fields() {
  let engine = engine().await;
  assert_eq!(field_names(&engine).await, vec!["company", "amount"]);

  let schema = engine.list_schema().await.unwrap();
  assert_eq!(schema[0].field_type, FieldType::Text);
  assert_eq!(schema[1].field_type, FieldType::Numeric);
  assert_eq!(engine.registry().clauses().await.unwrap().len(), FIXTURE.len());
}

#[tokio::test]
async fn rebuild_drops_discovered_fields() {
  let engine = engine().await;
  engine.handle_query("What are the termination fees?").await.unwrap();
  assert_eq!(field_names(&engine).await.len(), 3);

  let clauses = FIXTURE.iter().map(|t| Clause::new(*t)).collect();
  let report = engine.rebuild(clauses, &["company".to_owned()]).await.unwrap();
  assert_eq!(report.fields.len(), 1);
  assert_eq!(field_names(&engine).await, vec!["company"]);
}

#[tokio::test]
async fn failed_rebuild_leaves_the_registry_alone() {
  let engine = engine().await;
  engine.handle_query("What are the termination fees?").await.unwrap();
  let rows_before = engine.registry().rows().await.unwrap();

  let broken = Engine::new(
    engine.registry().clone(),
    Capabilities::lexical().with_extractor(Arc::new(Outage)),
    config(),
  );
  let clauses = vec![Clause::new("Initech shall pay $10.")];
  let err = broken.rebuild(clauses, &["company".to_owned()]).await.unwrap_err();
  assert!(matches!(err, CoreError::ExtractionCapabilityFailure { .. }));

  assert_eq!(field_names(&engine).await, vec!["company", "amount", "termination_fee"]);
  assert_eq!(engine.registry().clauses().await.unwrap().len(), FIXTURE.len());
  assert_eq!(engine.registry().rows().await.unwrap(), rows_before);
}

#[tokio::test]
async fn rebuild_collapses_repeated_clauses() {
  let engine = engine().await;
  let clauses = vec![Clause::new("Acme Corp shall pay $500."), Clause::new("  Acme Corp shall pay $500.\n")];
  let report = engine.rebuild(clauses, &["amount".to_owned()]).await.unwrap();
  assert_eq!(report.clauses, 1);
  assert_eq!(engine.registry().clauses().await.unwrap().len(), 1);
}

// ─── Scenario A: known field ─────────────────────────────────────────────────

#[tokio::test]
async fn hit_on_a_known_field_changes_nothing() {
  let engine = engine().await;
  let rows_before = engine.registry().rows().await.unwrap();

  let response = engine.handle_query("Show me all companies").await.unwrap();
  assert_eq!(response.classification, Classification::Hit);
  assert!(response.schema_delta.is_none());
  assert_eq!(response.result_rows.len(), 4);
  assert_eq!(response.processing_log.stages(), vec![Stage::Route, Stage::Compile, Stage::Execute]);
  let first = &response.result_rows[0];
  assert_eq!(first.values["company"], Some(FieldValue::Text("Acme Corp".into())));

  assert_eq!(field_names(&engine).await, vec!["company", "amount"]);
  assert_eq!(engine.registry().rows().await.unwrap(), rows_before);
}

// ─── Scenario B: new field ───────────────────────────────────────────────────

#[tokio::test]
async fn miss_discovers_and_answers_from_the_new_field() {
  let engine = engine().await;
  let response = engine.handle_query("What are the termination fees?").await.unwrap();

  assert_eq!(response.classification, Classification::Miss);
  let delta = response.schema_delta.clone().unwrap();
  assert_eq!(delta.name, "termination_fee");
  assert_eq!(delta.field_type, FieldType::Numeric);
  assert_eq!(delta.parent, None);

  assert_eq!(response.processing_log.stages(), vec![
    Stage::Route,
    Stage::Resolve,
    Stage::Extract,
    Stage::Extract,
    Stage::Merge,
    Stage::Reroute,
    Stage::Compile,
    Stage::Execute,
  ]);
  let fees: Vec<_> = response.result_rows.iter().map(|r| r.values["termination_fee"].clone()).collect();
  assert_eq!(fees, vec![Some(FieldValue::Number(5000.0)), Some(FieldValue::Number(750.0))]);

  // Asking again is a HIT with the same answer.
  let again = engine.handle_query("What are the termination fees?").await.unwrap();
  assert_eq!(again.classification, Classification::Hit);
  assert!(again.schema_delta.is_none());
  assert_eq!(again.result_rows, response.result_rows);
}

// ─── Scenario C: parent scoping ──────────────────────────────────────────────

#[tokio::test]
async fn modifier_of_a_known_field_extracts_only_within_its_scope() {
  let counting = Arc::new(Counting::default());
  let engine = engine_with(Capabilities::lexical().with_extractor(counting.clone())).await;
  let before = counting.calls.load(Ordering::SeqCst);

  let response = engine.handle_query("What are the penalty amounts?").await.unwrap();
  let delta = response.schema_delta.unwrap();
  assert_eq!(delta.name, "penalty_amount");
  assert_eq!(delta.parent.as_deref(), Some("amount"));

  // Only the three clauses with an amount were sent to the extractor.
  assert_eq!(counting.calls.load(Ordering::SeqCst) - before, 3);

  let rows = engine.registry().rows().await.unwrap();
  for row in rows {
    if row.value("penalty_amount").is_some() {
      assert!(row.value("amount").is_some());
    }
  }
  assert_eq!(response.result_rows.len(), 2);
}

// ─── Scenario D: capability outage ───────────────────────────────────────────

#[tokio::test]
async fn outage_fails_retryably_and_leaves_the_schema_alone() {
  let engine = engine().await;
  // Swap in a failing extractor over the same registry.
  let broken = Engine::new(
    engine.registry().clone(),
    Capabilities::lexical().with_extractor(Arc::new(Outage)),
    config(),
  );
  let rows_before = engine.registry().rows().await.unwrap();

  let failure = broken.handle_query("What are the termination fees?").await.unwrap_err();
  assert_eq!(failure.stage, Stage::Extract);
  assert_eq!(failure.field.as_deref(), Some("termination_fee"));
  assert!(failure.is_retryable());
  assert!(matches!(failure.source, CoreError::ExtractionCapabilityFailure { .. }));
  assert_eq!(failure.log.stages(), vec![Stage::Route, Stage::Resolve, Stage::Extract, Stage::Extract]);

  assert_eq!(field_names(&engine).await, vec!["company", "amount"]);
  assert_eq!(engine.registry().rows().await.unwrap(), rows_before);

  // Once the capability is back the same query succeeds.
  let response = engine.handle_query("What are the termination fees?").await.unwrap();
  assert_eq!(response.schema_delta.unwrap().name, "termination_fee");
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn schema_only_grows() {
  let engine = engine().await;
  let mut previous = field_names(&engine).await;
  for query in [
    "What are the termination fees?",
    "Show me all companies",
    "What are the penalty amounts?",
    "Show termination fees greater than 1000",
    "Show me",
  ] {
    let _ = engine.handle_query(query).await;
    let current = field_names(&engine).await;
    assert!(current.starts_with(&previous), "{previous:?} is not a prefix of {current:?}");
    previous = current;
  }
  assert_eq!(previous, vec!["company", "amount", "termination_fee", "penalty_amount"]);
}

#[tokio::test]
async fn concurrent_discovery_of_one_field_extracts_once() {
  let counting = Arc::new(Counting { delay: Duration::from_millis(10), ..Default::default() });
  let engine = Arc::new(engine_with(Capabilities::lexical().with_extractor(counting.clone())).await);
  let before = counting.calls.load(Ordering::SeqCst);

  let a = tokio::spawn({
    let engine = engine.clone();
    async move { engine.handle_query("What are the termination fees?").await }
  });
  let b = tokio::spawn({
    let engine = engine.clone();
    async move { engine.handle_query("What are the termination fees?").await }
  });
  let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

  let deltas = [a.schema_delta.is_some(), b.schema_delta.is_some()];
  assert_eq!(deltas.iter().filter(|d| **d).count(), 1);
  assert_eq!(a.result_rows, b.result_rows);
  assert_eq!(counting.calls.load(Ordering::SeqCst) - before, FIXTURE.len());
  assert_eq!(
    field_names(&engine).await.iter().filter(|f| *f == "termination_fee").count(),
    1
  );
}

#[tokio::test]
async fn concurrent_discoveries_of_different_fields_share_the_cap() {
  let counting = Arc::new(Counting { delay: Duration::from_millis(5), ..Default::default() });
  let engine = Engine::new(
    Arc::new(MemoryRegistry::new()),
    Capabilities::lexical().with_extractor(counting.clone()),
    ExtractionConfig { concurrency: 1, max_attempts: 2, retry_backoff_ms: 1 },
  );
  let clauses = FIXTURE.iter().map(|t| Clause::new(*t)).collect();
  let base: Vec<String> = FIXTURE_BASE_FIELDS.iter().map(|f| (*f).to_owned()).collect();
  engine.rebuild(clauses, &base).await.unwrap();
  let engine = Arc::new(engine);

  let a = tokio::spawn({
    let engine = engine.clone();
    async move { engine.handle_query("What are the termination fees?").await }
  });
  let b = tokio::spawn({
    let engine = engine.clone();
    async move { engine.handle_query("What are the penalty amounts?").await }
  });
  let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

  assert_eq!(a.schema_delta.unwrap().name, "termination_fee");
  assert_eq!(b.schema_delta.unwrap().name, "penalty_amount");
  assert_eq!(counting.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unresolvable_queries_fail_at_the_right_stage() {
  let engine = engine().await;

  let failure = engine.handle_query("Show me").await.unwrap_err();
  assert_eq!(failure.stage, Stage::Route);
  assert!(matches!(failure.source, CoreError::RoutingAmbiguity(_)));

  let failure = engine
    .handle_query("licensee obligations for source code escrow release")
    .await
    .unwrap_err();
  assert_eq!(failure.stage, Stage::Resolve);
  assert!(matches!(failure.source, CoreError::UnresolvedField(_)));
  assert!(!failure.is_retryable());
  assert_eq!(field_names(&engine).await, vec!["company", "amount"]);
}

#[tokio::test]
async fn hit_results_are_stable_without_intervening_changes() {
  let engine = engine().await;
  let first = engine.handle_query("Show me all companies").await.unwrap();
  let second = engine.handle_query("Show me all companies").await.unwrap();
  assert_eq!(first.result_rows, second.result_rows);
}
