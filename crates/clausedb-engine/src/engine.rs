//! The query pipeline and administrative operations.

use std::{collections::HashSet, sync::Arc};

use clausedb_core::{
  capability::{FieldExtractor, FieldNamer, QueryClassifier, QueryInterpreter},
  clause::Clause,
  field::{FieldDescriptor, sanitize_field_name, type_hint_for_name},
  log::{ProcessingLog, Stage},
  plan::{Ordering, QueryPlan},
  record::{FieldProposal, MergeReport},
  registry::SchemaRegistry,
  response::{Classification, QueryResponse},
};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use crate::{
  compiler::{Compiler, DraftSource, execute},
  error::QueryFailure,
  lexical::{LexicalClassifier, LexicalInterpreter, LexicalNamer, PatternExtractor},
  merge::{FieldLocks, merge},
  orchestrator::{ExtractionConfig, Orchestrator},
  resolver::{Resolution, Resolver},
  router::{Decider, Route, Router, Routing},
  selftest::{self, SelfTestReport},
};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// The text-understanding backends the pipeline calls out through.
#[derive(Clone)]
pub struct Capabilities {
  pub classifier:  Arc<dyn QueryClassifier>,
  pub namer:       Arc<dyn FieldNamer>,
  pub extractor:   Arc<dyn FieldExtractor>,
  pub interpreter: Arc<dyn QueryInterpreter>,
}

impl Capabilities {
  /// Dictionary-based backends only; no network.
  pub fn lexical() -> Self {
    Self {
      classifier:  Arc::new(LexicalClassifier),
      namer:       Arc::new(LexicalNamer),
      extractor:   Arc::new(PatternExtractor),
      interpreter: Arc::new(LexicalInterpreter),
    }
  }

  /// One model serving every capability.
  pub fn from_model<M>(model: Arc<M>) -> Self
  where
    M: QueryClassifier + FieldNamer + FieldExtractor + QueryInterpreter + 'static,
  {
    Self {
      classifier:  model.clone(),
      namer:       model.clone(),
      extractor:   model.clone(),
      interpreter: model,
    }
  }

  pub fn with_extractor(mut self, extractor: Arc<dyn FieldExtractor>) -> Self {
    self.extractor = extractor;
    self
  }
}

impl Default for Capabilities {
  fn default() -> Self { Self::lexical() }
}

// ─── Reports ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
  /// Distinct clauses ingested.
  pub clauses: usize,
  pub fields:  Vec<MergeReport>,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

pub struct Engine<R> {
  registry:     Arc<R>,
  router:       Router,
  resolver:     Resolver,
  orchestrator: Orchestrator,
  compiler:     Compiler,
  locks:        FieldLocks,
  /// Queries hold it shared; rebuild holds it exclusively.
  admin:        RwLock<()>,
}

/// Accumulates the processing log and turns stage errors into failures that
/// carry it.
#[derive(Default)]
struct Trace {
  log:   ProcessingLog,
  field: Option<String>,
}

impl Trace {
  fn check<T>(&mut self, stage: Stage, result: clausedb_core::Result<T>) -> Result<T, QueryFailure> {
    result.map_err(|source| {
      self.log.push(stage, format!("failed: {source}"));
      QueryFailure {
        stage,
        field: self.field.clone(),
        source,
        log: std::mem::take(&mut self.log),
      }
    })
  }
}

fn verdict_word(route: &Route) -> Classification {
  if route.is_hit() { Classification::Hit } else { Classification::Miss }
}

fn describe_routing(routing: &Routing) -> String {
  let verdict = verdict_word(&routing.route);
  match (&routing.decided_by, &routing.route) {
    (Decider::Names, Route::Hit { fields }) if fields.is_empty() => {
      format!("classified as {verdict}: clause-text search")
    }
    (Decider::Names, Route::Hit { fields }) => {
      format!("classified as {verdict}: query names {}", fields.join(", "))
    }
    (Decider::Fallback(reason), _) => {
      format!("classified as {verdict} lexically (classifier: {reason})")
    }
    _ => format!("classified as {verdict} by the classifier"),
  }
}

fn describe_proposal(proposal: &FieldProposal) -> String {
  let mut line = format!("resolved new field {}", proposal.name);
  if let Some(hint) = proposal.type_hint {
    line.push_str(&format!(", expected {hint}"));
  }
  if let Some(parent) = &proposal.parent {
    line.push_str(&format!(", scoped by parent {parent}"));
  }
  line
}

fn describe_plan(plan: &QueryPlan) -> String {
  let targets = if plan.targets.is_empty() { "clause text".to_owned() } else { plan.targets.join(", ") };
  let ordering = match &plan.ordering {
    Ordering::Insertion => "clause order".to_owned(),
    Ordering::Field { field, descending: true } => format!("{field} descending"),
    Ordering::Field { field, descending: false } => format!("{field} ascending"),
  };
  format!("targets {targets}; {} predicates; {ordering}", plan.predicates.len())
}

impl<R: SchemaRegistry + 'static> Engine<R> {
  pub fn new(registry: Arc<R>, capabilities: Capabilities, extraction: ExtractionConfig) -> Self {
    Self {
      registry,
      router: Router::new(capabilities.classifier),
      resolver: Resolver::new(capabilities.namer),
      orchestrator: Orchestrator::new(capabilities.extractor, extraction),
      compiler: Compiler::new(capabilities.interpreter),
      locks: FieldLocks::new(),
      admin: RwLock::new(()),
    }
  }

  pub fn registry(&self) -> &Arc<R> { &self.registry }

  /// Answer one natural-language query, discovering a new field first when
  /// the schema cannot answer it yet.
  pub async fn handle_query(&self, query: &str) -> Result<QueryResponse, QueryFailure> {
    let span = info_span!("query", request_id = %Uuid::new_v4());
    self.run_query(query.trim()).instrument(span).await
  }

  async fn run_query(&self, query: &str) -> Result<QueryResponse, QueryFailure> {
    let _admin = self.admin.read().await;
    let mut trace = Trace::default();

    let fields = trace.check(Stage::Route, self.registry.list_fields().await)?;
    let routing = trace.check(Stage::Route, self.router.classify(query, &fields).await)?;
    trace.log.push(Stage::Route, describe_routing(&routing));
    let classification = verdict_word(&routing.route);
    info!(%classification, "routed");

    let mut schema_delta = None;
    let focus = match routing.route {
      Route::Hit { fields } => fields,
      Route::Miss => match trace.check(Stage::Resolve, self.resolver.resolve(query, &fields).await)? {
        Resolution::Existing(name) => {
          trace.log.push(Stage::Resolve, format!("field {name} already exists, answering as HIT"));
          vec![name]
        }
        Resolution::New(proposal) => {
          trace.field = Some(proposal.name.clone());
          trace.log.push(Stage::Resolve, describe_proposal(&proposal));
          schema_delta = self.discover(&proposal, &mut trace).await?;
          self.reroute(query, &proposal.name, &mut trace).await?
        }
      },
    };
    trace.field = None;

    let fields = trace.check(Stage::Compile, self.registry.list_fields().await)?;
    let (plan, source) = trace.check(Stage::Compile, self.compiler.compile(query, &fields, &focus).await)?;
    if let DraftSource::Fallback(reason) = &source {
      trace.log.push(Stage::Compile, format!("interpreter failed ({reason}), compiled lexically"));
    }
    trace.log.push(Stage::Compile, describe_plan(&plan));

    let rows = trace.check(Stage::Execute, self.registry.rows().await)?;
    let result_rows = execute(&plan, rows);
    trace.log.push(Stage::Execute, format!("returned {} rows", result_rows.len()));
    info!(rows = result_rows.len(), "answered");

    Ok(QueryResponse { classification, processing_log: trace.log, result_rows, schema_delta })
  }

  /// Extract and merge a new field. Returns its descriptor when this request
  /// added it.
  async fn discover(
    &self,
    proposal: &FieldProposal,
    trace: &mut Trace,
  ) -> Result<Option<FieldDescriptor>, QueryFailure> {
    let guard = self.locks.lock(&proposal.name).await;
    if trace.check(Stage::Resolve, self.registry.has_field(&proposal.name).await)? {
      trace.log.push(
        Stage::Resolve,
        format!("field {} was added by a concurrent query, skipping extraction", proposal.name),
      );
      return Ok(None);
    }

    let parent = proposal.parent.as_deref();
    let clauses = trace.check(Stage::Extract, self.orchestrator.scope(self.registry.as_ref(), parent).await)?;
    trace.log.push(Stage::Extract, match parent {
      Some(parent) => format!("extracting {} from {} clauses with a {parent}", proposal.name, clauses.len()),
      None => format!("extracting {} from {} clauses", proposal.name, clauses.len()),
    });
    let records = trace.check(Stage::Extract, self.orchestrator.extract(proposal, clauses).await)?;
    let found = records.iter().filter(|r| r.valid).count();
    trace.log.push(Stage::Extract, format!("found {found} values in {} clauses", records.len()));

    // The merge runs detached so that a dropped request cannot interrupt it;
    // the field lock is released only once it completes.
    let registry = self.registry.clone();
    let owned = proposal.clone();
    let merged = tokio::spawn(async move {
      let result = merge(registry.as_ref(), &owned, records).await;
      drop(guard);
      result
    })
    .await
    .unwrap_or_else(|e| {
      Err(clausedb_core::Error::SchemaInconsistency(format!("merge task failed: {e}")))
    });
    let (report, descriptor) = trace.check(Stage::Merge, merged)?;

    trace.log.push(Stage::Merge, if report.field_added {
      format!(
        "added field {} ({}) with {} values",
        descriptor.name, descriptor.field_type, report.values_written
      )
    } else {
      format!("wrote {} values to existing field {}", report.values_written, descriptor.name)
    });
    Ok(report.field_added.then_some(descriptor))
  }

  /// Route again after discovery. The new field is always in focus.
  async fn reroute(&self, query: &str, field: &str, trace: &mut Trace) -> Result<Vec<String>, QueryFailure> {
    let fields = trace.check(Stage::Reroute, self.registry.list_fields().await)?;
    let routing = trace.check(Stage::Reroute, self.router.classify(query, &fields).await)?;
    trace.log.push(Stage::Reroute, describe_routing(&routing));
    Ok(match routing.route {
      Route::Hit { mut fields } => {
        if !fields.iter().any(|f| f == field) {
          fields.push(field.to_owned());
        }
        fields
      }
      Route::Miss => {
        trace.log.push(Stage::Reroute, format!("answering from {field}"));
        vec![field.to_owned()]
      }
    })
  }

  /// Every registered field, in registration order.
  pub async fn list_schema(&self) -> clausedb_core::Result<Vec<FieldDescriptor>> {
    self.registry.list_fields().await
  }

  /// Replace the clause set, drop every derived field, and re-extract the
  /// base fields. Waits for in-flight queries and blocks new ones meanwhile.
  ///
  /// Every base field is extracted before the registry is touched, so a
  /// capability failure leaves the previous schema and values in place.
  pub async fn rebuild(
    &self,
    clauses: Vec<Clause>,
    base_fields: &[String],
  ) -> clausedb_core::Result<RebuildReport> {
    let _admin = self.admin.write().await;

    let mut seen = HashSet::new();
    let clauses: Vec<Clause> = clauses.into_iter().filter(|c| seen.insert(c.clause_id.clone())).collect();

    let mut batches = Vec::with_capacity(base_fields.len());
    for raw in base_fields {
      let name = sanitize_field_name(raw)?;
      let mut proposal = FieldProposal::new(&name);
      proposal.type_hint = type_hint_for_name(&name);
      let records = self.orchestrator.extract(&proposal, clauses.clone()).await?;
      batches.push((proposal, records));
    }

    let ingested = clauses.len();
    self.registry.reset(clauses).await?;
    info!(clauses = ingested, "registry reset");

    let mut reports = Vec::with_capacity(batches.len());
    for (proposal, records) in batches {
      let (report, descriptor) = merge(self.registry.as_ref(), &proposal, records).await?;
      info!(field = %descriptor.name, values = report.values_written, "base field extracted");
      reports.push(report);
    }

    Ok(RebuildReport { clauses: ingested, fields: reports })
  }

  /// Run the built-in battery against a scratch registry.
  pub async fn self_test(&self) -> SelfTestReport { selftest::run().await }
}
