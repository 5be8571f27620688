//! Built-in end-to-end checks.
//!
//! Runs a fixed sequence of queries through a fresh engine over an in-memory
//! registry and a small fixture corpus, using the lexical capabilities only.
//! Cases run in order and share the registry, so later cases see the fields
//! earlier ones discovered.

use std::{fmt, sync::Arc};

use clausedb_core::{
  clause::Clause,
  log::Stage,
  memory::MemoryRegistry,
  response::{Classification, QueryResponse},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  engine::{Capabilities, Engine},
  error::QueryFailure,
  orchestrator::ExtractionConfig,
};

pub const FIXTURE: &[&str] = &[
  "Master services agreement with company: Acme Corp. The amount: $12,000 is payable annually \
   and the termination fee: $5,000 applies on early exit.",
  "Supply agreement with company: Globex Inc. Purchase amount: $8,000. A late delivery penalty \
   amount: $250 per day applies.",
  "License granted to company: Initech LLC, royalty free.",
  "Consulting terms for company: Umbrella Ltd. Termination fee: $750 if cancelled within the \
   first year.",
  "Escrow arrangement. Amount: $3,000 held in trust. Penalty amount: $100 for each breach.",
  "General confidentiality obligations apply to both parties.",
];

pub const FIXTURE_BASE_FIELDS: &[&str] = &["company", "amount"];

#[derive(Debug, Clone, Copy)]
enum Expected {
  Answer { classification: Classification, rows: usize, discovers: Option<&'static str> },
  Failure(Stage),
}

impl fmt::Display for Expected {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Answer { classification, rows, discovers: Some(field) } => {
        write!(f, "{classification}, adds {field}, {rows} rows")
      }
      Self::Answer { classification, rows, discovers: None } => write!(f, "{classification}, {rows} rows"),
      Self::Failure(stage) => write!(f, "fails at {stage}"),
    }
  }
}

fn describe(outcome: &Result<QueryResponse, QueryFailure>) -> String {
  match outcome {
    Ok(r) => match &r.schema_delta {
      Some(field) => format!("{}, adds {}, {} rows", r.classification, field.name, r.result_rows.len()),
      None => format!("{}, {} rows", r.classification, r.result_rows.len()),
    },
    Err(failure) => format!("fails at {}", failure.stage),
  }
}

fn detail(outcome: &Result<QueryResponse, QueryFailure>) -> String {
  match outcome {
    Ok(r) => r.processing_log.lines().join("\n"),
    Err(failure) => failure.log.lines().join("\n"),
  }
}

const CASES: &[(&str, &str, Expected)] = &[
  ("base field lookup", "Show me all companies", Expected::Answer {
    classification: Classification::Hit,
    rows:           4,
    discovers:      None,
  }),
  ("new field discovery", "What are the termination fees?", Expected::Answer {
    classification: Classification::Miss,
    rows:           2,
    discovers:      Some("termination_fee"),
  }),
  ("discovered field is reused", "What are the termination fees?", Expected::Answer {
    classification: Classification::Hit,
    rows:           2,
    discovers:      None,
  }),
  ("parent-scoped discovery", "What are the penalty amounts?", Expected::Answer {
    classification: Classification::Miss,
    rows:           2,
    discovers:      Some("penalty_amount"),
  }),
  ("numeric comparison", "Show termination fees greater than 1000", Expected::Answer {
    classification: Classification::Hit,
    rows:           1,
    discovers:      None,
  }),
  ("clause text search", "Find clauses mentioning confidentiality", Expected::Answer {
    classification: Classification::Hit,
    rows:           1,
    discovers:      None,
  }),
  ("contentless query", "Show me", Expected::Failure(Stage::Route)),
];

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestCase {
  pub name:     String,
  pub query:    String,
  pub expected: String,
  pub actual:   String,
  pub passed:   bool,
  /// The processing log of the run.
  pub detail:   String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelfTestReport {
  pub cases:  Vec<SelfTestCase>,
  pub passed: usize,
  pub failed: usize,
}

impl SelfTestReport {
  pub fn all_passed(&self) -> bool { self.failed == 0 }
}

pub async fn run() -> SelfTestReport {
  let engine = Engine::new(
    Arc::new(MemoryRegistry::new()),
    Capabilities::lexical(),
    ExtractionConfig::default(),
  );
  let clauses = FIXTURE.iter().map(|t| Clause::new(*t)).collect();
  let base: Vec<String> = FIXTURE_BASE_FIELDS.iter().map(|f| (*f).to_owned()).collect();

  let mut cases = Vec::with_capacity(CASES.len() + 1);
  let setup = engine.rebuild(clauses, &base).await;
  cases.push(SelfTestCase {
    name:     "fixture rebuild".into(),
    query:    String::new(),
    expected: format!("{} clauses", FIXTURE.len()),
    actual:   match &setup {
      Ok(report) => format!("{} clauses", report.clauses),
      Err(e) => format!("error: {e}"),
    },
    passed:   setup.as_ref().is_ok_and(|r| r.clauses == FIXTURE.len()),
    detail:   String::new(),
  });

  for (name, query, expected) in CASES {
    let outcome = engine.handle_query(query).await;
    let (expected_text, actual) = (expected.to_string(), describe(&outcome));
    let passed = expected_text == actual;
    if !passed {
      warn!(case = name, expected = %expected_text, %actual, "self-test case failed");
    }
    cases.push(SelfTestCase {
      name: (*name).to_owned(),
      query: (*query).to_owned(),
      expected: expected_text,
      actual,
      passed,
      detail: detail(&outcome),
    });
  }

  let passed = cases.iter().filter(|c| c.passed).count();
  let failed = cases.len() - passed;
  info!(passed, failed, "self-test finished");
  SelfTestReport { cases, passed, failed }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn battery_passes() {
    let report = run().await;
    for case in &report.cases {
      assert!(case.passed, "{}: expected {}, got {}\n{}", case.name, case.expected, case.actual, case.detail);
    }
    assert_eq!(report.failed, 0);
    assert!(report.all_passed());
  }
}
