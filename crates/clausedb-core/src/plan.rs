//! Query plans and result rows.
//!
//! A [`PlanDraft`] is what an interpreter proposes from natural language; the
//! compiler validates it against the registry and produces a [`QueryPlan`].
//! Plans are never persisted: one plan per query.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{clause::ClauseId, field::FieldValue};

/// Name used in drafts to address the clause text itself.
pub const CLAUSE_TEXT: &str = "clause";

// ─── Drafts ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Comparator {
  Eq,
  Ne,
  Gt,
  Ge,
  Lt,
  Le,
  Contains,
  NotNull,
}

/// An unvalidated predicate as proposed by an interpreter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPredicate {
  /// A field name, or [`CLAUSE_TEXT`].
  pub field: String,
  pub op:    Comparator,
  #[serde(default)]
  pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrder {
  pub field:      String,
  #[serde(default)]
  pub descending: bool,
}

/// Natural-language query, structured but not yet checked against a schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
  #[serde(default)]
  pub targets:    Vec<String>,
  #[serde(default)]
  pub predicates: Vec<DraftPredicate>,
  #[serde(default)]
  pub order_by:   Option<DraftOrder>,
}

// ─── Compiled plan ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum Subject {
  ClauseText,
  Field(String),
}

/// A literal already coerced for the comparison it takes part in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Operand {
  Number(f64),
  Date(NaiveDate),
  Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
  pub subject:    Subject,
  pub comparator: Comparator,
  pub operand:    Option<Operand>,
}

impl Predicate {
  pub fn not_null(field: impl Into<String>) -> Self {
    Self { subject: Subject::Field(field.into()), comparator: Comparator::NotNull, operand: None }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ordering {
  /// Clause ingestion order.
  #[default]
  Insertion,
  Field { field: String, descending: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
  pub targets:    Vec<String>,
  pub predicates: Vec<Predicate>,
  pub ordering:   Ordering,
}

impl QueryPlan {
  /// Every field name the plan reads.
  pub fn referenced_fields(&self) -> impl Iterator<Item = &str> {
    let from_predicates = self.predicates.iter().filter_map(|p| match &p.subject {
      Subject::Field(f) => Some(f.as_str()),
      Subject::ClauseText => None,
    });
    let from_order = match &self.ordering {
      Ordering::Field { field, .. } => Some(field.as_str()),
      Ordering::Insertion => None,
    };
    self.targets.iter().map(String::as_str).chain(from_predicates).chain(from_order)
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// One output row: the clause and the requested field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
  pub clause_id: ClauseId,
  pub clause:    String,
  pub values:    BTreeMap<String, Option<FieldValue>>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn draft_deserialises_with_defaults() {
    let draft: PlanDraft = serde_json::from_value(json!({
      "targets": ["fee"],
      "predicates": [{ "field": "fee", "op": "gt", "value": 1000 }]
    }))
    .unwrap();
    assert_eq!(draft.targets, vec!["fee"]);
    assert_eq!(draft.predicates[0].op, Comparator::Gt);
    assert!(draft.order_by.is_none());
  }

  #[test]
  fn referenced_fields_cover_targets_predicates_and_order() {
    let plan = QueryPlan {
      targets:    vec!["company".into()],
      predicates: vec![
        Predicate::not_null("amount"),
        Predicate {
          subject:    Subject::ClauseText,
          comparator: Comparator::Contains,
          operand:    Some(Operand::Text("termination".into())),
        },
      ],
      ordering:   Ordering::Field { field: "effective_date".into(), descending: true },
    };
    let fields: Vec<_> = plan.referenced_fields().collect();
    assert_eq!(fields, vec!["company", "amount", "effective_date"]);
  }
}
