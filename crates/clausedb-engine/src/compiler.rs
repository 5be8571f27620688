//! Query compilation and execution.
//!
//! The interpreter proposes a [`PlanDraft`]; [`build_plan`] checks it against
//! the registered fields and coerces its literals. [`execute`] evaluates the
//! plan over a registry snapshot without touching the registry itself.

use std::{cmp, sync::Arc};

use clausedb_core::{
  Error, Result,
  capability::QueryInterpreter,
  coerce::{parse_date, parse_number},
  field::{FieldDescriptor, FieldType, FieldValue},
  plan::{
    CLAUSE_TEXT, Comparator, DraftPredicate, Operand, Ordering, PlanDraft, Predicate, QueryPlan,
    ResultRow, Subject,
  },
  registry::Row,
};
use serde_json::Value;
use tracing::warn;

use crate::lexical::LexicalInterpreter;

/// Where a compiled plan's draft came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftSource {
  Interpreter,
  /// The interpreter failed; the lexical draft was used.
  Fallback(String),
}

pub struct Compiler {
  interpreter: Arc<dyn QueryInterpreter>,
  fallback:    LexicalInterpreter,
}

impl Compiler {
  pub fn new(interpreter: Arc<dyn QueryInterpreter>) -> Self {
    Self { interpreter, fallback: LexicalInterpreter }
  }

  /// Compile `query` into a plan over `fields`.
  ///
  /// `focus` names fields already tied to the query; they are targeted when
  /// the draft names none.
  pub async fn compile(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
    focus: &[String],
  ) -> Result<(QueryPlan, DraftSource)> {
    let (mut draft, source) = match self.interpreter.interpret(query, fields, focus).await {
      Ok(draft) => (draft, DraftSource::Interpreter),
      Err(e) => {
        warn!(error = %e, "interpreter failed, compiling lexically");
        (self.fallback.draft(query, fields, focus), DraftSource::Fallback(e.to_string()))
      }
    };
    if draft.targets.is_empty() {
      draft.targets = focus.to_vec();
    }
    Ok((build_plan(draft, fields)?, source))
  }
}

fn lookup<'a>(fields: &'a [FieldDescriptor], name: &str) -> Result<&'a FieldDescriptor> {
  fields
    .iter()
    .find(|f| f.name == name)
    .ok_or_else(|| Error::SchemaInconsistency(format!("plan references unknown field {name:?}")))
}

fn literal_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.trim().to_owned()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn number_literal(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => parse_number(s),
    _ => None,
  }
}

fn date_literal(value: &Value) -> Option<Operand> {
  match value {
    Value::String(s) => parse_date(s).map(Operand::Date),
    _ => None,
  }
}

/// Coerce a draft literal for comparison against a field of type `ty`.
fn operand_for(ty: FieldType, op: Comparator, value: &Value) -> Result<Option<Operand>> {
  let mismatch = || Error::Coercion { value: value.to_string(), expected: ty };
  let operand = match (op, ty) {
    (Comparator::NotNull, _) => return Ok(None),
    (Comparator::Contains, _) => literal_text(value).map(Operand::Text),
    (_, FieldType::Numeric) => number_literal(value).map(Operand::Number),
    (_, FieldType::Date) => date_literal(value),
    (Comparator::Eq | Comparator::Ne, _) => literal_text(value).map(Operand::Text),
    // Ordering comparisons on text columns coerce the stored text at
    // execution time.
    _ => number_literal(value)
      .map(Operand::Number)
      .or_else(|| date_literal(value)),
  };
  operand.map(Some).ok_or_else(mismatch)
}

fn build_predicate(draft: &DraftPredicate, fields: &[FieldDescriptor]) -> Result<Predicate> {
  if draft.field == CLAUSE_TEXT {
    let operand = match draft.op {
      Comparator::Contains | Comparator::Eq | Comparator::Ne => literal_text(&draft.value).map(Operand::Text),
      _ => None,
    };
    return match operand {
      Some(operand) => Ok(Predicate { subject: Subject::ClauseText, comparator: draft.op, operand: Some(operand) }),
      None => Err(Error::Coercion { value: draft.value.to_string(), expected: FieldType::Text }),
    };
  }
  let field = lookup(fields, &draft.field)?;
  Ok(Predicate {
    subject:    Subject::Field(field.name.clone()),
    comparator: draft.op,
    operand:    operand_for(field.field_type, draft.op, &draft.value)?,
  })
}

/// Validate `draft` against `fields` and produce an executable plan.
///
/// Every target also gets a not-null predicate: a row is only returned when
/// it has a value for each field the query asks about.
pub fn build_plan(draft: PlanDraft, fields: &[FieldDescriptor]) -> Result<QueryPlan> {
  let mut targets: Vec<String> = Vec::new();
  for target in &draft.targets {
    let field = lookup(fields, target)?;
    if !targets.contains(&field.name) {
      targets.push(field.name.clone());
    }
  }

  let mut predicates: Vec<Predicate> = targets.iter().map(Predicate::not_null).collect();
  for draft_predicate in &draft.predicates {
    predicates.push(build_predicate(draft_predicate, fields)?);
  }

  let ordering = match &draft.order_by {
    Some(order) => Ordering::Field {
      field:      lookup(fields, &order.field)?.name.clone(),
      descending: order.descending,
    },
    None => Ordering::Insertion,
  };

  Ok(QueryPlan { targets, predicates, ordering })
}

// ─── Execution ───────────────────────────────────────────────────────────────

fn eq_text(a: &str, b: &str) -> bool { a.trim().eq_ignore_ascii_case(b.trim()) }

fn compare_value(value: &FieldValue, comparator: Comparator, operand: Option<&Operand>) -> bool {
  let Some(operand) = operand else {
    return comparator == Comparator::NotNull;
  };
  let ordering = match operand {
    Operand::Number(n) => value.as_f64().and_then(|v| v.partial_cmp(n)),
    Operand::Date(d) => value.as_date().map(|v| v.cmp(d)),
    Operand::Text(t) => match comparator {
      Comparator::Contains => {
        return value.to_string().to_lowercase().contains(&t.to_lowercase());
      }
      Comparator::Eq => return eq_text(&value.to_string(), t),
      Comparator::Ne => return !eq_text(&value.to_string(), t),
      _ => Some(value.to_string().to_lowercase().cmp(&t.to_lowercase())),
    },
  };
  let Some(ordering) = ordering else {
    return false;
  };
  match comparator {
    Comparator::Eq => ordering.is_eq(),
    Comparator::Ne => ordering.is_ne(),
    Comparator::Gt => ordering.is_gt(),
    Comparator::Ge => ordering.is_ge(),
    Comparator::Lt => ordering.is_lt(),
    Comparator::Le => ordering.is_le(),
    Comparator::Contains => value.to_string().to_lowercase().contains(&operand_text(operand).to_lowercase()),
    Comparator::NotNull => true,
  }
}

fn operand_text(operand: &Operand) -> String {
  match operand {
    Operand::Number(n) => FieldValue::Number(*n).to_string(),
    Operand::Date(d) => FieldValue::Date(*d).to_string(),
    Operand::Text(t) => t.clone(),
  }
}

fn matches(row: &Row, predicate: &Predicate) -> bool {
  match &predicate.subject {
    Subject::ClauseText => {
      let text = &row.clause.text;
      match (&predicate.comparator, &predicate.operand) {
        (Comparator::Contains, Some(operand)) => {
          text.to_lowercase().contains(&operand_text(operand).to_lowercase())
        }
        (Comparator::Eq, Some(operand)) => eq_text(text, &operand_text(operand)),
        (Comparator::Ne, Some(operand)) => !eq_text(text, &operand_text(operand)),
        _ => false,
      }
    }
    // A null never satisfies a predicate, `Ne` included.
    Subject::Field(field) => row
      .value(field)
      .is_some_and(|v| compare_value(v, predicate.comparator, predicate.operand.as_ref())),
  }
}

/// Null-last ordering of two optional values: numerically when both have a
/// numeric view, then by date, then case-insensitively as text.
fn compare_optional(a: Option<&FieldValue>, b: Option<&FieldValue>) -> cmp::Ordering {
  match (a, b) {
    (None, None) => cmp::Ordering::Equal,
    (None, Some(_)) => cmp::Ordering::Greater,
    (Some(_), None) => cmp::Ordering::Less,
    (Some(a), Some(b)) => {
      if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        x.total_cmp(&y)
      } else if let (Some(x), Some(y)) = (a.as_date(), b.as_date()) {
        x.cmp(&y)
      } else {
        a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase())
      }
    }
  }
}

/// Evaluate `plan` over a snapshot of registry rows.
///
/// Rows keep ingestion order unless the plan orders by a field. Each result
/// carries the value of every field the plan references.
pub fn execute(plan: &QueryPlan, rows: Vec<Row>) -> Vec<ResultRow> {
  let mut selected: Vec<Row> = rows
    .into_iter()
    .filter(|row| plan.predicates.iter().all(|p| matches(row, p)))
    .collect();

  if let Ordering::Field { field, descending } = &plan.ordering {
    selected.sort_by(|a, b| {
      let (a, b) = (a.value(field), b.value(field));
      match (a, b, descending) {
        (Some(_), Some(_), true) => compare_optional(b, a),
        _ => compare_optional(a, b),
      }
    });
  }

  let mut columns: Vec<&str> = Vec::new();
  for field in plan.referenced_fields() {
    if !columns.contains(&field) {
      columns.push(field);
    }
  }

  selected
    .into_iter()
    .map(|row| ResultRow {
      values:    columns.iter().map(|c| ((*c).to_owned(), row.value(c).cloned())).collect(),
      clause_id: row.clause.clause_id,
      clause:    row.clause.text,
    })
    .collect()
}
