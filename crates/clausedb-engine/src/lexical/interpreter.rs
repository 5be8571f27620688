use async_trait::async_trait;
use clausedb_core::{
  capability::{CapabilityError, QueryInterpreter},
  field::FieldDescriptor,
  plan::{CLAUSE_TEXT, Comparator, DraftOrder, DraftPredicate, PlanDraft},
};
use serde_json::{Value, json};

use super::{
  Mention, find_mentions, parse,
  parse::{Literal, SearchMarker},
};

/// Structures a query from its parsed phrases.
///
/// Each comparison applies to the nearest field mentioned before it (or the
/// first focus field). Fields named after an ordering word are the sort key.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalInterpreter;

fn literal_json(literal: &Literal) -> Value {
  match literal {
    Literal::Number(n) => json!(n),
    Literal::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
    Literal::Text(s) => json!(s),
  }
}

/// The last mention ending before token `at`.
fn preceding(mentions: &[Mention], at: usize) -> Option<&Mention> {
  mentions.iter().filter(|m| m.end < at).max_by_key(|m| m.end)
}

impl LexicalInterpreter {
  pub fn draft(&self, query: &str, fields: &[FieldDescriptor], focus: &[String]) -> PlanDraft {
    let parsed = parse(query);
    let mentions = find_mentions(&parsed, fields);

    let mut targets: Vec<String> = mentions.iter().map(|m| m.field.clone()).collect();
    for f in focus {
      if !targets.contains(f) {
        targets.push(f.clone());
      }
    }
    let fallback = focus.first().or_else(|| targets.first()).cloned();

    let mut predicates = Vec::new();
    for cmp in &parsed.comparisons {
      let Some(operand) = &cmp.operand else { continue };
      let field = preceding(&mentions, cmp.at).map(|m| m.field.clone()).or_else(|| fallback.clone());
      if let Some(field) = field {
        predicates.push(DraftPredicate { field, op: cmp.op, value: literal_json(operand) });
      }
    }

    for search in &parsed.searches {
      let field = match search.marker {
        SearchMarker::Contains if search.quoted => preceding(&mentions, search.at)
          .map(|m| m.field.clone())
          .unwrap_or_else(|| CLAUSE_TEXT.to_owned()),
        _ => CLAUSE_TEXT.to_owned(),
      };
      predicates.push(DraftPredicate {
        field,
        op: Comparator::Contains,
        value: json!(search.phrase),
      });
    }

    let order_by = parsed.order.as_ref().and_then(|hint| {
      let field = mentions
        .iter()
        .find(|m| m.start > hint.at)
        .or_else(|| preceding(&mentions, hint.at))
        .map(|m| m.field.clone())
        .or_else(|| fallback.clone())?;
      Some(DraftOrder { field, descending: hint.descending })
    });

    PlanDraft { targets, predicates, order_by }
  }
}

#[async_trait]
impl QueryInterpreter for LexicalInterpreter {
  async fn interpret(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
    focus: &[String],
  ) -> Result<PlanDraft, CapabilityError> {
    Ok(self.draft(query, fields, focus))
  }
}

#[cfg(test)]
mod tests {
  use clausedb_core::field::FieldType;

  use super::*;

  fn fields() -> Vec<FieldDescriptor> {
    vec![
      FieldDescriptor::new("company", FieldType::Text),
      FieldDescriptor::new("termination_fee", FieldType::Numeric),
      FieldDescriptor::new("effective_date", FieldType::Date),
    ]
  }

  #[test]
  fn comparison_binds_to_the_preceding_field() {
    let draft = LexicalInterpreter.draft(
      "companies with termination fees greater than 1000",
      &fields(),
      &[],
    );
    assert_eq!(draft.targets, vec!["company", "termination_fee"]);
    assert_eq!(draft.predicates, vec![DraftPredicate {
      field: "termination_fee".into(),
      op:    Comparator::Gt,
      value: json!(1000.0),
    }]);
  }

  #[test]
  fn focus_fields_are_targets_and_default_subjects() {
    let draft = LexicalInterpreter.draft("early exit costs over 50", &fields(), &["exit_cost".into()]);
    assert_eq!(draft.targets, vec!["exit_cost"]);
    assert_eq!(draft.predicates[0].field, "exit_cost");
  }

  #[test]
  fn quoted_contains_targets_the_field_and_mentions_target_the_text() {
    let draft = LexicalInterpreter.draft("company containing 'Corp'", &fields(), &[]);
    assert_eq!(draft.predicates[0].field, "company");
    assert_eq!(draft.predicates[0].op, Comparator::Contains);

    let draft = LexicalInterpreter.draft("clauses mentioning arbitration", &fields(), &[]);
    assert_eq!(draft.predicates[0].field, CLAUSE_TEXT);
    assert_eq!(draft.predicates[0].value, json!("arbitration"));
  }

  #[test]
  fn ordering_words_pick_the_sort_field() {
    let draft = LexicalInterpreter.draft("companies sorted by effective date descending", &fields(), &[]);
    assert_eq!(draft.order_by, Some(DraftOrder { field: "effective_date".into(), descending: true }));

    let draft = LexicalInterpreter.draft("highest termination fees", &fields(), &[]);
    assert_eq!(draft.order_by, Some(DraftOrder { field: "termination_fee".into(), descending: true }));
  }

  #[test]
  fn dates_are_passed_as_iso_strings() {
    let draft = LexicalInterpreter.draft("effective date after 2024-03-01", &fields(), &[]);
    assert_eq!(draft.predicates[0].value, json!("2024-03-01"));
    assert_eq!(draft.predicates[0].op, Comparator::Gt);
  }
}
