use async_trait::async_trait;
use clausedb_core::{
  capability::{CapabilityError, Extracted, FieldExtractor},
  clause::Clause,
  coerce::{parse_date, parse_number},
  field::FieldType,
  record::FieldProposal,
};
use serde_json::Value;

/// Lead-ins allowed between a field label and its value.
const CONNECTORS: &[&str] = &[
  "in the amount of", "amounting to", "equal to", "shall be", "will be", "set at", "is", "are",
  "of", "=", ":", "-",
];

const MAX_TEXT_WORDS: usize = 8;

/// Extracts `<label>: <value>` style statements from clause text.
///
/// The label is the field name with spaces for underscores (plural forms
/// accepted) or the field description.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

fn labels(field: &FieldProposal) -> Vec<String> {
  let mut out = vec![field.name.trim_start_matches('_').replace('_', " ")];
  if let Some(d) = &field.description {
    let d = d.trim().to_ascii_lowercase();
    if !d.is_empty() && !out.contains(&d) {
      out.push(d);
    }
  }
  out
}

fn strip_connectors(mut rest: &str) -> &str {
  loop {
    let trimmed = rest.trim_start();
    let lower = trimmed.to_ascii_lowercase();
    let hit = CONNECTORS.iter().find(|c| {
      let wordy = c.ends_with(|ch: char| ch.is_ascii_alphabetic());
      lower.starts_with(**c)
        && !(wordy && lower[c.len()..].starts_with(|ch: char| ch.is_ascii_alphanumeric()))
    });
    match hit {
      Some(c) => rest = &trimmed[c.len()..],
      None => return trimmed,
    }
  }
}

/// Text following each whole-word occurrence of `label` in `text`.
fn after_label<'a>(text: &'a str, label: &str) -> Vec<&'a str> {
  let lower = text.to_ascii_lowercase();
  lower
    .match_indices(label)
    .filter_map(|(pos, _)| {
      let before_ok = lower[..pos].chars().next_back().is_none_or(|c| !c.is_ascii_alphanumeric());
      let mut end = pos + label.len();
      // Plural label: "termination fees".
      if lower[end..].starts_with('s') {
        end += 1;
      }
      let after_ok = lower[end..].chars().next().is_none_or(|c| !c.is_ascii_alphanumeric());
      (before_ok && after_ok).then(|| &text[end..])
    })
    .collect()
}

fn trim_value(s: &str) -> &str {
  s.trim().trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | ')'))
}

fn capture_number(rest: &str) -> Option<Value> {
  let chunk = trim_value(rest.split_whitespace().next()?);
  parse_number(chunk).map(|_| Value::String(chunk.to_owned()))
}

fn capture_date(rest: &str) -> Option<Value> {
  let words: Vec<&str> = rest.split_whitespace().take(3).collect();
  (1..=words.len()).rev().find_map(|n| {
    let candidate = trim_value(&words[..n].join(" ")).to_owned();
    parse_date(&candidate).map(|_| Value::String(candidate))
  })
}

fn capture_text(rest: &str) -> Option<Value> {
  let end = rest
    .char_indices()
    .find(|&(i, c)| {
      matches!(c, ';' | ',' | '\n')
        || (c == '.' && rest[i + 1..].chars().next().is_none_or(char::is_whitespace))
    })
    .map_or(rest.len(), |(i, _)| i);
  let clause = &rest[..end];
  let clause = clause.split(" and ").next().unwrap_or(clause);
  let words: Vec<&str> = clause.split_whitespace().take(MAX_TEXT_WORDS).collect();
  let value = trim_value(&words.join(" ")).to_owned();
  (!value.is_empty()).then_some(Value::String(value))
}

fn capture(rest: &str, hint: Option<FieldType>) -> Option<Value> {
  let rest = strip_connectors(rest);
  match hint {
    Some(FieldType::Numeric) => capture_number(rest),
    Some(FieldType::Date) => capture_date(rest),
    Some(FieldType::Text | FieldType::Categorical) => capture_text(rest),
    None => capture_date(rest).or_else(|| capture_number(rest)).or_else(|| capture_text(rest)),
  }
}

impl PatternExtractor {
  pub fn extract_now(&self, clause: &Clause, field: &FieldProposal) -> Extracted {
    labels(field)
      .iter()
      .flat_map(|label| after_label(&clause.text, label))
      .find_map(|rest| capture(rest, field.type_hint))
      .map_or(Extracted::Absent, Extracted::Value)
  }
}

#[async_trait]
impl FieldExtractor for PatternExtractor {
  async fn extract(
    &self,
    clause: &Clause,
    field: &FieldProposal,
  ) -> Result<Extracted, CapabilityError> {
    Ok(self.extract_now(clause, field))
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn run(text: &str, field: FieldProposal) -> Extracted {
    PatternExtractor.extract_now(&Clause::new(text), &field)
  }

  #[test]
  fn numeric_label_with_colon() {
    let field = FieldProposal::new("termination_fee").with_type_hint(FieldType::Numeric);
    assert_eq!(
      run("Another clause with company: ABC Inc and termination fee: $5,000.", field),
      Extracted::Value(json!("$5,000"))
    );
  }

  #[test]
  fn connector_words_and_plural_labels() {
    let field = FieldProposal::new("penalty_amount").with_type_hint(FieldType::Numeric);
    assert_eq!(
      run("Late delivery incurs penalty amounts of 250 per day.", field),
      Extracted::Value(json!("250"))
    );
  }

  #[test]
  fn text_stops_at_conjunction_or_punctuation() {
    assert_eq!(
      run("This is a test clause with company: Test Corp and effective date: 2024-01-01", FieldProposal::new("company")),
      Extracted::Value(json!("Test Corp"))
    );
    assert_eq!(
      run("Signed by company: Globex Inc. on behalf of itself.", FieldProposal::new("company")),
      Extracted::Value(json!("Globex Inc"))
    );
  }

  #[test]
  fn dates_may_span_several_words() {
    let field = FieldProposal::new("effective_date").with_type_hint(FieldType::Date);
    assert_eq!(
      run("The effective date is March 15, 2024, unless extended.", field),
      Extracted::Value(json!("March 15, 2024"))
    );
  }

  #[test]
  fn missing_label_or_partial_word_is_absent() {
    let field = FieldProposal::new("fee").with_type_hint(FieldType::Numeric);
    assert_eq!(run("Feedback: 12 responses", field.clone()), Extracted::Absent);
    assert_eq!(run("No charges apply.", field), Extracted::Absent);
  }
}
