//! Prompts for each capability and parsers for the JSON they ask back.
//!
//! Every prompt requests a single JSON object so the client can run in JSON
//! mode. Parsers are strict about shape and lenient about casing.

use clausedb_core::{
  capability::{Extracted, Verdict},
  clause::Clause,
  coerce::is_absent_marker,
  field::{FieldDescriptor, FieldType, sanitize_field_name},
  plan::PlanDraft,
  record::FieldProposal,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// A system message and a user message.
pub struct Prompt {
  pub system: &'static str,
  pub user:   String,
}

fn describe_fields(fields: &[FieldDescriptor]) -> String {
  if fields.is_empty() {
    return "(none)".into();
  }
  fields
    .iter()
    .map(|f| {
      let mut line = format!("- {} ({})", f.name, f.field_type);
      if let Some(parent) = &f.parent {
        line.push_str(&format!(", refines {parent}"));
      }
      if let Some(description) = &f.description {
        line.push_str(&format!(": {description}"));
      }
      line
    })
    .collect::<Vec<_>>()
    .join("\n")
}

fn parse_object<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
  serde_json::from_str(content.trim()).map_err(|e| Error::Parse(format!("{e}: {content}")))
}

// ─── Classification ──────────────────────────────────────────────────────────

pub fn classify(query: &str, fields: &[FieldDescriptor]) -> Prompt {
  Prompt {
    system: "You route questions about a table of legal clauses. Answer in JSON.",
    user:   format!(
      "Columns already extracted for every clause:\n{}\n\n\
       Question: {query}\n\n\
       Reply {{\"verdict\": \"hit\"}} if the question can be answered from these columns \
       and the clause text alone, {{\"verdict\": \"miss\"}} if it needs a value that no \
       column holds yet, or {{\"verdict\": \"unsure\"}} if you cannot tell.",
      describe_fields(fields),
    ),
  }
}

#[derive(Deserialize)]
struct VerdictAnswer {
  verdict: String,
}

pub fn parse_verdict(content: &str) -> Result<Verdict> {
  let answer: VerdictAnswer = parse_object(content)?;
  match answer.verdict.trim().to_ascii_lowercase().as_str() {
    "hit" => Ok(Verdict::Hit),
    "miss" => Ok(Verdict::Miss),
    "unsure" => Ok(Verdict::Unsure),
    other => Err(Error::Parse(format!("unknown verdict {other:?}"))),
  }
}

// ─── Naming ──────────────────────────────────────────────────────────────────

pub fn propose(query: &str, fields: &[FieldDescriptor]) -> Prompt {
  Prompt {
    system: "You design columns for a table of legal clauses. Answer in JSON.",
    user:   format!(
      "Existing columns:\n{}\n\n\
       Question: {query}\n\n\
       Name the single new column that must be extracted from each clause to answer the \
       question. If it narrows one of the existing columns (for example penalty_amount \
       narrows amount), give that column as the parent.\n\
       Reply {{\"name\": snake_case name or null, \"parent\": existing column or null, \
       \"type\": \"numeric\" | \"text\" | \"date\" | \"categorical\" | null, \
       \"description\": short phrase describing the value}}. \
       Use null for name if no single column fits.",
      describe_fields(fields),
    ),
  }
}

#[derive(Deserialize)]
struct ProposalAnswer {
  name:        Option<String>,
  #[serde(default)]
  parent:      Option<String>,
  #[serde(default, rename = "type")]
  field_type:  Option<String>,
  #[serde(default)]
  description: Option<String>,
}

/// Blank or placeholder strings such as `"none"` count as missing.
fn present(value: Option<String>) -> Option<String> {
  value.map(|s| s.trim().to_owned()).filter(|s| !is_absent_marker(s))
}

pub fn parse_proposal(content: &str) -> Result<Option<FieldProposal>> {
  let answer: ProposalAnswer = parse_object(content)?;
  let Some(raw) = present(answer.name) else {
    return Ok(None);
  };
  let name = sanitize_field_name(&raw).map_err(|e| Error::Parse(e.to_string()))?;
  Ok(Some(FieldProposal {
    name,
    parent: present(answer.parent),
    type_hint: present(answer.field_type).and_then(|t| t.to_ascii_lowercase().parse::<FieldType>().ok()),
    description: present(answer.description),
  }))
}

// ─── Extraction ──────────────────────────────────────────────────────────────

fn value_rules(hint: Option<FieldType>) -> &'static str {
  match hint {
    Some(FieldType::Numeric) => {
      "Return a plain number without currency symbols or thousands separators; \
       a percentage such as 10% becomes 0.1."
    }
    Some(FieldType::Date) => "Return the date as YYYY-MM-DD.",
    Some(FieldType::Text) | Some(FieldType::Categorical) => "Return the text as written in the clause.",
    None => "Return a number, a YYYY-MM-DD date or the text as written, whichever fits.",
  }
}

pub fn extract(clause: &Clause, field: &FieldProposal) -> Prompt {
  let meaning = field.description.as_deref().unwrap_or(&field.name);
  Prompt {
    system: "You extract single values from legal clauses. Answer in JSON.",
    user:   format!(
      "Field: {} ({meaning})\n\nClause: {}\n\n{} \
       Reply {{\"value\": ...}} with the value, or {{\"value\": null}} if the clause \
       does not state it.",
      field.name,
      clause.text,
      value_rules(field.type_hint),
    ),
  }
}

#[derive(Deserialize)]
struct ExtractAnswer {
  #[serde(default)]
  value: Value,
}

pub fn parse_extracted(content: &str) -> Result<Extracted> {
  let answer: ExtractAnswer = parse_object(content)?;
  match answer.value {
    Value::Null => Ok(Extracted::Absent),
    Value::String(s) if is_absent_marker(&s) => Ok(Extracted::Absent),
    Value::Array(_) | Value::Object(_) => Err(Error::Parse("value is not a scalar".into())),
    value => Ok(Extracted::Value(value)),
  }
}

// ─── Interpretation ──────────────────────────────────────────────────────────

pub fn interpret(query: &str, fields: &[FieldDescriptor], focus: &[String]) -> Prompt {
  let focus = if focus.is_empty() { "(none)".to_owned() } else { focus.join(", ") };
  Prompt {
    system: "You translate questions about legal clauses into structured filters. Answer in JSON.",
    user:   format!(
      "Columns:\n{}\n\
       The clause text itself is addressed as \"clause\".\n\
       Columns already tied to this question: {focus}\n\n\
       Question: {query}\n\n\
       Reply {{\"targets\": [columns to show], \
       \"predicates\": [{{\"field\": column or \"clause\", \
       \"op\": \"eq\" | \"ne\" | \"gt\" | \"ge\" | \"lt\" | \"le\" | \"contains\" | \"not_null\", \
       \"value\": literal or null}}], \
       \"order_by\": {{\"field\": column, \"descending\": bool}} or null}}. \
       Use only the listed columns. Percentages are decimals and dates are YYYY-MM-DD.",
      describe_fields(fields),
    ),
  }
}

pub fn parse_draft(content: &str) -> Result<PlanDraft> { parse_object(content) }
