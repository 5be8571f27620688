//! Plain-text rendering for terminal output.

use std::fmt::Write as _;

use clausedb_core::{field::FieldDescriptor, plan::ResultRow, response::QueryResponse};
use clausedb_engine::{QueryFailure, RebuildReport, selftest::SelfTestReport};

const CLAUSE_WIDTH: usize = 60;
const ID_WIDTH: usize = 8;

fn truncate(text: &str, width: usize) -> String {
  let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
  if flat.chars().count() <= width {
    return flat;
  }
  let mut out: String = flat.chars().take(width.saturating_sub(1)).collect();
  out.push('…');
  out
}

fn describe_field(field: &FieldDescriptor) -> String {
  match &field.parent {
    Some(parent) => format!("{} ({}, parent {parent})", field.name, field.field_type),
    None => format!("{} ({})", field.name, field.field_type),
  }
}

/// Render rows as an aligned table: id, one column per value, clause text.
pub fn rows_table(rows: &[ResultRow]) -> String {
  let Some(first) = rows.first() else {
    return "(no rows)\n".into();
  };
  let columns: Vec<&String> = first.values.keys().collect();
  let cell = |row: &ResultRow, column: &str| {
    row.values.get(column).and_then(Option::as_ref).map(ToString::to_string).unwrap_or_default()
  };
  let widths: Vec<usize> = columns
    .iter()
    .map(|c| rows.iter().map(|r| cell(r, c).chars().count()).chain([c.len()]).max().unwrap_or(0))
    .collect();

  let mut out = String::new();
  let _ = write!(out, "{:ID_WIDTH$}", "id");
  for (column, width) in columns.iter().zip(&widths) {
    let _ = write!(out, "  {column:width$}");
  }
  let _ = writeln!(out, "  clause");
  for row in rows {
    let id: String = row.clause_id.as_str().chars().take(ID_WIDTH).collect();
    let _ = write!(out, "{id:ID_WIDTH$}");
    for (column, width) in columns.iter().zip(&widths) {
      let _ = write!(out, "  {:width$}", cell(row, column));
    }
    let _ = writeln!(out, "  {}", truncate(&row.clause, CLAUSE_WIDTH));
  }
  out
}

pub fn response(response: &QueryResponse) -> String {
  let mut out = format!("Classification: {}\n\nProcessing log:\n", response.classification);
  for line in response.processing_log.lines() {
    let _ = writeln!(out, "  {line}");
  }
  if let Some(field) = &response.schema_delta {
    let _ = writeln!(out, "\nSchema delta: added {}", describe_field(field));
  }
  let _ = writeln!(out, "\n{} rows", response.result_rows.len());
  out.push_str(&rows_table(&response.result_rows));
  out
}

pub fn failure(failure: &QueryFailure) -> String {
  let mut out = format!("Error: {failure}\n");
  if failure.is_retryable() {
    out.push_str("The request may be retried.\n");
  }
  out.push_str("\nProcessing log:\n");
  for line in failure.log.lines() {
    let _ = writeln!(out, "  {line}");
  }
  out
}

pub fn schema(fields: &[FieldDescriptor]) -> String {
  if fields.is_empty() {
    return "(no fields)\n".into();
  }
  fields.iter().map(|f| format!("{}\n", describe_field(f))).collect()
}

pub fn rebuild(report: &RebuildReport) -> String {
  let mut out = format!("Ingested {} clauses\n", report.clauses);
  for field in &report.fields {
    let _ = writeln!(out, "  {}: {} values", field.field, field.values_written);
  }
  out
}

pub fn self_test(report: &SelfTestReport) -> String {
  let mut out = String::new();
  for case in &report.cases {
    let mark = if case.passed { "ok  " } else { "FAIL" };
    let _ = writeln!(out, "{mark} {}: {}", case.name, case.actual);
    if !case.passed {
      let _ = writeln!(out, "     expected {}", case.expected);
      for line in case.detail.lines() {
        let _ = writeln!(out, "     {line}");
      }
    }
  }
  let _ = writeln!(out, "\n{} passed, {} failed", report.passed, report.failed);
  out
}
