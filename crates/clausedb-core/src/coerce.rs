//! Value coercion and type inference.
//!
//! Extraction output arrives as loosely-typed JSON. Everything that enters the
//! registry passes through [`coerce_value`] first; values that cannot be
//! represented in the target type are rejected rather than stored as-is.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde_json::Value;

use crate::{
  Error, Result,
  field::{FieldType, FieldValue},
};

/// Text columns with at most this many distinct values (and at least one
/// repeat) are inferred as categorical.
pub const CATEGORICAL_MAX_DISTINCT: usize = 5;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"];

const ABSENT_MARKERS: &[&str] = &["", "null", "none", "n/a", "na", "not present", "not found", "unknown"];

// ─── Scalars ─────────────────────────────────────────────────────────────────

/// Parse a number, tolerating currency symbols, thousands separators and a
/// trailing `%` (which divides by 100).
pub fn parse_number(raw: &str) -> Option<f64> {
  let s = raw.trim();
  let (body, percent) = match s.strip_suffix('%') {
    Some(body) => (body.trim_end(), true),
    None => (s, false),
  };
  let cleaned: String = body
    .chars()
    .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
    .collect();
  if cleaned.is_empty() {
    return None;
  }
  let n: f64 = cleaned.parse().ok()?;
  if !n.is_finite() {
    return None;
  }
  Some(if percent { n / 100.0 } else { n })
}

/// Parse a calendar date in one of the accepted formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
  let s = raw.trim();
  // ISO timestamps: keep the date part.
  let s = match s.char_indices().nth(10) {
    Some((i, 'T')) => &s[..i],
    _ => s,
  };
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Whether an extracted string is really a "not present" signal.
pub fn is_absent_marker(raw: &str) -> bool {
  ABSENT_MARKERS.contains(&raw.trim().to_ascii_lowercase().as_str())
}

// ─── JSON values ─────────────────────────────────────────────────────────────

fn text_of(raw: &Value) -> Option<String> {
  match raw {
    Value::Null => None,
    Value::String(s) => {
      let s = s.trim();
      (!s.is_empty()).then(|| s.to_owned())
    }
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    Value::Array(a) if a.is_empty() => None,
    other => Some(other.to_string()),
  }
}

/// Coerce an extracted JSON value to `ty`.
pub fn coerce_value(raw: &Value, ty: FieldType) -> Result<FieldValue> {
  let coerced = match (ty, raw) {
    (FieldType::Numeric, Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()).map(FieldValue::Number),
    (FieldType::Numeric, Value::String(s)) => parse_number(s).map(FieldValue::Number),
    (FieldType::Date, Value::String(s)) => parse_date(s).map(FieldValue::Date),
    (FieldType::Text, v) => text_of(v).map(FieldValue::Text),
    (FieldType::Categorical, v) => text_of(v).map(FieldValue::Category),
    _ => None,
  };
  coerced.ok_or_else(|| Error::Coercion { value: raw.to_string(), expected: ty })
}

/// The natural type of a single extracted value, or `None` for nulls and
/// blanks.
pub fn classify_value(raw: &Value) -> Option<FieldType> {
  match raw {
    Value::Null => None,
    Value::Number(_) => Some(FieldType::Numeric),
    Value::String(s) if s.trim().is_empty() => None,
    Value::String(s) if parse_number(s).is_some() => Some(FieldType::Numeric),
    Value::String(s) if parse_date(s).is_some() => Some(FieldType::Date),
    Value::Array(a) if a.is_empty() => None,
    _ => Some(FieldType::Text),
  }
}

// ─── Inference ───────────────────────────────────────────────────────────────

/// Infer a column type from its validated values.
///
/// The type held by the most values wins; a tie falls back to text. A text
/// result with few distinct values is narrowed to categorical. With no values
/// at all, `hint` (or text) is used.
pub fn infer_field_type(values: &[FieldValue], hint: Option<FieldType>) -> FieldType {
  if values.is_empty() {
    return hint.unwrap_or(FieldType::Text);
  }

  let (mut numeric, mut date, mut text) = (0usize, 0usize, 0usize);
  for v in values {
    match v.field_type() {
      FieldType::Numeric => numeric += 1,
      FieldType::Date => date += 1,
      FieldType::Text | FieldType::Categorical => text += 1,
    }
  }

  let top = numeric.max(date).max(text);
  let leaders = [numeric, date, text].iter().filter(|&&c| c == top).count();
  let base = if leaders > 1 || text == top {
    FieldType::Text
  } else if numeric == top {
    FieldType::Numeric
  } else {
    FieldType::Date
  };

  if base == FieldType::Text && looks_categorical(values) {
    FieldType::Categorical
  } else {
    base
  }
}

fn looks_categorical(values: &[FieldValue]) -> bool {
  let distinct: HashSet<String> = values.iter().map(|v| v.to_string().to_lowercase()).collect();
  distinct.len() <= CATEGORICAL_MAX_DISTINCT && values.len() > distinct.len()
}
