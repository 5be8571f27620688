//! Field descriptors and typed field values.
//!
//! Every field carries a declared [`FieldType`] fixed at merge time. Values are
//! stored already coerced to that type; the registry never holds free-form
//! untyped attributes.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result, coerce};

/// Column names owned by the clause table itself.
pub const RESERVED_NAMES: &[&str] = &["clause", "clause_id"];

// ─── Types ───────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldType {
  Numeric,
  Text,
  Date,
  Categorical,
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A non-null, typed cell value. Absence is modelled as `Option<FieldValue>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
  Number(f64),
  Date(NaiveDate),
  Text(String),
  Category(String),
}

impl FieldValue {
  pub fn field_type(&self) -> FieldType {
    match self {
      Self::Number(_) => FieldType::Numeric,
      Self::Date(_) => FieldType::Date,
      Self::Text(_) => FieldType::Text,
      Self::Category(_) => FieldType::Categorical,
    }
  }

  /// Numeric view of the value. Text is coerced (currency symbols, thousands
  /// separators and percentages are understood); dates have no numeric view.
  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      Self::Text(s) | Self::Category(s) => coerce::parse_number(s),
      Self::Date(_) => None,
    }
  }

  pub fn as_date(&self) -> Option<NaiveDate> {
    match self {
      Self::Date(d) => Some(*d),
      Self::Text(s) | Self::Category(s) => coerce::parse_date(s),
      Self::Number(_) => None,
    }
  }

  /// Convert to `target`, or `None` when the value has no representation in
  /// that type.
  pub fn convert(&self, target: FieldType) -> Option<FieldValue> {
    match target {
      FieldType::Numeric => self.as_f64().map(Self::Number),
      FieldType::Date => self.as_date().map(Self::Date),
      FieldType::Text => Some(Self::Text(self.to_string())),
      FieldType::Categorical => Some(Self::Category(self.to_string())),
    }
  }

  /// Decode a value stored as text for a column of type `ty`.
  pub fn decode(ty: FieldType, raw: &str) -> Result<Self> {
    let invalid = || Error::Coercion { value: raw.to_owned(), expected: ty };
    match ty {
      FieldType::Numeric => coerce::parse_number(raw).map(Self::Number).ok_or_else(invalid),
      FieldType::Date => coerce::parse_date(raw).map(Self::Date).ok_or_else(invalid),
      FieldType::Text => Ok(Self::Text(raw.to_owned())),
      FieldType::Categorical => Ok(Self::Category(raw.to_owned())),
    }
  }
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
      Self::Number(n) => write!(f, "{n}"),
      Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
      Self::Text(s) | Self::Category(s) => f.write_str(s),
    }
  }
}

// ─── Descriptor ──────────────────────────────────────────────────────────────

/// Schema metadata for one extractable attribute.
///
/// Parent references always point at a field registered earlier, so the parent
/// graph is a forest by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
  pub name:        String,
  pub field_type:  FieldType,
  pub parent:      Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl FieldDescriptor {
  pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
    Self { name: name.into(), field_type, parent: None, description: None }
  }

  pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
    self.parent = Some(parent.into());
    self
  }

  pub fn with_description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  /// The name split on `_`, e.g. `termination_fee` → `["termination", "fee"]`.
  pub fn name_tokens(&self) -> Vec<&str> { name_tokens(&self.name) }
}

pub fn name_tokens(name: &str) -> Vec<&str> {
  name.split('_').filter(|t| !t.is_empty()).collect()
}

// ─── Naming ──────────────────────────────────────────────────────────────────

/// Turn an arbitrary label into a schema-safe column name.
///
/// Lower-cases, replaces every non-alphanumeric character with `_`, collapses
/// runs of `_`, trims them from both ends and prefixes a leading digit with
/// `_`. Empty results and reserved column names are rejected.
pub fn sanitize_field_name(raw: &str) -> Result<String> {
  let mut out = String::with_capacity(raw.len());
  for c in raw.trim().chars().flat_map(char::to_lowercase) {
    if c.is_ascii_alphanumeric() {
      out.push(c);
    } else if !out.ends_with('_') {
      out.push('_');
    }
  }
  let trimmed = out.trim_matches('_');
  if trimmed.is_empty() || RESERVED_NAMES.contains(&trimmed) {
    return Err(Error::UnresolvedField(raw.to_owned()));
  }
  if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
    Ok(format!("_{trimmed}"))
  } else {
    Ok(trimmed.to_owned())
  }
}

const NUMERIC_HINTS: &[&str] = &[
  "amount", "price", "cost", "fee", "percentage", "rate", "number", "count",
  "quantity", "score",
];

const DATE_HINTS: &[&str] = &["date", "deadline", "expiry", "expiration"];

/// Guess a field's type from its name alone.
pub fn type_hint_for_name(name: &str) -> Option<FieldType> {
  let tokens = name_tokens(name);
  if tokens.iter().any(|t| DATE_HINTS.contains(t)) {
    Some(FieldType::Date)
  } else if tokens.iter().any(|t| NUMERIC_HINTS.contains(t)) {
    Some(FieldType::Numeric)
  } else {
    None
  }
}
