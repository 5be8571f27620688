//! Encoding and decoding helpers between domain types and their SQLite
//! representations.
//!
//! Field values are stored as text in their display form (integers without a
//! decimal part, ISO dates) and decoded against the column's declared type.

use std::str::FromStr;

use clausedb_core::field::{FieldDescriptor, FieldType, FieldValue};

use crate::{Error, Result};

// ─── Columns ─────────────────────────────────────────────────────────────────

/// Quoted column identifier for a field. The prefix keeps field columns clear
/// of the fixed `clauses` columns.
pub fn column(field: &str) -> String { format!("\"f_{}\"", field.replace('"', "\"\"")) }

// ─── Values ──────────────────────────────────────────────────────────────────

pub fn encode_value(v: &FieldValue) -> String { v.to_string() }

pub fn decode_value(ty: FieldType, raw: &str) -> Result<FieldValue> {
  FieldValue::decode(ty, raw).map_err(|_| Error::Corrupt { what: "field value", value: raw.to_owned() })
}

// ─── Field types ─────────────────────────────────────────────────────────────

pub fn encode_field_type(ty: FieldType) -> String { ty.to_string() }

pub fn decode_field_type(s: &str) -> Result<FieldType> {
  FieldType::from_str(s).map_err(|_| Error::Corrupt { what: "field type", value: s.to_owned() })
}

// ─── Descriptors ─────────────────────────────────────────────────────────────

/// A `fields` row as read from the database.
pub struct RawField {
  pub name:        String,
  pub field_type:  String,
  pub parent:      Option<String>,
  pub description: Option<String>,
}

impl RawField {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      name:        row.get(0)?,
      field_type:  row.get(1)?,
      parent:      row.get(2)?,
      description: row.get(3)?,
    })
  }

  pub fn into_descriptor(self) -> Result<FieldDescriptor> {
    Ok(FieldDescriptor {
      field_type:  decode_field_type(&self.field_type)?,
      name:        self.name,
      parent:      self.parent,
      description: self.description,
    })
  }
}
