//! The response returned to the presentation layer for one query.

use serde::Serialize;
use strum::Display;

use crate::{field::FieldDescriptor, log::ProcessingLog, plan::ResultRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Classification {
  Hit,
  Miss,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
  /// The first routing verdict for the query, before any schema change.
  pub classification: Classification,
  pub processing_log: ProcessingLog,
  pub result_rows:    Vec<ResultRow>,
  /// The field this query added to the schema, if any.
  pub schema_delta:   Option<FieldDescriptor>,
}
