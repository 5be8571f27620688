//! Handlers for `/query` and `/schema`.

use std::sync::Arc;

use axum::{Json, extract::State};
use clausedb_core::{field::FieldDescriptor, registry::SchemaRegistry, response::QueryResponse};
use serde::Deserialize;

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryBody {
  #[serde(alias = "query")]
  pub text: String,
}

/// `POST /query` — body: `{"text":"Show termination fees"}`
pub async fn handler<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(body): Json<QueryBody>,
) -> Result<Json<QueryResponse>, ApiError>
where
  R: SchemaRegistry + 'static,
{
  let query = body.text.trim();
  if query.is_empty() {
    return Err(ApiError::BadRequest("query must not be empty".into()));
  }
  Ok(Json(state.engine.handle_query(query).await?))
}

/// `GET /schema`
pub async fn schema<R>(
  State(state): State<Arc<ApiState<R>>>,
) -> Result<Json<Vec<FieldDescriptor>>, ApiError>
where
  R: SchemaRegistry + 'static,
{
  Ok(Json(state.engine.list_schema().await?))
}
