//! Handlers for `/admin/*`.

use std::{path::PathBuf, sync::Arc};

use axum::{Json, extract::State, http::StatusCode};
use clausedb_core::registry::SchemaRegistry;
use clausedb_engine::{RebuildReport, corpus::load_corpus, selftest::SelfTestReport};
use serde::Deserialize;
use tracing::info;

use crate::{ApiState, error::ApiError};

/// Overrides for a single rebuild. Omitted keys use the configured source.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RebuildBody {
  pub corpus_path:  Option<PathBuf>,
  pub clause_limit: Option<usize>,
  pub base_fields:  Option<Vec<String>>,
}

/// `POST /admin/rebuild`
pub async fn rebuild<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(body): Json<RebuildBody>,
) -> Result<Json<RebuildReport>, ApiError>
where
  R: SchemaRegistry + 'static,
{
  let source = &state.rebuild;
  let path = body.corpus_path.unwrap_or_else(|| source.corpus_path.clone());
  let clauses = load_corpus(&path, body.clause_limit.or(source.limit)).await?;
  let base_fields = body.base_fields.unwrap_or_else(|| source.base_fields.clone());
  info!(path = %path.display(), clauses = clauses.len(), "rebuild requested");
  Ok(Json(state.engine.rebuild(clauses, &base_fields).await?))
}

/// `POST /admin/self-test` — 200 when every case passes, 500 otherwise.
pub async fn self_test<R>(
  State(state): State<Arc<ApiState<R>>>,
) -> (StatusCode, Json<SelfTestReport>)
where
  R: SchemaRegistry + 'static,
{
  let report = state.engine.self_test().await;
  let status = if report.all_passed() { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
  (status, Json(report))
}
