//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use clausedb_engine::QueryFailure;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  /// A query that failed part-way; the response carries its log.
  #[error(transparent)]
  Query(#[from] QueryFailure),

  #[error(transparent)]
  Engine(#[from] clausedb_engine::Error),

  #[error(transparent)]
  Core(#[from] clausedb_core::Error),
}

/// HTTP status for a pipeline error.
pub fn status_for(e: &clausedb_core::Error) -> StatusCode {
  use clausedb_core::Error as E;
  match e {
    _ if e.is_contract_violation() => StatusCode::CONFLICT,
    E::RoutingAmbiguity(_) | E::UnresolvedField(_) | E::Coercion { .. } => {
      StatusCode::UNPROCESSABLE_ENTITY
    }
    E::ExtractionCapabilityFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, Json(json!({ "error": m }))).into_response(),
      ApiError::Query(failure) => {
        let body = json!({
          "error":          failure.source.to_string(),
          "stage":          failure.stage,
          "field":          failure.field,
          "retryable":      failure.is_retryable(),
          "processing_log": failure.log,
        });
        (status_for(&failure.source), Json(body)).into_response()
      }
      ApiError::Engine(clausedb_engine::Error::Core(e)) | ApiError::Core(e) => {
        (status_for(&e), Json(json!({ "error": e.to_string() }))).into_response()
      }
      ApiError::Engine(e) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response()
      }
    }
  }
}
