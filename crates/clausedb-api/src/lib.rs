//! JSON REST API for clausedb.
//!
//! Exposes an axum [`Router`] over an [`Engine`] backed by any
//! [`SchemaRegistry`]. Auth and TLS are the caller's responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/query` | Body: `{"text":"..."}` |
//! | `GET`  | `/schema` | Registered fields in registration order |
//! | `POST` | `/admin/rebuild` | Body: `{"corpus_path","clause_limit","base_fields"}`, all optional |
//! | `POST` | `/admin/self-test` | Runs the built-in battery |

pub mod admin;
pub mod error;
pub mod query;


use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use clausedb_core::registry::SchemaRegistry;
use clausedb_engine::Engine;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Where `/admin/rebuild` reads clauses from, and what it extracts.
#[derive(Debug, Clone)]
pub struct RebuildSource {
  pub corpus_path: PathBuf,
  pub limit:       Option<usize>,
  pub base_fields: Vec<String>,
}

pub struct ApiState<R> {
  pub engine:  Arc<Engine<R>>,
  pub rebuild: RebuildSource,
}

/// Build the API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R>(engine: Arc<Engine<R>>, rebuild: RebuildSource) -> Router<()>
where
  R: SchemaRegistry + 'static,
{
  let state = Arc::new(ApiState { engine, rebuild });
  Router::new()
    .route("/query", post(query::handler::<R>))
    .route("/schema", get(query::schema::<R>))
    .route("/admin/rebuild", post(admin::rebuild::<R>))
    .route("/admin/self-test", post(admin::self_test::<R>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
