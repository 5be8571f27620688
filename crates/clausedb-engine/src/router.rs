//! HIT/MISS routing.
//!
//! A query whose subject is fully spelled out by registered field names is a
//! HIT without consulting the classifier. Otherwise the classifier decides;
//! when it fails or is unsure, the lexical verdict stands.

use std::sync::Arc;

use clausedb_core::{
  Error, Result,
  capability::{QueryClassifier, Verdict},
  field::FieldDescriptor,
};
use tracing::{debug, warn};

use crate::lexical::{Coverage, lexical_verdict, parse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  /// Answerable now; `fields` are the registered fields the query names.
  Hit { fields: Vec<String> },
  Miss,
}

impl Route {
  pub fn is_hit(&self) -> bool { matches!(self, Self::Hit { .. }) }
}

/// Who settled the verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decider {
  Names,
  Classifier,
  /// The classifier failed or was unsure; the lexical verdict was used.
  Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
  pub route:      Route,
  pub decided_by: Decider,
}

pub struct Router {
  classifier: Arc<dyn QueryClassifier>,
}

impl Router {
  pub fn new(classifier: Arc<dyn QueryClassifier>) -> Self { Self { classifier } }

  /// Classify `query` against `fields`. Pure: the registry is not touched.
  pub async fn classify(&self, query: &str, fields: &[FieldDescriptor]) -> Result<Routing> {
    let parsed = parse(query);
    let coverage = Coverage::of(&parsed, fields);
    let lexical = lexical_verdict(&parsed, &coverage);

    if lexical == Verdict::Hit {
      return Ok(Routing {
        route:      Route::Hit { fields: coverage.fields() },
        decided_by: Decider::Names,
      });
    }

    let (verdict, decided_by) = match self.classifier.classify(query, fields).await {
      Ok(Verdict::Unsure) => (lexical, Decider::Fallback("classifier unsure".into())),
      Ok(v) => (v, Decider::Classifier),
      Err(e) => {
        warn!(error = %e, "classifier failed, using lexical verdict");
        (lexical, Decider::Fallback(e.to_string()))
      }
    };
    debug!(?verdict, ?decided_by, "routed");

    let route = match verdict {
      Verdict::Hit => Route::Hit { fields: coverage.fields() },
      Verdict::Miss => Route::Miss,
      Verdict::Unsure => return Err(Error::RoutingAmbiguity(query.to_owned())),
    };
    Ok(Routing { route, decided_by })
  }
}
