//! Field discovery: turn a MISS query into a proposal for one new field.

use std::sync::Arc;

use clausedb_core::{
  Error, Result,
  capability::FieldNamer,
  field::{FieldDescriptor, sanitize_field_name, type_hint_for_name},
  record::FieldProposal,
};
use tracing::{debug, warn};

use crate::lexical::{Coverage, LexicalNamer, parse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  /// A field the registry does not hold yet.
  New(FieldProposal),
  /// The proposed name is already registered; the query is re-routed as HIT.
  Existing(String),
}

pub struct Resolver {
  namer:    Arc<dyn FieldNamer>,
  fallback: LexicalNamer,
}

impl Resolver {
  pub fn new(namer: Arc<dyn FieldNamer>) -> Self { Self { namer, fallback: LexicalNamer } }

  /// Propose the field `query` needs. Never writes to the registry.
  ///
  /// The capability's proposal is validated rather than trusted: its name is
  /// sanitised and a parent that is not registered is dropped.
  pub async fn resolve(&self, query: &str, fields: &[FieldDescriptor]) -> Result<Resolution> {
    let proposal = match self.namer.propose(query, fields).await {
      Ok(Some(p)) => Some(p),
      Ok(None) => None,
      Err(e) => {
        warn!(error = %e, "field namer failed, naming lexically");
        self.fallback.propose_now(query, fields)
      }
    };
    let Some(mut proposal) = proposal else {
      return Err(Error::UnresolvedField(query.to_owned()));
    };

    proposal.name = sanitize_field_name(&proposal.name)?;
    if fields.iter().any(|f| f.name == proposal.name) {
      return Ok(Resolution::Existing(proposal.name));
    }

    if let Some(parent) = &proposal.parent {
      let parent_known = fields.iter().any(|f| &f.name == parent);
      if !parent_known || parent == &proposal.name {
        debug!(field = %proposal.name, %parent, "dropping unregistered parent");
        proposal.parent = None;
      }
    }
    if proposal.type_hint.is_none() {
      proposal.type_hint = type_hint_for_name(&proposal.name);
    }
    if proposal.description.is_none() {
      proposal.description = subject_phrase(query, fields);
    }

    Ok(Resolution::New(proposal))
  }
}

/// The query words no registered field covers, as written.
///
/// Stored as the description so the re-routed query matches the new field
/// even when the capability named it differently.
fn subject_phrase(query: &str, fields: &[FieldDescriptor]) -> Option<String> {
  let parsed = parse(query);
  let coverage = Coverage::of(&parsed, fields);
  let words: Vec<&str> = coverage.uncovered.iter().map(|sw| sw.word.raw.as_str()).collect();
  (!words.is_empty()).then(|| words.join(" "))
}
