//! Deterministic, dictionary-based implementations of the capability traits.
//!
//! These back the engine when no language model is configured, serve as the
//! fallback when the model is unreachable, and drive the self-test battery.
//! They understand plain phrasing only: field names spelled out in the query,
//! a fixed set of comparison phrases and `<field>: <value>` patterns in
//! clause text.

mod extractor;
mod interpreter;
mod namer;
pub mod parse;

use std::collections::HashSet;

use async_trait::async_trait;
use clausedb_core::{
  capability::{CapabilityError, QueryClassifier, Verdict},
  field::FieldDescriptor,
};

pub use self::{
  extractor::PatternExtractor,
  interpreter::LexicalInterpreter,
  namer::{LexicalNamer, MAX_NAME_TOKENS},
  parse::{Parsed, parse},
};

// ─── Mentions ────────────────────────────────────────────────────────────────

/// A registered field referred to by the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
  pub field:   String,
  /// Normalised subject words the reference accounts for.
  pub covered: Vec<String>,
  /// Token positions of the first and last covered word.
  pub start:   usize,
  pub end:     usize,
}

/// Normalised word sets by which a field may be referred to: its name, then
/// its description.
fn field_terms(field: &FieldDescriptor) -> Vec<Vec<String>> {
  let name: Vec<String> = field
    .name_tokens()
    .iter()
    .map(|t| parse::canonical(&parse::singularize(&t.to_lowercase())).to_owned())
    .collect();
  let mut terms = vec![name];
  if let Some(description) = &field.description {
    let words: Vec<String> = parse(description)
      .subject_norms()
      .into_iter()
      .map(str::to_owned)
      .collect();
    terms.push(words);
  }
  terms.retain(|t| !t.is_empty());
  terms
}

/// Every field whose name (or description) is fully spelled out in the
/// query's subject, minus those subsumed by a more specific mention.
pub fn find_mentions(parsed: &Parsed, fields: &[FieldDescriptor]) -> Vec<Mention> {
  let position = |norm: &str| parsed.subject.iter().find(|sw| sw.word.norm == norm).map(|sw| sw.at);

  let mut mentions: Vec<Mention> = fields
    .iter()
    .filter_map(|field| {
      field_terms(field).into_iter().find_map(|term| {
        let positions: Option<Vec<usize>> = term.iter().map(|w| position(w)).collect();
        let positions = positions?;
        Some(Mention {
          field:   field.name.clone(),
          start:   positions.iter().copied().min()?,
          end:     positions.iter().copied().max()?,
          covered: term,
        })
      })
    })
    .collect();

  let sets: Vec<HashSet<&str>> = mentions
    .iter()
    .map(|m| m.covered.iter().map(String::as_str).collect())
    .collect();
  let subsumed: Vec<bool> = sets
    .iter()
    .map(|a| sets.iter().any(|b| a.len() < b.len() && a.is_subset(b)))
    .collect();
  let mut flags = subsumed.into_iter();
  mentions.retain(|_| !flags.next().unwrap_or(false));
  mentions.sort_by_key(|m| m.start);
  mentions
}

/// How much of a query's subject the registered fields account for.
#[derive(Debug, Clone)]
pub struct Coverage {
  pub mentions:  Vec<Mention>,
  /// Subject words, in query order, that no mention accounts for.
  pub uncovered: Vec<parse::SubjectWord>,
}

impl Coverage {
  pub fn of(parsed: &Parsed, fields: &[FieldDescriptor]) -> Self {
    let mentions = find_mentions(parsed, fields);
    let covered: HashSet<&str> = mentions
      .iter()
      .flat_map(|m| m.covered.iter().map(String::as_str))
      .collect();
    let uncovered = parsed
      .subject
      .iter()
      .filter(|sw| !covered.contains(sw.word.norm.as_str()))
      .cloned()
      .collect();
    Self { mentions, uncovered }
  }

  pub fn fields(&self) -> Vec<String> { self.mentions.iter().map(|m| m.field.clone()).collect() }
}

/// The lexical routing verdict.
///
/// A query with nothing but a clause-text search is answerable without any
/// field; a query with no content at all is undecidable.
pub fn lexical_verdict(parsed: &Parsed, coverage: &Coverage) -> Verdict {
  if parsed.subject.is_empty() {
    if parsed.searches.is_empty() { Verdict::Unsure } else { Verdict::Hit }
  } else if coverage.uncovered.is_empty() {
    Verdict::Hit
  } else {
    Verdict::Miss
  }
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// Classifies by name coverage alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalClassifier;

#[async_trait]
impl QueryClassifier for LexicalClassifier {
  async fn classify(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Verdict, CapabilityError> {
    let parsed = parse(query);
    let coverage = Coverage::of(&parsed, fields);
    Ok(lexical_verdict(&parsed, &coverage))
  }
}
