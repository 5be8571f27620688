use async_trait::async_trait;
use clausedb_core::{
  capability::{CapabilityError, FieldNamer},
  field::{FieldDescriptor, type_hint_for_name},
  record::FieldProposal,
};

use super::{Coverage, parse};

/// Names longer than this are treated as a question rather than an attribute.
pub const MAX_NAME_TOKENS: usize = 4;

/// Names a new field after the query words no registered field covers.
///
/// When the uncovered words directly modify a registered field ("penalty"
/// before `amount`), that field becomes the parent and its name the suffix:
/// `penalty_amount`, scoped to clauses that have an `amount`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalNamer;

impl LexicalNamer {
  pub fn propose_now(&self, query: &str, fields: &[FieldDescriptor]) -> Option<FieldProposal> {
    let parsed = parse(query);
    let coverage = Coverage::of(&parsed, fields);
    let last = coverage.uncovered.last()?;

    let mut tokens: Vec<String> = Vec::new();
    let mut phrase: Vec<String> = Vec::new();
    for sw in &coverage.uncovered {
      if !tokens.contains(&sw.word.norm) {
        tokens.push(sw.word.norm.clone());
        phrase.push(sw.word.raw.clone());
      }
    }

    // The subject word right after the last uncovered one, if a field starts there.
    let next_at = parsed
      .subject
      .iter()
      .position(|sw| sw.at == last.at)
      .and_then(|i| parsed.subject.get(i + 1))
      .map(|sw| sw.at);
    let parent = next_at.and_then(|at| coverage.mentions.iter().find(|m| m.start == at));
    if let Some(parent) = parent {
      tokens.extend(parent.field.split('_').map(str::to_owned));
      phrase.extend(
        parsed
          .subject
          .iter()
          .filter(|sw| sw.at >= parent.start && sw.at <= parent.end)
          .map(|sw| sw.word.raw.clone()),
      );
    }

    if tokens.len() > MAX_NAME_TOKENS {
      return None;
    }

    let name = tokens.join("_");
    let mut proposal = FieldProposal::new(&name);
    proposal.type_hint = type_hint_for_name(&name);
    proposal.parent = parent.map(|m| m.field.clone());
    proposal.description = Some(phrase.join(" "));
    Some(proposal)
  }
}

#[async_trait]
impl FieldNamer for LexicalNamer {
  async fn propose(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Option<FieldProposal>, CapabilityError> {
    Ok(self.propose_now(query, fields))
  }
}
