//! Capability trait implementations over [`OpenAiClient`].

use async_trait::async_trait;
use clausedb_core::{
  capability::{
    CapabilityError, Extracted, FieldExtractor, FieldNamer, QueryClassifier,
    QueryInterpreter, Verdict,
  },
  clause::Clause,
  field::FieldDescriptor,
  plan::PlanDraft,
  record::FieldProposal,
};
use tracing::warn;

use crate::{OpenAiClient, Result, prompt};

/// Run the prompt, parse the answer and map failures for the engine.
async fn ask<T>(
  client: &OpenAiClient,
  capability: &'static str,
  prompt: prompt::Prompt,
  parse: fn(&str) -> Result<T>,
) -> Result<T, CapabilityError> {
  let answer = client.complete_json(&prompt).await.and_then(|content| parse(&content));
  answer.map_err(|e| {
    warn!(capability, error = %e, "model call failed");
    CapabilityError::from(e)
  })
}

#[async_trait]
impl QueryClassifier for OpenAiClient {
  async fn classify(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Verdict, CapabilityError> {
    ask(self, "classify", prompt::classify(query, fields), prompt::parse_verdict).await
  }
}

#[async_trait]
impl FieldNamer for OpenAiClient {
  async fn propose(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
  ) -> Result<Option<FieldProposal>, CapabilityError> {
    ask(self, "propose", prompt::propose(query, fields), prompt::parse_proposal).await
  }
}

#[async_trait]
impl FieldExtractor for OpenAiClient {
  async fn extract(
    &self,
    clause: &Clause,
    field: &FieldProposal,
  ) -> Result<Extracted, CapabilityError> {
    ask(self, "extract", prompt::extract(clause, field), prompt::parse_extracted).await
  }
}

#[async_trait]
impl QueryInterpreter for OpenAiClient {
  async fn interpret(
    &self,
    query: &str,
    fields: &[FieldDescriptor],
    focus: &[String],
  ) -> Result<PlanDraft, CapabilityError> {
    ask(self, "interpret", prompt::interpret(query, fields, focus), prompt::parse_draft).await
  }
}
