//! The user-visible processing log.
//!
//! Separate from `tracing`: this is an ordered, append-only narration of the
//! stages a request actually executed, consumed by the presentation layer and
//! asserted on by tests.

use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  Route,
  Resolve,
  Extract,
  Merge,
  Reroute,
  Compile,
  Execute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvent {
  pub stage:   Stage,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessingLog {
  events: Vec<StageEvent>,
}

impl ProcessingLog {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, stage: Stage, message: impl Into<String>) {
    self.events.push(StageEvent { stage, message: message.into() });
  }

  pub fn events(&self) -> &[StageEvent] { &self.events }

  /// The stages in the order they were logged, including repeats.
  pub fn stages(&self) -> Vec<Stage> { self.events.iter().map(|e| e.stage).collect() }

  /// Rendered as `[stage] message`, one line per event.
  pub fn lines(&self) -> Vec<String> {
    self
      .events
      .iter()
      .map(|e| format!("[{}] {}", e.stage, e.message))
      .collect()
  }
}
