//! The clausedb query pipeline.
//!
//! A query is routed (HIT/MISS) against the registered fields. A MISS goes
//! through field discovery: the resolver names the missing field, the
//! orchestrator extracts it from every clause in scope, and the merge engine
//! registers it with its values. The query is then re-routed, compiled into a
//! plan and executed over a registry snapshot.
//!
//! [`engine::Engine`] drives the stages; each stage lives in its own module
//! and can be used on its own.

pub mod compiler;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod lexical;
pub mod merge;
pub mod orchestrator;
pub mod resolver;
pub mod router;
pub mod selftest;

#[cfg(test)]
mod tests;

pub use engine::{Capabilities, Engine, RebuildReport};
pub use error::{Error, QueryFailure, Result};
pub use orchestrator::ExtractionConfig;
