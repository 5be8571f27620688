//! Language-model backed capabilities for clausedb.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible chat-completions endpoint
//! in JSON mode and implements every capability trait from
//! `clausedb_core::capability`. Transport failures, rate limiting and server
//! errors surface as `CapabilityError::Unavailable`; answers that do not
//! parse surface as `CapabilityError::Rejected`.

mod capability;
mod client;
mod prompt;

pub mod config;
pub mod error;

pub use client::OpenAiClient;
pub use config::LlmConfig;
pub use error::{Error, Result};
