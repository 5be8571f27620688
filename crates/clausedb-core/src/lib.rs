//! Core types and trait definitions for clausedb.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the vocabulary shared by every other crate: clauses, field descriptors,
//! typed values, extraction records, query plans, the processing log, the
//! [`registry::SchemaRegistry`] abstraction and the capability traits the
//! engine calls out through.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod capability;
pub mod clause;
pub mod coerce;
pub mod error;
pub mod field;
pub mod log;
pub mod memory;
pub mod plan;
pub mod record;
pub mod registry;
pub mod response;

pub use error::{Error, Result};
