//! SQLite backend for the clausedb schema registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each field is a column of the
//! `clauses` table, added with `ALTER TABLE` in the same transaction that
//! registers it.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteRegistry;

#[cfg(test)]
mod tests;
