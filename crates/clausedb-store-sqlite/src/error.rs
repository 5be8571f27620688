//! Error type for `clausedb-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored value that no longer decodes.
  #[error("corrupt {what} {value:?} in the database")]
  Corrupt { what: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for clausedb_core::Error {
  fn from(e: Error) -> Self { clausedb_core::Error::Store(Box::new(e)) }
}
