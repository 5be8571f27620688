//! SQL schema for the clausedb SQLite registry.
//!
//! Field columns are not part of the static schema: each is added to
//! `clauses` as `f_<name>` when the field is registered.

/// Base schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS clauses (
    clause_id TEXT PRIMARY KEY,   -- content hash of the clause text
    ordinal   INTEGER NOT NULL UNIQUE,
    clause    TEXT NOT NULL
);

-- Append-only during query processing; cleared only by reset.
CREATE TABLE IF NOT EXISTS fields (
    name        TEXT PRIMARY KEY,
    field_type  TEXT NOT NULL,   -- 'numeric' | 'text' | 'date' | 'categorical'
    parent      TEXT REFERENCES fields(name),
    description TEXT,
    ordinal     INTEGER NOT NULL UNIQUE
);

PRAGMA user_version = 1;
";

/// Recreates an empty `clauses` table after reset drops it.
pub const CLAUSES_TABLE: &str = "
CREATE TABLE clauses (
    clause_id TEXT PRIMARY KEY,
    ordinal   INTEGER NOT NULL UNIQUE,
    clause    TEXT NOT NULL
);
";
