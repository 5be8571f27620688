//! [`SqliteRegistry`]: the SQLite implementation of [`SchemaRegistry`].

use std::path::Path;

use clausedb_core::{
  Error as CoreError, Result as CoreResult,
  clause::{Clause, ClauseId},
  field::{FieldDescriptor, FieldValue},
  registry::{Row, SchemaRegistry, ValueMap, check_new_field, conform_values},
};
use rusqlite::OptionalExtension as _;
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawField, column, decode_value, encode_field_type, encode_value},
  schema::{CLAUSES_TABLE, SCHEMA},
};

/// Per-row values as stored: clause id, text, one optional cell per field.
type RawRow = (String, String, Vec<Option<String>>);

// ─── Connection helpers ──────────────────────────────────────────────────────
//
// These run inside `Connection::call`, so they speak `tokio_rusqlite::Result`.
// Decode failures travel as `tokio_rusqlite::Error::Other`.

fn other(e: Error) -> tokio_rusqlite::Error { tokio_rusqlite::Error::Other(Box::new(e)) }

fn load_fields(conn: &rusqlite::Connection) -> tokio_rusqlite::Result<Vec<FieldDescriptor>> {
  let mut stmt = conn.prepare("SELECT name, field_type, parent, description FROM fields ORDER BY ordinal")?;
  let raws = stmt
    .query_map([], RawField::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws
    .into_iter()
    .map(|raw| raw.into_descriptor().map_err(other))
    .collect()
}

fn register(tx: &rusqlite::Transaction<'_>, descriptor: &FieldDescriptor) -> tokio_rusqlite::Result<()> {
  tx.execute_batch(&format!("ALTER TABLE clauses ADD COLUMN {} TEXT", column(&descriptor.name)))?;
  tx.execute(
    "INSERT INTO fields (name, field_type, parent, description, ordinal)
     VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(ordinal), 0) + 1 FROM fields))",
    rusqlite::params![
      descriptor.name,
      encode_field_type(descriptor.field_type),
      descriptor.parent,
      descriptor.description,
    ],
  )?;
  Ok(())
}

/// Write `values` into `field`'s column. Stops at the first id that matches
/// no clause and reports it; the caller then drops the transaction.
fn write_values(
  tx: &rusqlite::Transaction<'_>,
  field: &str,
  values: &ValueMap,
) -> tokio_rusqlite::Result<Result<usize, ClauseId>> {
  let mut stmt = tx.prepare(&format!("UPDATE clauses SET {} = ?1 WHERE clause_id = ?2", column(field)))?;
  for (id, value) in values {
    let changed = stmt.execute(rusqlite::params![encode_value(value), id.as_str()])?;
    if changed == 0 {
      return Ok(Err(id.clone()));
    }
  }
  Ok(Ok(values.len()))
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// A schema registry backed by a single SQLite file.
///
/// Cloning shares the inner connection. Every call runs on the connection's
/// single thread, so each one sees a consistent state, and every mutation
/// runs in one transaction.
#[derive(Clone)]
pub struct SqliteRegistry {
  conn: tokio_rusqlite::Connection,
}

impl SqliteRegistry {
  /// Open (or create) a registry at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let registry = Self { conn };
    registry.init_schema().await?;
    Ok(registry)
  }

  /// Open an in-memory registry.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let registry = Self { conn };
    registry.init_schema().await?;
    Ok(registry)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Look up one field's descriptor.
  async fn descriptor(&self, name: &str) -> CoreResult<FieldDescriptor> {
    self
      .list_fields()
      .await?
      .into_iter()
      .find(|f| f.name == name)
      .ok_or_else(|| CoreError::UnknownField(name.to_owned()))
  }
}

// ─── SchemaRegistry impl ─────────────────────────────────────────────────────

impl SchemaRegistry for SqliteRegistry {
  async fn list_fields(&self) -> CoreResult<Vec<FieldDescriptor>> {
    let fields = self.conn.call(|conn| load_fields(conn)).await.map_err(Error::from)?;
    Ok(fields)
  }

  async fn has_field(&self, name: &str) -> CoreResult<bool> {
    let name = name.to_owned();
    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row("SELECT 1 FROM fields WHERE name = ?1", rusqlite::params![name], |_| Ok(()))
            .optional()?
            .is_some(),
        )
      })
      .await
      .map_err(Error::from)?;
    Ok(found)
  }

  async fn add_field(&self, descriptor: FieldDescriptor) -> CoreResult<()> {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_new_field(&load_fields(&tx)?, &descriptor) {
          return Ok(Err(e));
        }
        register(&tx, &descriptor)?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(Error::from)?;
    outcome
  }

  async fn add_field_with_values(
    &self,
    descriptor: FieldDescriptor,
    values:     ValueMap,
  ) -> CoreResult<usize> {
    let name = descriptor.name.clone();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if let Err(e) = check_new_field(&load_fields(&tx)?, &descriptor) {
          return Ok(Err(e));
        }
        let values = match conform_values(&descriptor, values) {
          Ok(values) => values,
          Err(e) => return Ok(Err(e)),
        };
        register(&tx, &descriptor)?;
        let written = match write_values(&tx, &descriptor.name, &values)? {
          Ok(written) => written,
          Err(id) => return Ok(Err(CoreError::UnknownClause(id))),
        };
        tx.commit()?;
        Ok(Ok(written))
      })
      .await
      .map_err(Error::from)?;
    if let Ok(written) = &outcome {
      debug!(field = %name, written, "field added");
    }
    outcome
  }

  async fn get_value(&self, clause_id: &ClauseId, field: &str) -> CoreResult<Option<FieldValue>> {
    let descriptor = self.descriptor(field).await?;
    let id = clause_id.as_str().to_owned();
    let sql = format!("SELECT {} FROM clauses WHERE clause_id = ?1", column(field));
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id], |row| row.get::<_, Option<String>>(0))
            .optional()?
            .flatten(),
        )
      })
      .await
      .map_err(Error::from)?;
    Ok(raw.map(|raw| decode_value(descriptor.field_type, &raw)).transpose()?)
  }

  async fn set_values(&self, field: &str, values: ValueMap) -> CoreResult<usize> {
    let field = field.to_owned();
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let Some(descriptor) = load_fields(&tx)?.into_iter().find(|f| f.name == field) else {
          return Ok(Err(CoreError::UnknownField(field)));
        };
        let values = match conform_values(&descriptor, values) {
          Ok(values) => values,
          Err(e) => return Ok(Err(e)),
        };
        let written = match write_values(&tx, &field, &values)? {
          Ok(written) => written,
          Err(id) => return Ok(Err(CoreError::UnknownClause(id))),
        };
        tx.commit()?;
        Ok(Ok(written))
      })
      .await
      .map_err(Error::from)?;
    outcome
  }

  async fn clauses(&self) -> CoreResult<Vec<Clause>> {
    let raws: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT clause_id, clause FROM clauses ORDER BY ordinal")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await
      .map_err(Error::from)?;
    Ok(
      raws
        .into_iter()
        .map(|(id, text)| Clause { clause_id: ClauseId::from_raw(id), text })
        .collect(),
    )
  }

  async fn rows(&self) -> CoreResult<Vec<Row>> {
    let (fields, raws): (Vec<FieldDescriptor>, Vec<RawRow>) = self
      .conn
      .call(|conn| {
        let fields = load_fields(conn)?;
        let columns: String = fields.iter().map(|f| format!(", {}", column(&f.name))).collect();
        let mut stmt = conn.prepare(&format!("SELECT clause_id, clause{columns} FROM clauses ORDER BY ordinal"))?;
        let width = fields.len();
        let raws = stmt
          .query_map([], |row| {
            let cells = (0..width)
              .map(|i| row.get::<_, Option<String>>(i + 2))
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((row.get(0)?, row.get(1)?, cells))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((fields, raws))
      })
      .await
      .map_err(Error::from)?;

    raws
      .into_iter()
      .map(|(id, text, cells)| {
        let mut values = std::collections::BTreeMap::new();
        for (field, cell) in fields.iter().zip(cells) {
          if let Some(raw) = cell {
            values.insert(field.name.clone(), decode_value(field.field_type, &raw)?);
          }
        }
        Ok(Row { clause: Clause { clause_id: ClauseId::from_raw(id), text }, values })
      })
      .collect::<Result<Vec<_>>>()
      .map_err(CoreError::from)
  }

  async fn reset(&self, clauses: Vec<Clause>) -> CoreResult<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch("DROP TABLE clauses; DELETE FROM fields;")?;
        tx.execute_batch(CLAUSES_TABLE)?;
        {
          let mut insert = tx.prepare(
            "INSERT OR IGNORE INTO clauses (clause_id, ordinal, clause) VALUES (?1, ?2, ?3)",
          )?;
          for (ordinal, clause) in clauses.iter().enumerate() {
            insert.execute(rusqlite::params![clause.clause_id.as_str(), ordinal as i64, clause.text])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Error::from)?;
    Ok(())
  }
}
