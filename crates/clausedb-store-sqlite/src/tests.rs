//! Integration tests for `SqliteRegistry` against an in-memory database.

use chrono::NaiveDate;
use clausedb_core::{
  Error as CoreError,
  clause::{Clause, ClauseId},
  field::{FieldDescriptor, FieldType, FieldValue},
  registry::{SchemaRegistry, ValueMap},
};

use crate::SqliteRegistry;

fn corpus() -> Vec<Clause> {
  vec![
    Clause::new("Acme pays a termination fee of $5,000."),
    Clause::new("Globex signs on 2024-03-01."),
    Clause::new("Acme pays a termination fee of $5,000."),
    Clause::new("No fees apply."),
  ]
}

async fn registry() -> (SqliteRegistry, Vec<Clause>) {
  let r = SqliteRegistry::open_in_memory().await.expect("in-memory registry");
  r.reset(corpus()).await.unwrap();
  let clauses = r.clauses().await.unwrap();
  (r, clauses)
}

fn values(pairs: &[(&Clause, FieldValue)]) -> ValueMap {
  pairs.iter().map(|(c, v)| (c.clause_id.clone(), v.clone())).collect()
}

// ─── Clauses ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_dedupes_and_keeps_order() {
  let (_, clauses) = registry().await;
  let texts: Vec<_> = clauses.iter().map(|c| c.text.as_str()).collect();
  assert_eq!(texts, vec![
    "Acme pays a termination fee of $5,000.",
    "Globex signs on 2024-03-01.",
    "No fees apply.",
  ]);
}

#[tokio::test]
async fn reset_drops_fields_and_columns() {
  let (r, clauses) = registry().await;
  r.add_field_with_values(
    FieldDescriptor::new("fee", FieldType::Numeric),
    values(&[(&clauses[0], FieldValue::Number(5000.0))]),
  )
  .await
  .unwrap();

  r.reset(corpus()).await.unwrap();
  assert!(r.list_fields().await.unwrap().is_empty());
  assert!(r.rows().await.unwrap().iter().all(|row| row.values.is_empty()));

  // The name is free again, column included.
  r.add_field(FieldDescriptor::new("fee", FieldType::Text)).await.unwrap();
}

// ─── Fields ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fields_list_in_registration_order() {
  let (r, _) = registry().await;
  r.add_field(FieldDescriptor::new("company", FieldType::Text)).await.unwrap();
  r.add_field(FieldDescriptor::new("amount", FieldType::Numeric)).await.unwrap();
  r.add_field(
    FieldDescriptor::new("penalty_amount", FieldType::Numeric)
      .with_parent("amount")
      .with_description("penalty amounts"),
  )
  .await
  .unwrap();

  let fields = r.list_fields().await.unwrap();
  let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
  assert_eq!(names, vec!["company", "amount", "penalty_amount"]);
  assert_eq!(fields[2].parent.as_deref(), Some("amount"));
  assert_eq!(fields[2].description.as_deref(), Some("penalty amounts"));
  assert!(r.has_field("amount").await.unwrap());
  assert!(!r.has_field("ghost").await.unwrap());
}

#[tokio::test]
async fn duplicate_and_reserved_names_are_rejected() {
  let (r, _) = registry().await;
  r.add_field(FieldDescriptor::new("fee", FieldType::Numeric)).await.unwrap();

  let err = r.add_field(FieldDescriptor::new("fee", FieldType::Text)).await.unwrap_err();
  assert!(matches!(err, CoreError::DuplicateField(ref n) if n == "fee"));

  let err = r.add_field(FieldDescriptor::new("clause", FieldType::Text)).await.unwrap_err();
  assert!(matches!(err, CoreError::DuplicateField(_)));
}

#[tokio::test]
async fn missing_parent_is_rejected() {
  let (r, _) = registry().await;
  let err = r
    .add_field(FieldDescriptor::new("penalty_amount", FieldType::Numeric).with_parent("amount"))
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::InvalidParent { .. }));
  assert!(r.list_fields().await.unwrap().is_empty());
}

// ─── Values ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn values_round_trip_with_their_types() {
  let (r, clauses) = registry().await;
  let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
  r.add_field_with_values(
    FieldDescriptor::new("fee", FieldType::Numeric),
    values(&[(&clauses[0], FieldValue::Text("$5,000".into()))]),
  )
  .await
  .unwrap();
  r.add_field_with_values(
    FieldDescriptor::new("signed", FieldType::Date),
    values(&[(&clauses[1], FieldValue::Date(date))]),
  )
  .await
  .unwrap();

  assert_eq!(
    r.get_value(&clauses[0].clause_id, "fee").await.unwrap(),
    Some(FieldValue::Number(5000.0))
  );
  assert_eq!(r.get_value(&clauses[1].clause_id, "signed").await.unwrap(), Some(FieldValue::Date(date)));
  assert_eq!(r.get_value(&clauses[2].clause_id, "fee").await.unwrap(), None);

  let rows = r.rows().await.unwrap();
  assert_eq!(rows.len(), 3);
  assert_eq!(rows[0].value("fee"), Some(&FieldValue::Number(5000.0)));
  assert_eq!(rows[0].value("signed"), None);
  assert_eq!(rows[1].value("signed"), Some(&FieldValue::Date(date)));
}

#[tokio::test]
async fn set_values_upserts() {
  let (r, clauses) = registry().await;
  r.add_field(FieldDescriptor::new("fee", FieldType::Numeric)).await.unwrap();
  let written = r
    .set_values("fee", values(&[(&clauses[0], FieldValue::Number(1.0)), (&clauses[2], FieldValue::Number(2.0))]))
    .await
    .unwrap();
  assert_eq!(written, 2);

  r.set_values("fee", values(&[(&clauses[0], FieldValue::Number(3.0))])).await.unwrap();
  assert_eq!(r.get_value(&clauses[0].clause_id, "fee").await.unwrap(), Some(FieldValue::Number(3.0)));
  assert_eq!(r.get_value(&clauses[2].clause_id, "fee").await.unwrap(), Some(FieldValue::Number(2.0)));
}

#[tokio::test]
async fn unknown_field_or_clause_changes_nothing() {
  let (r, clauses) = registry().await;
  let err = r.set_values("ghost", values(&[(&clauses[0], FieldValue::Number(1.0))])).await.unwrap_err();
  assert!(matches!(err, CoreError::UnknownField(_)));

  r.add_field(FieldDescriptor::new("fee", FieldType::Numeric)).await.unwrap();
  let mut batch = values(&[(&clauses[0], FieldValue::Number(1.0))]);
  batch.insert(ClauseId::from_raw("0000000000000000"), FieldValue::Number(2.0));
  let err = r.set_values("fee", batch).await.unwrap_err();
  assert!(matches!(err, CoreError::UnknownClause(_)));
  assert_eq!(r.get_value(&clauses[0].clause_id, "fee").await.unwrap(), None);
}

#[tokio::test]
async fn failed_atomic_add_leaves_no_column() {
  let (r, clauses) = registry().await;
  let err = r
    .add_field_with_values(
      FieldDescriptor::new("fee", FieldType::Numeric),
      values(&[(&clauses[0], FieldValue::Text("a lot".into()))]),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::Coercion { .. }));
  assert!(!r.has_field("fee").await.unwrap());

  let mut batch = values(&[(&clauses[0], FieldValue::Number(1.0))]);
  batch.insert(ClauseId::from_raw("ffffffffffffffff"), FieldValue::Number(2.0));
  let err = r
    .add_field_with_values(FieldDescriptor::new("fee", FieldType::Numeric), batch)
    .await
    .unwrap_err();
  assert!(matches!(err, CoreError::UnknownClause(_)));
  assert!(!r.has_field("fee").await.unwrap());

  // The rolled-back ALTER TABLE left the column name free.
  r.add_field(FieldDescriptor::new("fee", FieldType::Numeric)).await.unwrap();
}

#[tokio::test]
async fn file_registry_persists_across_reopen() {
  let path = std::env::temp_dir().join(format!("clausedb-test-{}.db", std::process::id()));
  let _ = std::fs::remove_file(&path);
  {
    let r = SqliteRegistry::open(&path).await.unwrap();
    r.reset(corpus()).await.unwrap();
    r.add_field(FieldDescriptor::new("fee", FieldType::Numeric)).await.unwrap();
  }
  let r = SqliteRegistry::open(&path).await.unwrap();
  assert_eq!(r.clauses().await.unwrap().len(), 3);
  assert!(r.has_field("fee").await.unwrap());
  let _ = std::fs::remove_file(&path);
}
