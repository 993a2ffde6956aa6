//! An in-process [`Store`] used by tests and dry runs.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::store::{Filter, Query, Row, Store, StoreError, Table};

/// Tables held in memory.
///
/// Rows get a random `id` on insert, and each table's
/// [`unique_keys`](Table::unique_keys) are enforced the way a database would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<Table, Vec<Row>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row directly, bypassing key checks. Returns the stored row.
    pub fn seed(&self, table: Table, mut row: Row) -> Row {
        row.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
        self.lock().entry(table).or_default().push(row.clone());
        row
    }

    /// A snapshot of every row in a table.
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Row> {
        self.lock().get(&table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Table, Vec<Row>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn column<'a>(row: &'a Row, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

fn matches(row: &Row, query: &Query) -> bool {
    query.filters.iter().all(|filter| match filter {
        Filter::Eq(name, value) => column(row, name) == value,
        Filter::EqIgnoreCase(name, value) => column(row, name)
            .as_str()
            .is_some_and(|cell| cell.to_lowercase() == value.to_lowercase()),
        Filter::ContainsIgnoreCase(name, needle) => column(row, name)
            .as_str()
            .is_some_and(|cell| cell.to_lowercase().contains(&needle.to_lowercase())),
    })
}

fn same_key(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns.iter().all(|name| {
        let value = column(a, name);
        !value.is_null() && value == column(b, name)
    })
}

fn check_unique(table: Table, rows: &[Row], candidate: &Row) -> Result<(), StoreError> {
    let candidate_id = candidate.get("id");
    for key in table.unique_keys() {
        let clash = rows
            .iter()
            .filter(|row| row.get("id") != candidate_id)
            .any(|row| same_key(row, candidate, key));
        if clash {
            return Err(StoreError::Conflict {
                table: table.name(),
                columns: key.iter().map(ToString::to_string).collect(),
            });
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        let tables = self.lock();
        let rows = tables.get(&table).map(Vec::as_slice).unwrap_or_default();
        Ok(rows
            .iter()
            .filter(|row| matches(row, query))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn insert(&self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        row.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
        let mut tables = self.lock();
        let rows = tables.entry(table).or_default();
        check_unique(table, rows, &row)?;
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        let mut tables = self.lock();
        let rows = tables.entry(table).or_default();

        let mut updated = Vec::new();
        for index in 0..rows.len() {
            if !matches(&rows[index], query) {
                continue;
            }
            let mut next = rows[index].clone();
            next.extend(patch.clone().into_iter().filter(|(name, _)| name != "id"));
            check_unique(table, rows, &next)?;
            rows[index] = next.clone();
            updated.push(next);
        }
        Ok(updated)
    }

    async fn upsert(&self, table: Table, row: Row, on_conflict: &[&str]) -> Result<Row, StoreError> {
        let mut tables = self.lock();
        let rows = tables.entry(table).or_default();

        let existing = (!on_conflict.is_empty())
            .then(|| rows.iter().position(|stored| same_key(stored, &row, on_conflict)))
            .flatten();

        match existing {
            Some(index) => {
                let mut next = rows[index].clone();
                next.extend(row.into_iter().filter(|(name, _)| name != "id"));
                check_unique(table, rows, &next)?;
                rows[index] = next.clone();
                Ok(next)
            }
            None => {
                let mut row = row;
                row.entry("id").or_insert_with(|| json!(Uuid::new_v4()));
                check_unique(table, rows, &row)?;
                rows.push(row.clone());
                Ok(row)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::MemoryStore;
    use crate::store::{Query, Row, Store, StoreError, Table};

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_ids_and_enforces_unique_code() {
        let store = MemoryStore::new();

        let stored = store
            .insert(Table::Frameworks, row(json!({ "code": "ISO", "name": "ISO 27001" })))
            .await
            .unwrap();
        let duplicate = store
            .insert(Table::Frameworks, row(json!({ "code": "ISO", "name": "Again" })))
            .await;

        assert!(stored.contains_key("id"));
        assert!(matches!(duplicate, Err(StoreError::Conflict { .. })));
    }

    #[tokio::test]
    async fn upsert_merges_on_composite_key() {
        let store = MemoryStore::new();
        let key = ["framework_id", "requirement_code"];

        let first = store
            .upsert(
                Table::Requirements,
                row(json!({ "framework_id": "f", "requirement_code": "A.1", "title": "Old" })),
                &key,
            )
            .await
            .unwrap();
        let second = store
            .upsert(
                Table::Requirements,
                row(json!({ "framework_id": "f", "requirement_code": "A.1", "title": "New" })),
                &key,
            )
            .await
            .unwrap();

        assert_eq!(first["id"], second["id"]);
        assert_eq!(store.rows(Table::Requirements).len(), 1);
        assert_eq!(store.rows(Table::Requirements)[0]["title"], "New");
    }

    #[tokio::test]
    async fn null_key_columns_do_not_collide() {
        let store = MemoryStore::new();
        for control in ["c1", "c2"] {
            store
                .insert(
                    Table::RequirementMappings,
                    row(json!({ "requirement_id": "r", "control_id": control, "risk_id": null })),
                )
                .await
                .unwrap();
        }
        assert_eq!(store.rows(Table::RequirementMappings).len(), 2);
    }

    #[tokio::test]
    async fn select_filters_case_insensitively_and_limits() {
        let store = MemoryStore::new();
        for title in ["Access review", "Backup ACCESS logs", "Encryption"] {
            store.seed(Table::Risks, row(json!({ "title": title })));
        }

        let found = store
            .select(Table::Risks, &Query::new().contains("title", "access"))
            .await
            .unwrap();
        let limited = store
            .select(Table::Risks, &Query::new().limit(1))
            .await
            .unwrap();
        let exact = store
            .select(Table::Risks, &Query::new().eq_ignore_case("title", "ENCRYPTION"))
            .await
            .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(limited.len(), 1);
        assert_eq!(exact.len(), 1);
    }

    #[tokio::test]
    async fn update_patches_matching_rows() {
        let store = MemoryStore::new();
        store.seed(Table::Frameworks, row(json!({ "code": "ISO", "name": "Old" })));

        let updated = store
            .update(
                Table::Frameworks,
                &Query::new().eq("code", "ISO"),
                row(json!({ "name": "New" })),
            )
            .await
            .unwrap();

        assert_eq!(updated.len(), 1);
        assert_eq!(store.rows(Table::Frameworks)[0]["name"], "New");
    }
}
