//! In-memory backend
//!
//! Serves views from memory, either seeded programmatically or loaded from
//! a directory of `<view>.json` files. Used for offline runs and as the
//! reference backend in tests.

use crate::db::types::{Record, into_record};
use crate::db::{Database, ViewQuery};
use crate::error::{DbError, DbResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

/// View name to rows. `None` stands for a view that answers with no data.
#[derive(Default)]
pub struct MemoryDatabase {
    views: RwLock<HashMap<String, Option<Vec<Record>>>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a view with rows (builder style).
    pub fn with_view(mut self, view: impl Into<String>, rows: Vec<Record>) -> Self {
        self.views.get_mut().insert(view.into(), Some(rows));
        self
    }

    /// Seed a view that answers with no data.
    pub fn with_null_view(mut self, view: impl Into<String>) -> Self {
        self.views.get_mut().insert(view.into(), None);
        self
    }

    /// Load every `*.json` file in `dir` as a view named after the file stem.
    ///
    /// A file may hold a JSON array of objects or `null`.
    pub fn from_dir(dir: &Path) -> DbResult<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            DbError::ConnectionFailed(format!("Cannot read fixtures {}: {}", dir.display(), e))
        })?;

        let mut views = HashMap::new();
        for entry in entries {
            let path = entry
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(view) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)
                .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", path.display(), e)))?;
            let value: Value = serde_json::from_str(&content)
                .map_err(|e| DbError::InvalidResponse(format!("{}: {}", path.display(), e)))?;
            views.insert(view.to_string(), rows_from_value(value)?);
        }

        tracing::debug!(dir = %dir.display(), views = views.len(), "Loaded fixture views");
        Ok(Self {
            views: RwLock::new(views),
        })
    }

    /// Snapshot of a view's current rows
    pub async fn rows(&self, view: &str) -> Option<Vec<Record>> {
        self.views.read().await.get(view).cloned().flatten()
    }
}

/// Interpret a JSON document as a query result
pub(crate) fn rows_from_value(value: Value) -> DbResult<Option<Vec<Record>>> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                into_record(item)
                    .ok_or_else(|| DbError::InvalidResponse("row is not a JSON object".into()))
            })
            .collect::<DbResult<Vec<_>>>()
            .map(Some),
        other => Err(DbError::InvalidResponse(format!(
            "expected a JSON array of rows, got {}",
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Database for MemoryDatabase {
    async fn fetch(&self, query: &ViewQuery) -> DbResult<Option<Vec<Record>>> {
        let views = self.views.read().await;
        match views.get(&query.view) {
            Some(Some(rows)) => Ok(Some(query.apply(rows.clone()))),
            Some(None) => Ok(None),
            None => Err(DbError::QueryFailed(format!(
                "relation \"{}\" does not exist",
                query.view
            ))),
        }
    }

    async fn upsert(&self, table: &str, key_column: &str, records: &[Record]) -> DbResult<usize> {
        let mut views = self.views.write().await;
        let rows = views
            .get_mut(table)
            .ok_or_else(|| {
                DbError::QueryFailed(format!("relation \"{}\" does not exist", table))
            })?
            .get_or_insert_with(Vec::new);

        for record in records {
            let key = record.get(key_column).ok_or_else(|| {
                DbError::QueryFailed(format!("record is missing key column \"{}\"", key_column))
            })?;
            match rows.iter_mut().find(|row| row.get(key_column) == Some(key)) {
                Some(row) => {
                    for (column, value) in record {
                        row.insert(column.clone(), value.clone());
                    }
                }
                None => rows.push(record.clone()),
            }
        }
        Ok(records.len())
    }
}
