//! Database abstraction layer
//!
//! This module provides a trait-based abstraction over the read (and the
//! occasional batch write) operations the dashboard needs, so the loader can
//! run against the hosted REST API, a direct Postgres connection, or an
//! in-memory fixture set.

pub mod memory;
pub mod postgres;
pub mod query;
pub mod rest;
pub mod types;

use crate::config::SourceConfig;
use crate::error::DbResult;
use std::future::Future;

pub use memory::MemoryDatabase;
pub use postgres::PostgresProvider;
pub use query::{Direction, OrderBy, Projection, ViewQuery};
pub use rest::RestProvider;
pub use types::Record;

/// Operations every backend provides.
pub trait Database: Send + Sync {
    /// Run a read query.
    ///
    /// `Ok(None)` means the backend answered without any data (a null
    /// body); an empty view is `Ok(Some(vec![]))`.
    fn fetch(&self, query: &ViewQuery) -> impl Future<Output = DbResult<Option<Vec<Record>>>> + Send;

    /// Merge each record into the row with the same `key_column`, inserting
    /// a row when the key is new. Only the columns present in the records
    /// are written.
    ///
    /// Returns the number of records written, which is `records.len()` on
    /// success whether each one updated or inserted.
    fn upsert(
        &self,
        table: &str,
        key_column: &str,
        records: &[Record],
    ) -> impl Future<Output = DbResult<usize>> + Send;
}

/// A connected backend chosen at runtime
pub enum DatabaseHandle {
    Rest(RestProvider),
    Postgres(PostgresProvider),
    Memory(MemoryDatabase),
}

impl DatabaseHandle {
    /// Build the backend described by `source`.
    ///
    /// For Postgres, a lost background connection is logged as a warning.
    pub async fn connect(source: &SourceConfig) -> DbResult<Self> {
        match source {
            SourceConfig::Rest(cfg) => Ok(Self::Rest(RestProvider::new(cfg)?)),
            SourceConfig::Postgres(cfg) => {
                let (provider, mut conn_err_rx) = PostgresProvider::connect(cfg).await?;
                tokio::spawn(async move {
                    while let Some(msg) = conn_err_rx.recv().await {
                        tracing::warn!(error = %msg, "Postgres connection closed");
                    }
                });
                Ok(Self::Postgres(provider))
            }
            SourceConfig::Fixtures(dir) => Ok(Self::Memory(MemoryDatabase::from_dir(dir)?)),
        }
    }
}

impl Database for DatabaseHandle {
    async fn fetch(&self, query: &ViewQuery) -> DbResult<Option<Vec<Record>>> {
        match self {
            Self::Rest(db) => db.fetch(query).await,
            Self::Postgres(db) => db.fetch(query).await,
            Self::Memory(db) => db.fetch(query).await,
        }
    }

    async fn upsert(&self, table: &str, key_column: &str, records: &[Record]) -> DbResult<usize> {
        match self {
            Self::Rest(db) => db.upsert(table, key_column, records).await,
            Self::Postgres(db) => db.upsert(table, key_column, records).await,
            Self::Memory(db) => db.upsert(table, key_column, records).await,
        }
    }
}
