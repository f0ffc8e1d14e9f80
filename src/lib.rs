//! wardead - concurrent data loader for the Staffordshire war dead dashboard
//!
//! Fetches the four datasets behind the dashboard (memorial map points,
//! deaths by rank, the daily timeline and the surname/regiment pivot) from a
//! hosted PostgREST-style API or a direct Postgres connection. The queries
//! run concurrently and every failure is isolated to its own field, so a
//! load always yields a complete payload.
//!
//! # Architecture
//!
//! - [`config`]: Data source resolution and query shaping settings
//! - [`db`]: The `Database` trait and its REST, Postgres and in-memory backends
//! - [`dashboard`]: The concurrent loader and the payload it produces
//! - [`dates`]: Free-text date normalization
//! - [`regiments`]: Regiment name standardization
//! - [`maintenance`]: The ISO date and regiment backfill job
//! - [`export`]: CSV and JSON rendering of loaded datasets
//! - [`commands`]: Command-line parsing and execution
//! - [`logging`]: Tracing subscriber setup
//! - [`error`]: Error types and result aliases
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wardead::config::{RestConfig, SourceConfig};
//! use wardead::dashboard::{DashboardLoader, DashboardQueries};
//! use wardead::db::DatabaseHandle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = SourceConfig::Rest(RestConfig::new("https://example.supabase.co", "anon-key")?);
//! let db = DatabaseHandle::connect(&source).await?;
//!
//! let payload = DashboardLoader::new(Arc::new(db), DashboardQueries::default())
//!     .load()
//!     .await;
//! println!("{} memorial points", payload.map_data.len());
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod dashboard;
pub mod dates;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod maintenance;
pub mod regiments;

pub use dashboard::{DashboardLoader, DashboardPayload, DashboardReport, FieldOutcome};
pub use error::{CommandError, ConfigError, DbError, Result, WardeadError};
