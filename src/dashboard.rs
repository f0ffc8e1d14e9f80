//! Dashboard data loader
//!
//! Fans out one query per dashboard field, waits for all of them to settle,
//! and folds the results into a payload whose four fields are always arrays.
//! A failed or empty query never affects the other fields, and nothing the
//! queries do can make `load` fail.

use crate::config::{Settings, SourceConfig, SurnameMode};
use crate::db::{Database, DatabaseHandle, Direction, Record, ViewQuery};
use crate::error::{ConfigResult, DbError, DbResult};
use futures::FutureExt;
use futures::future::join4;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// The four dashboard fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MapData,
    RankStats,
    Timeline,
    Surnames,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::MapData,
        Field::RankStats,
        Field::Timeline,
        Field::Surnames,
    ];

    /// Key in the serialized payload
    pub fn key(&self) -> &'static str {
        match self {
            Field::MapData => "mapData",
            Field::RankStats => "rankStats",
            Field::Timeline => "timeline",
            Field::Surnames => "surnames",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One query per dashboard field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardQueries {
    pub map_data: ViewQuery,
    pub rank_stats: ViewQuery,
    pub timeline: ViewQuery,
    pub surnames: ViewQuery,
}

impl DashboardQueries {
    pub fn from_settings(settings: &Settings) -> Self {
        let views = &settings.views;
        let surnames = match settings.surnames.mode {
            SurnameMode::Top => ViewQuery::new(&views.surnames)
                .order_by(&settings.surnames.order_column, Direction::Descending)
                .limit(settings.surnames.limit),
            SurnameMode::All => ViewQuery::new(&views.surnames),
        };
        Self {
            map_data: ViewQuery::new(&views.map).limit(settings.row_limit),
            rank_stats: ViewQuery::new(&views.rank).limit(settings.row_limit),
            timeline: ViewQuery::new(&views.timeline).limit(settings.row_limit),
            surnames,
        }
    }

    pub fn get(&self, field: Field) -> &ViewQuery {
        match field {
            Field::MapData => &self.map_data,
            Field::RankStats => &self.rank_stats,
            Field::Timeline => &self.timeline,
            Field::Surnames => &self.surnames,
        }
    }
}

impl Default for DashboardQueries {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// What happened to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Query succeeded with rows (possibly zero)
    Loaded(Vec<Record>),
    /// Query succeeded but returned no data
    Empty,
    /// Query failed; the reason is kept for diagnostics
    Failed(String),
}

impl FieldOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, FieldOutcome::Failed(_))
    }

    pub fn row_count(&self) -> usize {
        match self {
            FieldOutcome::Loaded(rows) => rows.len(),
            _ => 0,
        }
    }

    /// Collapse to rows; empty and failed both become `[]`
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            FieldOutcome::Loaded(rows) => rows,
            FieldOutcome::Empty | FieldOutcome::Failed(_) => Vec::new(),
        }
    }

    fn from_result(field: Field, view: &str, result: DbResult<Option<Vec<Record>>>) -> Self {
        match result {
            Ok(Some(rows)) => FieldOutcome::Loaded(rows),
            Ok(None) => {
                tracing::warn!(%field, view, "Query returned no data");
                FieldOutcome::Empty
            }
            Err(e) => {
                tracing::error!(%field, view, error = %e, "Dashboard query failed");
                FieldOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Per-field outcomes of one load
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardReport {
    pub map_data: FieldOutcome,
    pub rank_stats: FieldOutcome,
    pub timeline: FieldOutcome,
    pub surnames: FieldOutcome,
}

impl DashboardReport {
    /// Every field failed for the same reason
    pub fn failed_all(reason: &str) -> Self {
        Self {
            map_data: FieldOutcome::Failed(reason.to_string()),
            rank_stats: FieldOutcome::Failed(reason.to_string()),
            timeline: FieldOutcome::Failed(reason.to_string()),
            surnames: FieldOutcome::Failed(reason.to_string()),
        }
    }

    pub fn get(&self, field: Field) -> &FieldOutcome {
        match field {
            Field::MapData => &self.map_data,
            Field::RankStats => &self.rank_stats,
            Field::Timeline => &self.timeline,
            Field::Surnames => &self.surnames,
        }
    }

    pub fn failed_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_failed())
            .collect()
    }

    pub fn into_payload(self) -> DashboardPayload {
        DashboardPayload {
            map_data: self.map_data.into_rows(),
            rank_stats: self.rank_stats.into_rows(),
            timeline: self.timeline.into_rows(),
            surnames: self.surnames.into_rows(),
        }
    }
}

/// Data handed to the rendering layer. Every field is always an array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    #[serde(default)]
    pub map_data: Vec<Record>,
    #[serde(default)]
    pub rank_stats: Vec<Record>,
    #[serde(default)]
    pub timeline: Vec<Record>,
    #[serde(default)]
    pub surnames: Vec<Record>,
}

impl DashboardPayload {
    pub fn get(&self, field: Field) -> &[Record] {
        match field {
            Field::MapData => &self.map_data,
            Field::RankStats => &self.rank_stats,
            Field::Timeline => &self.timeline,
            Field::Surnames => &self.surnames,
        }
    }
}

/// Loads the dashboard from a shared database handle
pub struct DashboardLoader<D> {
    db: Arc<D>,
    queries: DashboardQueries,
    query_timeout: Option<Duration>,
}

impl<D: Database> DashboardLoader<D> {
    pub fn new(db: Arc<D>, queries: DashboardQueries) -> Self {
        Self {
            db,
            queries,
            query_timeout: None,
        }
    }

    /// Bound each query individually; `None` waits indefinitely.
    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn queries(&self) -> &DashboardQueries {
        &self.queries
    }

    /// Load the payload. Never fails; failed fields are empty.
    pub async fn load(&self) -> DashboardPayload {
        self.load_report().await.into_payload()
    }

    /// Load with per-field outcomes.
    ///
    /// All four queries run concurrently on the current task and are all
    /// awaited. A panic anywhere in the fan-out marks every field failed.
    pub async fn load_report(&self) -> DashboardReport {
        tracing::info!("Loading wardead dashboard data");

        let fan_out = async {
            let (map_data, rank_stats, timeline, surnames) = join4(
                self.run(Field::MapData),
                self.run(Field::RankStats),
                self.run(Field::Timeline),
                self.run(Field::Surnames),
            )
            .await;
            DashboardReport {
                map_data,
                rank_stats,
                timeline,
                surnames,
            }
        };

        match AssertUnwindSafe(fan_out).catch_unwind().await {
            Ok(report) => {
                for field in Field::ALL {
                    tracing::debug!(%field, rows = report.get(field).row_count(), "Field loaded");
                }
                report
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(error = %reason, "Critical error while loading dashboard");
                DashboardReport::failed_all(&reason)
            }
        }
    }

    async fn run(&self, field: Field) -> FieldOutcome {
        let query = self.queries.get(field);
        let result = match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, self.db.fetch(query))
                .await
                .unwrap_or(Err(DbError::Timeout)),
            None => self.db.fetch(query).await,
        };
        FieldOutcome::from_result(field, &query.view, result)
    }
}

/// Connect to `source` and load the dashboard.
///
/// Configuration and connection failures are logged and produce a report in
/// which every field failed, so callers always get a payload.
pub async fn load_from_source(
    source: ConfigResult<SourceConfig>,
    settings: &Settings,
) -> DashboardReport {
    let source = match source {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(error = %e, "Critical error: dashboard source is not configured");
            return DashboardReport::failed_all(&e.to_string());
        }
    };
    let db = match DatabaseHandle::connect(&source).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(source = %source.describe(), error = %e, "Critical error: cannot reach dashboard source");
            return DashboardReport::failed_all(&e.to_string());
        }
    };
    DashboardLoader::new(Arc::new(db), DashboardQueries::from_settings(settings))
        .with_query_timeout(settings.query_timeout_secs.map(Duration::from_secs))
        .load_report()
        .await
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during dashboard fan-out".to_string()
    }
}
