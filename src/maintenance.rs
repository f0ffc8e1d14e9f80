//! Roll of honour backfill job
//!
//! Downloads the raw roll of honour page by page, normalizes each free-text
//! date of death, and writes the ISO date back in batches. Regiment names
//! can be standardized in the same pass.

use crate::db::{Database, Direction, Record, ViewQuery};
use crate::error::DbResult;
use crate::{dates, regiments};
use serde_json::Value;

/// Job parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    pub table: String,
    pub key_column: String,
    pub source_column: String,
    pub target_column: String,
    /// Also write standardized regiment names
    pub regiments: Option<RegimentColumns>,
    /// Rows requested per page when reading and per batch when writing
    pub batch_size: usize,
    /// Compute but do not write
    pub dry_run: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            table: "staffordshire_wardead".to_string(),
            key_column: "id".to_string(),
            source_column: "date_of_death".to_string(),
            target_column: "iso_date".to_string(),
            regiments: None,
            batch_size: 1000,
            dry_run: false,
        }
    }
}

/// Where the regiment step reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegimentColumns {
    pub source: String,
    pub target: String,
}

impl Default for RegimentColumns {
    fn default() -> Self {
        Self {
            source: "regiment".to_string(),
            target: "regiment_clean".to_string(),
        }
    }
}

/// What the job did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub fetched: usize,
    pub parsed: usize,
    pub unparsed: usize,
    /// Regiment names folded onto a canonical form
    pub regiments_matched: usize,
    pub written: usize,
    /// First failing write batch (starting row, error); later batches are skipped
    pub failed_batch: Option<(usize, String)>,
}

/// Run the backfill. Read failures abort with an error; a write failure
/// stops the job and is recorded in the report.
///
/// Servers may return fewer rows than requested (PostgREST caps pages at its
/// `max-rows`), so paging advances by the rows actually returned and ends on
/// the first empty page.
pub async fn clean_dates<D: Database>(db: &D, options: &CleanOptions) -> DbResult<CleanReport> {
    let batch_size = options.batch_size.max(1);
    let mut report = CleanReport::default();
    let mut updates: Vec<Record> = Vec::new();

    let mut columns = vec![&options.key_column, &options.source_column];
    if let Some(reg) = &options.regiments {
        columns.push(&reg.source);
    }

    let mut start = 0usize;
    loop {
        tracing::info!(offset = start, limit = batch_size, "Fetching rows");
        let query = ViewQuery::new(&options.table)
            .columns(columns.iter().copied())
            .order_by(&options.key_column, Direction::Ascending)
            .limit(batch_size)
            .offset(start);
        let page = db.fetch(&query).await?.unwrap_or_default();
        if page.is_empty() {
            break;
        }
        let page_len = page.len();

        for row in page {
            let Some(key) = row.get(&options.key_column) else {
                tracing::warn!(row = ?row, "Row without key column skipped");
                continue;
            };
            let iso = row
                .get(&options.source_column)
                .and_then(Value::as_str)
                .and_then(dates::to_iso);
            match iso {
                Some(_) => report.parsed += 1,
                None => report.unparsed += 1,
            }
            let mut update = Record::new();
            update.insert(options.key_column.clone(), key.clone());
            update.insert(
                options.target_column.clone(),
                iso.map_or(Value::Null, Value::String),
            );
            if let Some(reg) = &options.regiments {
                let raw = row.get(&reg.source).and_then(Value::as_str);
                if raw.and_then(regiments::canonical).is_some() {
                    report.regiments_matched += 1;
                }
                update.insert(reg.target.clone(), Value::String(regiments::normalize(raw)));
            }
            updates.push(update);
        }

        report.fetched += page_len;
        start = start.saturating_add(page_len);
    }
    tracing::info!(
        fetched = report.fetched,
        parsed = report.parsed,
        unparsed = report.unparsed,
        regiments_matched = report.regiments_matched,
        "Rows normalized"
    );

    if options.dry_run {
        return Ok(report);
    }

    for (index, batch) in updates.chunks(batch_size).enumerate() {
        let first_row = index.saturating_mul(batch_size);
        match db
            .upsert(&options.table, &options.key_column, batch)
            .await
        {
            Ok(n) => {
                report.written += n;
                tracing::info!(batch = first_row, rows = n, "Batch written");
            }
            Err(e) => {
                tracing::error!(batch = first_row, error = %e, "Batch write failed, stopping");
                report.failed_batch = Some((first_row, e.to_string()));
                break;
            }
        }
    }
    Ok(report)
}
