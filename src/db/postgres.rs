//! PostgreSQL database provider
//!
//! Concrete implementation using tokio-postgres. Rows are decoded column by
//! column into JSON records so they look the same as REST API rows.

use crate::config::{ConnectionConfig, SslMode};
use crate::db::query::{quote_ident, quote_relation};
use crate::db::types::Record;
use crate::db::{Database, ViewQuery};
use crate::error::{DbError, DbResult};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_postgres::Client;
use tokio_postgres::types::Type;

/// PostgreSQL database provider
pub struct PostgresProvider {
    /// The tokio-postgres client
    client: Client,
}

impl PostgresProvider {
    /// Connect to a PostgreSQL database.
    ///
    /// Returns the provider and a receiver that fires if the background
    /// connection is lost (e.g. server restart, idle timeout).
    pub async fn connect(
        config: &ConnectionConfig,
    ) -> DbResult<(Self, mpsc::UnboundedReceiver<String>)> {
        let conn_string = config.connection_string_with_password();
        let (conn_err_tx, conn_err_rx) = mpsc::unbounded_channel();

        let client = match config.ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(&conn_string, tokio_postgres::NoTls)
                        .await
                        .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                    }
                });
                client
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                let (client, connection) = tokio_postgres::connect(&conn_string, tls)
                    .await
                    .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        let _ = conn_err_tx.send(format!("Connection lost: {}", e));
                    }
                });
                client
            }
        };

        tracing::debug!(target_db = %config.name, "Connected to Postgres");
        Ok((Self { client }, conn_err_rx))
    }
}

impl Database for PostgresProvider {
    async fn fetch(&self, query: &ViewQuery) -> DbResult<Option<Vec<Record>>> {
        let sql = query.to_sql();
        let stmt = self
            .client
            .prepare(&sql)
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;

        let pg_rows = self
            .client
            .query(&stmt, &[])
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut record = Record::new();
            for (i, col) in pg_row.columns().iter().enumerate() {
                record.insert(col.name().to_string(), extract_json_value(pg_row, i));
            }
            rows.push(record);
        }
        Ok(Some(rows))
    }

    async fn upsert(&self, table: &str, key_column: &str, records: &[Record]) -> DbResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let sql = upsert_statement(table, key_column, records)?;
        let payload = Value::Array(records.iter().cloned().map(Value::Object).collect());
        self.client
            .execute(sql.as_str(), &[&payload])
            .await
            .map_err(|e| DbError::QueryFailed(e.to_string()))?;
        Ok(records.len())
    }
}

/// Build a single `INSERT ... ON CONFLICT DO UPDATE` for a batch.
///
/// The batch is bound as one JSONB parameter and expanded with the table's
/// own row type, so Postgres does every type coercion. Only the batch's
/// columns are written. All records must carry the same columns and
/// `key_column` must have a unique constraint.
fn upsert_statement(table: &str, key_column: &str, records: &[Record]) -> DbResult<String> {
    let first = records
        .first()
        .ok_or_else(|| DbError::QueryFailed("empty batch".into()))?;
    let columns: Vec<&String> = first.keys().filter(|c| *c != key_column).collect();

    for record in records {
        if !record.contains_key(key_column) {
            return Err(DbError::QueryFailed(format!(
                "record is missing key column \"{}\"",
                key_column
            )));
        }
        if record.len() != first.len() || !first.keys().all(|k| record.contains_key(k)) {
            return Err(DbError::QueryFailed(
                "all records in a batch must have the same columns".into(),
            ));
        }
    }
    if columns.is_empty() {
        return Err(DbError::QueryFailed(format!(
            "batch has no columns besides \"{}\"",
            key_column
        )));
    }

    let key = quote_ident(key_column);
    let column_list = std::iter::once(key.clone())
        .chain(columns.iter().map(|c| quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let assignments = columns
        .iter()
        .map(|c| format!("{col} = EXCLUDED.{col}", col = quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    let relation = quote_relation(table);
    Ok(format!(
        "INSERT INTO {rel} ({cols}) \
         SELECT {cols} FROM jsonb_populate_recordset(NULL::{rel}, $1) \
         ON CONFLICT ({key}) DO UPDATE SET {assignments}",
        rel = relation,
        cols = column_list,
        key = key,
        assignments = assignments,
    ))
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

/// Decode one column of a row into JSON.
///
/// Known types are decoded natively; anything else falls back to its text
/// form. NULL becomes JSON null.
fn extract_json_value(row: &tokio_postgres::Row, idx: usize) -> Value {
    match *row.columns()[idx].type_() {
        Type::INT2 => typed(row, idx, |v: i16| Value::from(v)),
        Type::INT4 => typed(row, idx, |v: i32| Value::from(v)),
        Type::INT8 => typed(row, idx, |v: i64| Value::from(v)),
        Type::FLOAT4 => typed(row, idx, |v: f32| float_value(v as f64)),
        Type::FLOAT8 => typed(row, idx, float_value),
        Type::NUMERIC => typed(row, idx, decimal_value),
        Type::BOOL => typed(row, idx, Value::Bool),
        Type::JSON | Type::JSONB => typed(row, idx, |v: Value| v),
        Type::UUID => typed(row, idx, |v: uuid::Uuid| Value::String(v.to_string())),
        Type::DATE => typed(row, idx, |v: chrono::NaiveDate| {
            Value::String(v.format("%Y-%m-%d").to_string())
        }),
        Type::TIMESTAMP => typed(row, idx, |v: chrono::NaiveDateTime| {
            Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }),
        Type::TIMESTAMPTZ => typed(row, idx, |v: chrono::DateTime<chrono::Utc>| {
            Value::String(v.to_rfc3339())
        }),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            typed(row, idx, |v: Vec<Option<String>>| Value::from(v))
        }
        Type::INT4_ARRAY => typed(row, idx, |v: Vec<Option<i32>>| Value::from(v)),
        Type::INT8_ARRAY => typed(row, idx, |v: Vec<Option<i64>>| Value::from(v)),
        Type::NUMERIC_ARRAY => typed(row, idx, |v: Vec<Option<Decimal>>| {
            Value::Array(
                v.into_iter()
                    .map(|d| d.map_or(Value::Null, decimal_value))
                    .collect(),
            )
        }),
        _ => try_as_string(row, idx),
    }
}

/// Decode a nullable column of Rust type `T`, falling back to text on mismatch.
fn typed<'a, T, F>(row: &'a tokio_postgres::Row, idx: usize, convert: F) -> Value
where
    T: tokio_postgres::types::FromSql<'a>,
    F: FnOnce(T) -> Value,
{
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => convert(v),
        Ok(None) => Value::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// NaN / Infinity aren't valid JSON numbers
fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f).map_or_else(|| Value::String(f.to_string()), Value::Number)
}

/// Numerics become JSON numbers when representable, otherwise strings.
fn decimal_value(d: Decimal) -> Value {
    let text = d.normalize().to_string();
    match text.parse::<serde_json::Number>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::String(text),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
fn try_as_string(row: &tokio_postgres::Row, idx: usize) -> Value {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => Value::String(v),
        Ok(None) => Value::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            Value::String(format!("<unable to decode: {}>", type_name))
        }
    }
}
