//! Integration tests for PostgresProvider
//!
//! These tests require a PostgreSQL database and skip themselves when none
//! is reachable. Each test works in its own scratch table.

use serde_json::json;
use wardead::config::{ConnectionConfig, SslMode};
use wardead::db::{Database, Direction, PostgresProvider, ViewQuery};
use wardead::error::DbError;
use wardead::maintenance::{self, CleanOptions};

/// Get test database connection config
fn test_config() -> ConnectionConfig {
    ConnectionConfig {
        name: "integration-test".to_string(),
        host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: std::env::var("TEST_DB_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5433),
        database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "test_db".to_string()),
        username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "test_user".to_string()),
        password: Some(
            std::env::var("TEST_DB_PASSWORD").unwrap_or_else(|_| "test_password".to_string()),
        ),
        ssl_mode: SslMode::Disable,
    }
}

/// Scratch table plus a raw client for setup and verification
struct Scratch {
    table: String,
    client: tokio_postgres::Client,
}

impl Scratch {
    async fn create(name: &str, ddl_columns: &str) -> Option<(PostgresProvider, Scratch)> {
        let config = test_config();
        let provider = match PostgresProvider::connect(&config).await {
            Ok((p, _)) => p,
            Err(e) => {
                eprintln!(
                    "Skipping test: Database not available at {}:{} - {}",
                    config.host, config.port, e
                );
                return None;
            }
        };
        let (client, connection) =
            tokio_postgres::connect(&config.connection_string_with_password(), tokio_postgres::NoTls)
                .await
                .ok()?;
        tokio::spawn(connection);

        let table = format!("wardead_it_{}_{}", name, std::process::id());
        client
            .batch_execute(&format!(
                "DROP TABLE IF EXISTS {t}; CREATE TABLE {t} ({cols})",
                t = table,
                cols = ddl_columns
            ))
            .await
            .expect("create scratch table");
        Some((provider, Scratch { table, client }))
    }

    async fn exec(&self, sql: &str) {
        self.client.batch_execute(sql).await.expect("setup statement");
    }

    async fn cleanup(self) {
        let _ = self
            .client
            .batch_execute(&format!("DROP TABLE IF EXISTS {}", self.table))
            .await;
    }
}

#[tokio::test]
async fn test_connect_to_database() {
    let config = test_config();
    if let Err(e) = PostgresProvider::connect(&config).await {
        eprintln!(
            "Skipping test: Database not available at {}:{} - {}",
            config.host, config.port, e
        );
    }
}

#[tokio::test]
async fn test_connection_failure() {
    let mut config = test_config();
    config.host = "127.0.0.1".to_string();
    config.port = 1;

    let result = PostgresProvider::connect(&config).await;
    assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_fetch_decodes_column_types() {
    let Some((provider, scratch)) = Scratch::create(
        "types",
        "id integer PRIMARY KEY, surname text, total_count bigint, lat numeric(9,6), \
         died date, iso_date date, tags text[], extra jsonb, ratio double precision",
    )
    .await
    else {
        return;
    };
    scratch
        .exec(&format!(
            "INSERT INTO {} VALUES \
             (1, 'Adams', 3, 52.8061, '1916-07-01', NULL, ARRAY['a', NULL], '{{\"k\": \"v\"}}', 0.5)",
            scratch.table
        ))
        .await;

    let rows = provider
        .fetch(&ViewQuery::new(&scratch.table))
        .await
        .expect("fetch")
        .expect("rows");

    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["id"], json!(1));
    assert_eq!(row["surname"], json!("Adams"));
    assert_eq!(row["total_count"], json!(3));
    assert_eq!(row["lat"], json!(52.8061));
    assert_eq!(row["died"], json!("1916-07-01"));
    assert!(row["iso_date"].is_null());
    assert_eq!(row["tags"], json!(["a", null]));
    assert_eq!(row["extra"], json!({"k": "v"}));
    assert_eq!(row["ratio"], json!(0.5));

    let columns: Vec<&String> = row.keys().collect();
    assert_eq!(columns[0], "id");
    assert_eq!(columns[1], "surname");

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_fetch_applies_projection_order_and_limit() {
    let Some((provider, scratch)) = Scratch::create(
        "shaping",
        "surname text, regiment text, total_count integer",
    )
    .await
    else {
        return;
    };
    scratch
        .exec(&format!(
            "INSERT INTO {} VALUES ('Adams', 'N. Staffs', 3), ('Bates', 'S. Staffs', 11), \
             ('Clarke', 'N. Staffs', 7), ('Dean', 'S. Staffs', 1), ('Evans', 'N. Staffs', 9)",
            scratch.table
        ))
        .await;

    let query = ViewQuery::new(&scratch.table)
        .columns(["surname", "total_count"])
        .order_by("total_count", Direction::Descending)
        .limit(3);
    let rows = provider.fetch(&query).await.expect("fetch").expect("rows");

    let surnames: Vec<&str> = rows.iter().map(|r| r["surname"].as_str().unwrap()).collect();
    assert_eq!(surnames, vec!["Bates", "Evans", "Clarke"]);
    assert!(rows.iter().all(|r| r.len() == 2));

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_missing_relation_is_query_failed() {
    let config = test_config();
    let provider = match PostgresProvider::connect(&config).await {
        Ok((p, _)) => p,
        Err(_) => {
            eprintln!("Skipping test: Database not available");
            return;
        }
    };

    let result = provider.fetch(&ViewQuery::new("wardead_no_such_view")).await;
    assert!(matches!(result, Err(DbError::QueryFailed(_))));
}

#[tokio::test]
async fn test_clean_dates_writes_iso_dates() {
    let Some((provider, scratch)) = Scratch::create(
        "clean",
        "id integer PRIMARY KEY, surname text, date_of_death text, iso_date date",
    )
    .await
    else {
        return;
    };
    scratch
        .exec(&format!(
            "INSERT INTO {} (id, surname, date_of_death) VALUES \
             (1, 'Adams', 'July 1st, 1916'), (2, 'Bates', 'unknown'), (3, 'Clarke', '11/11/1918')",
            scratch.table
        ))
        .await;

    let options = CleanOptions {
        table: scratch.table.clone(),
        batch_size: 2,
        ..CleanOptions::default()
    };
    let report = maintenance::clean_dates(&provider, &options)
        .await
        .expect("clean dates");
    assert_eq!(report.fetched, 3);
    assert_eq!(report.parsed, 2);
    assert_eq!(report.written, 3);
    assert!(report.failed_batch.is_none());

    let rows = scratch
        .client
        .query(
            &format!("SELECT id, iso_date::text, surname FROM {} ORDER BY id", scratch.table),
            &[],
        )
        .await
        .expect("verify");
    let dates: Vec<Option<String>> = rows.iter().map(|r| r.get(1)).collect();
    assert_eq!(
        dates,
        vec![Some("1916-07-01".to_string()), None, Some("1918-11-11".to_string())]
    );
    let surname: String = rows[0].get(2);
    assert_eq!(surname, "Adams");

    scratch.cleanup().await;
}

#[tokio::test]
async fn test_upsert_updates_and_inserts() {
    let Some((provider, scratch)) = Scratch::create(
        "upsert",
        "id integer PRIMARY KEY, surname text, iso_date date",
    )
    .await
    else {
        return;
    };
    scratch
        .exec(&format!(
            "INSERT INTO {} VALUES (1, 'Adams', NULL)",
            scratch.table
        ))
        .await;

    let batch: Vec<wardead::db::Record> = [
        json!({"id": 1, "iso_date": "1916-07-01"}),
        json!({"id": 2, "iso_date": "1918-11-11"}),
    ]
    .into_iter()
    .map(|v| v.as_object().cloned().unwrap())
    .collect();
    let written = provider
        .upsert(&scratch.table, "id", &batch)
        .await
        .expect("upsert");
    assert_eq!(written, 2);

    let rows = scratch
        .client
        .query(
            &format!("SELECT id, surname, iso_date::text FROM {} ORDER BY id", scratch.table),
            &[],
        )
        .await
        .expect("verify");
    assert_eq!(rows.len(), 2);
    let surname: Option<String> = rows[0].get(1);
    assert_eq!(surname.as_deref(), Some("Adams"));
    let inserted: Option<String> = rows[1].get(1);
    assert!(inserted.is_none());
    let date: Option<String> = rows[1].get(2);
    assert_eq!(date.as_deref(), Some("1918-11-11"));

    scratch.cleanup().await;
}
