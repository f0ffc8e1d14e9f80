//! Integration tests for DashboardLoader
//!
//! Run against the scripted MockDatabase and the in-memory backend.

use super::common::{Behavior, MockDatabase, VIEWS, rows, sample_rows, surname_rows};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing_test::traced_test;
use wardead::config::{Settings, SourceConfig};
use wardead::dashboard::{self, DashboardLoader, DashboardQueries, Field, FieldOutcome};
use wardead::db::{Direction, MemoryDatabase};
use wardead::error::ConfigError;

fn loader(db: MockDatabase) -> DashboardLoader<MockDatabase> {
    DashboardLoader::new(Arc::new(db), DashboardQueries::default())
}

fn behavior(code: usize, view: &str) -> Behavior {
    match code {
        0 => Behavior::Rows(sample_rows(view)),
        1 => Behavior::Fail(format!("{} is broken", view)),
        _ => Behavior::Null,
    }
}

#[tokio::test]
async fn test_every_outcome_combination_yields_four_arrays() {
    // Each view independently succeeds, fails or returns null: 3^4 cases.
    for case in 0..81usize {
        let codes: Vec<usize> = (0..4).map(|i| (case / 3usize.pow(i)) % 3).collect();
        let db = VIEWS
            .iter()
            .zip(&codes)
            .fold(MockDatabase::new(), |db, (view, code)| {
                db.with(view, behavior(*code, view))
            });

        let payload = loader(db).load().await;
        let value = serde_json::to_value(&payload).unwrap();
        for (field, code) in Field::ALL.iter().zip(&codes) {
            let array = value[field.key()]
                .as_array()
                .unwrap_or_else(|| panic!("case {}: {} is not an array", case, field));
            let expected = if *code == 0 { 2 } else { 0 };
            assert_eq!(array.len(), expected, "case {}: {}", case, field);
        }
    }
}

#[tokio::test]
async fn test_successful_rows_pass_through_unmodified() {
    let map = rows(json!([
        {"name": "Pte. A. Adams", "lat": 52.8061, "lng": -2.1163, "regiment": null},
        {"name": "Sgt. B. Bates", "lat": 52.99, "lng": -2.0, "extra": {"nested": [1, 2]}}
    ]));
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Rows(map.clone()))
        .with(VIEWS[1], Behavior::Rows(vec![]))
        .with(VIEWS[2], Behavior::Rows(sample_rows(VIEWS[2])))
        .with(VIEWS[3], Behavior::Rows(sample_rows(VIEWS[3])));

    let payload = loader(db).load().await;
    assert_eq!(payload.map_data, map);
    assert!(payload.rank_stats.is_empty());
    assert_eq!(payload.timeline, sample_rows(VIEWS[2]));
    assert_eq!(payload.surnames, sample_rows(VIEWS[3]));
}

#[tokio::test]
async fn test_one_failure_does_not_affect_other_fields() {
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Rows(sample_rows(VIEWS[0])))
        .with(VIEWS[1], Behavior::Fail("permission denied".into()))
        .with(VIEWS[2], Behavior::Rows(sample_rows(VIEWS[2])))
        .with(VIEWS[3], Behavior::Rows(sample_rows(VIEWS[3])));

    let report = loader(db).load_report().await;
    assert_eq!(report.failed_fields(), vec![Field::RankStats]);
    assert!(matches!(
        report.get(Field::RankStats),
        FieldOutcome::Failed(msg) if msg.contains("permission denied")
    ));
    assert_eq!(report.get(Field::MapData).row_count(), 2);
    assert_eq!(report.get(Field::Timeline).row_count(), 2);
    assert_eq!(report.get(Field::Surnames).row_count(), 2);
}

#[tokio::test]
async fn test_null_result_is_empty_not_failed() {
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Null)
        .with(VIEWS[1], Behavior::Null)
        .with(VIEWS[2], Behavior::Null)
        .with(VIEWS[3], Behavior::Null);

    let report = loader(db).load_report().await;
    assert!(report.failed_fields().is_empty());
    assert_eq!(report.get(Field::MapData), &FieldOutcome::Empty);
    assert_eq!(
        serde_json::to_value(report.into_payload()).unwrap(),
        json!({"mapData": [], "rankStats": [], "timeline": [], "surnames": []})
    );
}

#[tokio::test]
async fn test_panic_in_fan_out_empties_every_field() {
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Rows(sample_rows(VIEWS[0])))
        .with(VIEWS[1], Behavior::Rows(sample_rows(VIEWS[1])))
        .with(VIEWS[2], Behavior::Panic)
        .with(VIEWS[3], Behavior::Rows(sample_rows(VIEWS[3])));

    let report = loader(db).load_report().await;
    assert_eq!(report.failed_fields(), Field::ALL.to_vec());
    assert!(matches!(
        report.get(Field::MapData),
        FieldOutcome::Failed(msg) if msg.contains("scripted panic")
    ));

    let payload = report.into_payload();
    assert!(payload.map_data.is_empty());
    assert!(payload.surnames.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wall_clock_is_bounded_by_slowest_query() {
    let db = VIEWS
        .iter()
        .enumerate()
        .fold(MockDatabase::new(), |db, (i, view)| {
            db.with_delay(
                view,
                Behavior::Rows(sample_rows(view)),
                Duration::from_millis(10 * (i as u64 + 1)),
            )
        });

    let started = tokio::time::Instant::now();
    let payload = loader(db).load().await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(40), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(100), "elapsed {:?}", elapsed);
    assert_eq!(payload.surnames.len(), 2);
}

#[tokio::test]
async fn test_all_four_queries_are_issued_with_default_shaping() {
    let db = Arc::new(MockDatabase::new());
    let loader = DashboardLoader::new(db.clone(), DashboardQueries::default());
    loader.load().await;

    let mut fetched = db.fetched();
    fetched.sort_by(|a, b| a.view.cmp(&b.view));
    let views: Vec<&str> = fetched.iter().map(|q| q.view.as_str()).collect();
    assert_eq!(
        views,
        vec![
            "daily_deaths_pivoted",
            "death_by_surname_regiment",
            "memorial_map_view",
            "stats_by_rank"
        ]
    );
    let surnames = &fetched[1];
    assert_eq!(surnames.limit, Some(500));
    assert_eq!(
        surnames.order.as_ref().map(|o| (o.column.as_str(), o.direction)),
        Some(("total_count", Direction::Descending))
    );
}

#[tokio::test]
async fn test_surnames_are_top_500_sorted_descending() {
    let db = MemoryDatabase::new()
        .with_view(VIEWS[0], vec![])
        .with_view(VIEWS[1], vec![])
        .with_view(VIEWS[2], vec![])
        .with_view(VIEWS[3], surname_rows(750));

    let payload = DashboardLoader::new(Arc::new(db), DashboardQueries::default())
        .load()
        .await;

    assert_eq!(payload.surnames.len(), 500);
    let totals: Vec<u64> = payload
        .surnames
        .iter()
        .map(|r| r["total_count"].as_u64().unwrap())
        .collect();
    assert!(totals.windows(2).all(|w| w[0] >= w[1]), "not sorted descending");
}

#[tokio::test(start_paused = true)]
async fn test_query_timeout_fails_only_the_slow_field() {
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Rows(sample_rows(VIEWS[0])))
        .with(VIEWS[1], Behavior::Rows(sample_rows(VIEWS[1])))
        .with(VIEWS[2], Behavior::Rows(sample_rows(VIEWS[2])))
        .with_delay(
            VIEWS[3],
            Behavior::Rows(sample_rows(VIEWS[3])),
            Duration::from_secs(60),
        );

    let report = loader(db)
        .with_query_timeout(Some(Duration::from_secs(5)))
        .load_report()
        .await;

    assert_eq!(report.failed_fields(), vec![Field::Surnames]);
    assert!(matches!(
        report.get(Field::Surnames),
        FieldOutcome::Failed(msg) if msg.contains("timed out")
    ));
}

#[tokio::test]
#[traced_test]
async fn test_failed_query_is_logged_with_field_and_view() {
    let db = MockDatabase::new()
        .with(VIEWS[0], Behavior::Rows(vec![]))
        .with(VIEWS[1], Behavior::Rows(vec![]))
        .with(VIEWS[2], Behavior::Fail("connection reset".into()))
        .with(VIEWS[3], Behavior::Rows(vec![]));

    loader(db).load().await;

    assert!(logs_contain("Dashboard query failed"));
    assert!(logs_contain("daily_deaths_pivoted"));
    assert!(logs_contain("connection reset"));
}

#[tokio::test]
#[traced_test]
async fn test_missing_configuration_yields_empty_payload() {
    let source: Result<SourceConfig, ConfigError> =
        Err(ConfigError::Missing("PUBLIC_SUPABASE_URL".into()));

    let report = dashboard::load_from_source(source, &Settings::default()).await;
    assert_eq!(report.failed_fields(), Field::ALL.to_vec());

    let value: Value = serde_json::to_value(report.into_payload()).unwrap();
    assert_eq!(
        value,
        json!({"mapData": [], "rankStats": [], "timeline": [], "surnames": []})
    );
    assert!(logs_contain("PUBLIC_SUPABASE_URL"));
}

#[tokio::test]
async fn test_unreadable_fixtures_yield_empty_payload() {
    let source = Ok(SourceConfig::Fixtures(
        std::env::temp_dir().join("wardead-fixtures-that-do-not-exist"),
    ));
    let report = dashboard::load_from_source(source, &Settings::default()).await;
    assert_eq!(report.failed_fields().len(), 4);
}
