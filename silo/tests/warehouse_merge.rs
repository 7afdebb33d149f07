//! Merge engine scenarios against a live warehouse database.
//!
//! These tests require a local Postgres instance reachable through the
//! `TESTS_DATABASE_*` environment variables, with a user allowed to run
//! server-side `COPY FROM` (staged batches are written to files the
//! server can read).

#![cfg(feature = "test-utils")]

use std::path::PathBuf;

use silo::encode::to_csv;
use silo::error::ErrorKind;
use silo::merge::{MergeDirective, MergeStats};
use silo::test_utils::database::{TestDatabase, spawn_warehouse_database, test_table_name};
use silo::types::{Batch, Cell};
use silo::warehouse::WarehouseClient;
use silo_telemetry::tracing::init_test_tracing;
use uuid::Uuid;

/// Load options for server-side CSV files with a header row.
const CSV_LOAD_OPTIONS: &str = "WITH (FORMAT csv, HEADER true)";

fn text(value: &str) -> Cell {
    Cell::String(value.to_string())
}

fn batch(rows: &[(i32, &str)]) -> Batch {
    Batch::new(
        vec!["id".to_string(), "val".to_string()],
        rows.iter()
            .map(|(id, val)| vec![Cell::I32(*id), text(val)])
            .collect(),
    )
    .expect("test batch should be valid")
}

/// Writes a staged CSV file the warehouse server can read.
fn stage_to_file(batch: &Batch) -> PathBuf {
    let payload = to_csv(batch, ',', true).expect("batch should serialize");

    let path = std::env::temp_dir().join(format!("silo_stage_{}.csv", Uuid::new_v4().simple()));
    std::fs::write(&path, payload).expect("staged file should be writable");

    path
}

fn directive(staged: &PathBuf, insert_only: bool) -> MergeDirective {
    MergeDirective {
        table: test_table_name("targets"),
        primary_key: "id".to_string(),
        stage_locator: staged.display().to_string(),
        load_options: CSV_LOAD_OPTIONS.to_string(),
        insert_only,
    }
}

async fn create_target_table(database: &TestDatabase, seed: &[(i32, &str)]) {
    database
        .client
        .execute(
            "create table test.targets (id int primary key, val text)",
            &[],
        )
        .await
        .expect("target table should be created");

    for (id, val) in seed {
        let params: &[&(dyn tokio_postgres::types::ToSql + Sync)] = &[id, val];
        database
            .client
            .execute("insert into test.targets (id, val) values ($1, $2)", params)
            .await
            .expect("seed row should insert");
    }
}

async fn target_rows(database: &TestDatabase) -> Vec<(i32, String)> {
    database
        .client
        .query("select id, val from test.targets order by id", &[])
        .await
        .expect("target rows should be readable")
        .iter()
        .map(|row| (row.get(0), row.get(1)))
        .collect()
}

async fn run_merge(
    database: &TestDatabase,
    directive: &MergeDirective,
    columns: &[String],
) -> Result<MergeStats, silo::error::SiloError> {
    let mut warehouse = WarehouseClient::connect(&database.config)
        .await
        .expect("warehouse should be reachable");

    warehouse.merge_batch(directive, columns).await
}

fn merge_columns() -> Vec<String> {
    vec!["id".to_string(), "val".to_string()]
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_updates_matching_rows_and_inserts_new_ones() {
    init_test_tracing();

    let database = spawn_warehouse_database().await;
    create_target_table(&database, &[(1, "a")]).await;

    let staged = stage_to_file(&batch(&[(1, "b"), (2, "c")]));
    let directive = directive(&staged, false);

    let stats = run_merge(&database, &directive, &merge_columns())
        .await
        .expect("merge should succeed");

    assert_eq!(stats.rows_loaded, 2);
    assert_eq!(stats.rows_updated, 1);
    assert_eq!(stats.rows_inserted, 1);
    assert_eq!(
        target_rows(&database).await,
        vec![(1, "b".to_string()), (2, "c".to_string())]
    );

    let _ = std::fs::remove_file(staged);
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_only_merge_skips_the_update_step() {
    init_test_tracing();

    let database = spawn_warehouse_database().await;
    create_target_table(&database, &[(1, "a")]).await;

    let staged = stage_to_file(&batch(&[(1, "b"), (2, "c")]));
    let directive = directive(&staged, true);

    let stats = run_merge(&database, &directive, &merge_columns())
        .await
        .expect("merge should succeed");

    assert_eq!(stats.rows_updated, 0);
    assert_eq!(stats.rows_inserted, 1);
    assert_eq!(
        target_rows(&database).await,
        vec![(1, "a".to_string()), (2, "c".to_string())]
    );

    let _ = std::fs::remove_file(staged);
}

#[tokio::test(flavor = "multi_thread")]
async fn merging_the_same_batch_twice_adds_no_duplicate_rows() {
    init_test_tracing();

    let database = spawn_warehouse_database().await;
    create_target_table(&database, &[]).await;

    let staged = stage_to_file(&batch(&[(1, "b"), (2, "c")]));
    let directive = directive(&staged, false);

    let first = run_merge(&database, &directive, &merge_columns())
        .await
        .expect("first merge should succeed");
    assert_eq!(first.rows_inserted, 2);

    let second = run_merge(&database, &directive, &merge_columns())
        .await
        .expect("second merge should succeed");
    assert_eq!(second.rows_inserted, 0);

    assert_eq!(target_rows(&database).await.len(), 2);

    let _ = std::fs::remove_file(staged);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_batch_leaves_the_target_unchanged() {
    init_test_tracing();

    let database = spawn_warehouse_database().await;
    create_target_table(&database, &[(1, "a")]).await;

    let staged = stage_to_file(&batch(&[]));
    let directive = directive(&staged, false);

    let stats = run_merge(&database, &directive, &merge_columns())
        .await
        .expect("empty merge should succeed");

    assert_eq!(stats.rows_loaded, 0);
    assert_eq!(stats.rows_updated, 0);
    assert_eq!(stats.rows_inserted, 0);
    assert_eq!(target_rows(&database).await, vec![(1, "a".to_string())]);

    let _ = std::fs::remove_file(staged);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_batch_column_fails_the_load_and_rolls_back() {
    init_test_tracing();

    let database = spawn_warehouse_database().await;
    create_target_table(&database, &[(1, "a")]).await;

    let bad_batch = Batch::new(
        vec!["id".to_string(), "missing".to_string()],
        vec![vec![Cell::I32(2), text("x")]],
    )
    .expect("batch should build");
    let staged = stage_to_file(&bad_batch);
    let directive = directive(&staged, false);

    let error = run_merge(
        &database,
        &directive,
        &vec!["id".to_string(), "missing".to_string()],
    )
    .await
    .expect_err("load should fail on the unknown column");

    assert_eq!(error.kind(), ErrorKind::LoadFormatMismatch);
    assert_eq!(target_rows(&database).await, vec![(1, "a".to_string())]);

    let _ = std::fs::remove_file(staged);
}
