use ingest::error::ErrorKind;
use ingest::migrations::apply_migrations;
use ingest::store::RecordStore;
use ingest::store::postgres::PostgresStore;
use ingest::test_utils::record::json_row;
use ingest::types::TableRows;
use postgres::test_utils::PgDatabase;
use serde_json::json;
use telemetry::tracing::init_test_tracing;

fn list_rows(ids: &[&str]) -> TableRows {
    TableRows {
        table: "information_list".to_string(),
        rows: ids
            .iter()
            .map(|id| json_row(json!({"information_id": id})))
            .collect(),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn existing_keys_returns_only_persisted_candidates() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();
    let store = PostgresStore::from_pool(database.pool.clone());

    store.insert_rows(vec![list_rows(&["a", "b"])]).await.unwrap();

    let existing = store
        .existing_keys(
            "information_list",
            "information_id",
            &["b".to_string(), "c".to_string()],
        )
        .await
        .unwrap();

    assert_eq!(existing.len(), 1);
    assert!(existing.contains("b"));

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn lookup_row_matches_on_text_value() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();
    let store = PostgresStore::from_pool(database.pool.clone());

    sqlx::query("insert into information_source (domain, source_name) values ($1, $2)")
        .bind("www.gov.cn")
        .bind("State Council")
        .execute(&database.pool)
        .await
        .unwrap();

    let row = store
        .lookup_row("information_source", "domain", "www.gov.cn")
        .await
        .unwrap()
        .unwrap();
    let missing = store
        .lookup_row("information_source", "domain", "example.org")
        .await
        .unwrap();

    assert_eq!(row.get("source_name"), Some(&json!("State Council")));
    assert!(row.get("source_id").is_some_and(|id| id.is_i64()));
    assert!(missing.is_none());

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_table_rolls_back_earlier_tables() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();
    let store = PostgresStore::from_pool(database.pool.clone());

    // The tagging row references an information id that does not exist.
    let err = store
        .insert_rows(vec![
            list_rows(&["a"]),
            TableRows {
                table: "information_tagging_relationships".to_string(),
                rows: vec![json_row(json!({"information_id": "missing", "tag_code": "x"}))],
            },
        ])
        .await
        .unwrap_err();

    let count: i64 = sqlx::query_scalar("select count(*) from information_list")
        .fetch_one(&database.pool)
        .await
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
    assert_eq!(count, 0);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn migrations_can_run_twice() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;

    apply_migrations(&database.config).await.unwrap();
    apply_migrations(&database.config).await.unwrap();

    let bookkeeping: Option<String> =
        sqlx::query_scalar("select to_regclass('ingest._sqlx_migrations')::text")
            .fetch_one(&database.pool)
            .await
            .unwrap();
    assert!(bookkeeping.is_some());

    database.cleanup().await;
}
