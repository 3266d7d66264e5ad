use config::shared::{BatchConfig, PipelineConfig};
use ingest::mapping::InformationMapper;
use ingest::migrations::apply_migrations;
use ingest::pipeline::Pipeline;
use ingest::store::postgres::PostgresStore;
use ingest::types::Record;
use postgres::test_utils::PgDatabase;
use serde_json::{Value, json};
use sqlx::PgPool;
use telemetry::tracing::init_test_tracing;

fn information(uid: &str, details_page: &str, links: usize) -> Record {
    let record = json!({
        "uid": uid,
        "name": format!("Notice {uid}"),
        "tag_code": "policy",
        "tag_values": "notice",
        "data": {
            "description": "A notice",
            "info_date": "2024-05",
            "info_author": "Office",
            "info_section": ["one", "two", "three"]
        },
        "metadata": {"details_page": details_page, "marc_code": "zh"},
        "affiliated_data": {
            "link_data": (0..links)
                .map(|i| json!({"accessory_name": format!("file{i}"), "accessory_url": format!("oss://{uid}/{i}")}))
                .collect::<Vec<_>>()
        }
    });

    serde_json::from_value(record).unwrap()
}

fn pipeline(pool: &PgPool, max_size: usize) -> Pipeline<PostgresStore, InformationMapper> {
    let config = PipelineConfig {
        batch: BatchConfig {
            max_size,
            max_fill_ms: 60_000,
        },
        ..PipelineConfig::default()
    };

    Pipeline::from_config(
        &config,
        PostgresStore::from_pool(pool.clone()),
        InformationMapper::new(config.tables.clone()),
    )
    .unwrap()
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("select count(*) from {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn information_records_are_written_to_every_table() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();
    let source_id: i64 = sqlx::query_scalar(
        "insert into information_source (domain) values ('www.gov.cn') returning source_id",
    )
    .fetch_one(&database.pool)
    .await
    .unwrap();

    let stats = pipeline(&database.pool, 10)
        .run(futures::stream::iter(vec![
            information("n1", "https://www.gov.cn/a.htm", 2),
            information("n2", "https://unknown.example/b.htm", 0),
        ]))
        .await;

    assert_eq!(stats.batches_committed, 1);
    assert_eq!(count(&database.pool, "information_list").await, 2);
    assert_eq!(count(&database.pool, "information_tagging_relationships").await, 2);
    assert_eq!(count(&database.pool, "information_attachment").await, 2);
    assert_eq!(count(&database.pool, "information_section").await, 6);

    let sources: Vec<(String, Option<i64>)> = sqlx::query_as(
        "select information_id, source_id from information_list order by information_id",
    )
    .fetch_all(&database.pool)
    .await
    .unwrap();
    assert_eq!(
        sources,
        vec![("n1".to_string(), Some(source_id)), ("n2".to_string(), None)]
    );

    let name: Value =
        sqlx::query_scalar("select information_name from information_list where information_id = 'n1'")
            .fetch_one(&database.pool)
            .await
            .unwrap();
    assert_eq!(name, json!({"zh": "Notice n1"}));

    let orders: Vec<i32> = sqlx::query_scalar(
        "select display_order from information_attachment where information_id = 'n1' order by display_order",
    )
    .fetch_all(&database.pool)
    .await
    .unwrap();
    assert_eq!(orders, vec![1, 2]);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn replayed_records_are_not_written_twice() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();

    let records = vec![
        information("n1", "https://www.gov.cn/a.htm", 1),
        information("n2", "https://www.gov.cn/b.htm", 1),
    ];
    pipeline(&database.pool, 10)
        .run(futures::stream::iter(records.clone()))
        .await;
    let replay = pipeline(&database.pool, 10)
        .run(futures::stream::iter(records))
        .await;

    assert_eq!(replay.duplicates, 2);
    assert_eq!(replay.rows_written, 0);
    assert_eq!(count(&database.pool, "information_list").await, 2);
    assert_eq!(count(&database.pool, "information_attachment").await, 2);

    database.cleanup().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn conflicting_batch_is_rolled_back_and_next_batch_commits() {
    init_test_tracing();
    let database = PgDatabase::spawn().await;
    apply_migrations(&database.config).await.unwrap();

    // The first batch carries the same id twice, which violates the list table's key.
    let stats = pipeline(&database.pool, 2)
        .run(futures::stream::iter(vec![
            information("dup", "https://www.gov.cn/a.htm", 1),
            information("dup", "https://www.gov.cn/a.htm", 1),
            information("n3", "https://www.gov.cn/c.htm", 1),
        ]))
        .await;

    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_committed, 1);
    assert_eq!(count(&database.pool, "information_list").await, 1);
    assert_eq!(count(&database.pool, "information_tagging_relationships").await, 1);
    assert_eq!(count(&database.pool, "information_section").await, 3);

    database.cleanup().await;
}
