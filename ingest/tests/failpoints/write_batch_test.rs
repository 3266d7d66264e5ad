use config::shared::{BatchConfig, PipelineConfig};
use fail::FailScenario;
use ingest::error::ErrorKind;
use ingest::failpoints::{DEDUPLICATE__BEFORE_LOOKUP, WRITE_BATCH__AFTER_FIRST_TABLE};
use ingest::pipeline::Pipeline;
use ingest::stages::StageChain;
use ingest::store::memory::MemoryStore;
use ingest::test_utils::mapper::TwoTableMapper;
use ingest::test_utils::record::records;
use telemetry::tracing::init_test_tracing;

fn two_table_pipeline(store: &MemoryStore, max_size: usize) -> Pipeline<MemoryStore, TwoTableMapper> {
    let config = PipelineConfig {
        batch: BatchConfig {
            max_size,
            max_fill_ms: 60_000,
        },
        ..PipelineConfig::default()
    };

    Pipeline::new(
        &config,
        StageChain::default(),
        store.clone(),
        TwoTableMapper {
            primary: "information_list".to_string(),
            secondary: "information_section".to_string(),
        },
    )
}

#[tokio::test]
async fn failure_after_first_table_rolls_back_the_batch() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(WRITE_BATCH__AFTER_FIRST_TABLE, "return").unwrap();

    let store = MemoryStore::new();
    let pipeline = two_table_pipeline(&store, 10);

    let err = pipeline
        .process_batch(1, records(&["a", "b"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreQueryFailed);
    assert!(store.rows("information_list").await.is_empty());
    assert!(store.rows("information_section").await.is_empty());

    scenario.teardown();
}

#[tokio::test]
async fn one_failed_commit_does_not_stop_the_pipeline() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    // Only the first evaluation fails.
    fail::cfg(WRITE_BATCH__AFTER_FIRST_TABLE, "1*return(io)").unwrap();

    let store = MemoryStore::new();
    let pipeline = two_table_pipeline(&store, 2);

    let stats = pipeline
        .run(futures::stream::iter(records(&["a", "b", "c", "d"])))
        .await;

    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_committed, 1);
    assert_eq!(store.rows("information_list").await.len(), 2);
    assert_eq!(store.rows("information_section").await.len(), 2);

    scenario.teardown();
}

#[tokio::test]
async fn failed_key_lookup_writes_nothing() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(DEDUPLICATE__BEFORE_LOOKUP, "return(connection)").unwrap();

    let store = MemoryStore::new();
    let pipeline = two_table_pipeline(&store, 10);

    let err = pipeline
        .process_batch(1, records(&["a"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreConnectionFailed);
    assert_eq!(store.existing_keys_calls().await, 0);
    assert!(store.rows("information_list").await.is_empty());

    scenario.teardown();
}
