#![cfg(feature = "test-utils")]

use std::time::Duration;

use config::shared::{
    BatchConfig, BuiltinStage, ParallelBranchConfig, PipelineConfig, ProcessorConfig, StageConfig,
};
use ingest::pipeline::{Pipeline, build_processor_chain, build_stage_chain};
use ingest::processor::ProcessorRegistry;
use ingest::source::{channel_source, ndjson_records};
use ingest::stages::parallel::{ParallelBranch, ParallelStageGroup};
use ingest::stages::{Stage, StageChain};
use ingest::store::memory::MemoryStore;
use ingest::test_utils::mapper::{KeyOnlyMapper, TwoTableMapper};
use ingest::test_utils::record::{article, json_row, records, uids};
use ingest::test_utils::stage::{FailOnUid, RecordingStage};
use ingest::types::Record;
use serde_json::{Value, json};
use telemetry::tracing::init_test_tracing;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

fn pipeline_config(max_size: usize, max_fill_ms: u64) -> PipelineConfig {
    PipelineConfig {
        batch: BatchConfig {
            max_size,
            max_fill_ms,
        },
        ..PipelineConfig::default()
    }
}

fn recording_chain(recorder: &RecordingStage) -> StageChain {
    StageChain::new(vec![Stage::per_batch("record", recorder.clone())])
}

#[tokio::test]
async fn batches_are_cut_at_max_size_and_flushed_on_close() {
    init_test_tracing();

    let store = MemoryStore::new();
    let recorder = RecordingStage::new();
    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        recording_chain(&recorder),
        store.clone(),
        KeyOnlyMapper::default(),
    );

    let source = futures::stream::iter((0..25).map(|i| Record::new(format!("r{i}"))));
    let stats = pipeline.run(source).await;

    let sizes: Vec<usize> = recorder.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    assert_eq!(stats.batches_committed, 3);
    assert_eq!(stats.rows_written, 25);
    assert_eq!(store.rows("information_list").await.len(), 25);
}

#[tokio::test(start_paused = true)]
async fn partial_batch_is_emitted_after_the_timeout() {
    init_test_tracing();

    let store = MemoryStore::new();
    let recorder = RecordingStage::new();
    let pipeline = Pipeline::new(
        &pipeline_config(10, 500),
        recording_chain(&recorder),
        store.clone(),
        KeyOnlyMapper::default(),
    );

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move { pipeline.run(channel_source(rx)).await });

    for record in records(&["a", "b", "c"]) {
        tx.send(record).await.unwrap();
    }

    // Nothing is emitted before the window expires.
    sleep(Duration::from_millis(400)).await;
    assert!(recorder.batches().is_empty());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(recorder.batch_uids(), vec![vec!["a", "b", "c"]]);

    drop(tx);
    let stats = handle.await.unwrap();

    // No empty batch is emitted when the source closes with nothing pending.
    assert_eq!(stats.batches_committed, 1);
    assert_eq!(recorder.batches().len(), 1);
}

#[tokio::test]
async fn size_one_delivers_each_record_on_its_own() {
    init_test_tracing();

    let recorder = RecordingStage::new();
    let pipeline = Pipeline::new(
        &pipeline_config(1, 60_000),
        recording_chain(&recorder),
        MemoryStore::new(),
        KeyOnlyMapper::default(),
    );

    pipeline
        .run(futures::stream::iter(records(&["a", "b", "c"])))
        .await;

    assert_eq!(
        recorder.batch_uids(),
        vec![vec!["a"], vec!["b"], vec!["c"]]
    );
}

#[tokio::test]
async fn replaying_the_same_records_writes_nothing_new() {
    init_test_tracing();

    let store = MemoryStore::new();
    let config = pipeline_config(3, 60_000);
    let input = records(&["a", "b", "c", "d", "e"]);

    let first = Pipeline::from_config(&config, store.clone(), KeyOnlyMapper::default()).unwrap();
    let first_stats = first.run(futures::stream::iter(input.clone())).await;

    let second = Pipeline::from_config(&config, store.clone(), KeyOnlyMapper::default()).unwrap();
    let second_stats = second.run(futures::stream::iter(input)).await;

    assert_eq!(first_stats.rows_written, 5);
    assert_eq!(second_stats.rows_written, 0);
    assert_eq!(second_stats.duplicates, 5);
    assert_eq!(store.rows("information_list").await.len(), 5);
}

#[tokio::test]
async fn already_persisted_keys_are_dropped_and_order_is_kept() {
    init_test_tracing();

    let store = MemoryStore::new();
    store
        .seed_rows(
            "information_list",
            vec![json_row(json!({"information_id": "b"}))],
        )
        .await;
    let pipeline = Pipeline::from_config(
        &pipeline_config(10, 60_000),
        store.clone(),
        KeyOnlyMapper::default(),
    )
    .unwrap();

    let stats = pipeline
        .run(futures::stream::iter(records(&["c", "b", "a"])))
        .await;

    let keys: Vec<Value> = store
        .rows("information_list")
        .await
        .into_iter()
        .filter_map(|mut row| row.remove("information_id"))
        .collect();
    assert_eq!(keys, vec![json!("b"), json!("c"), json!("a")]);
    assert_eq!(stats.duplicates, 1);
}

#[tokio::test]
async fn failed_commit_leaves_every_table_untouched() {
    init_test_tracing();

    let store = MemoryStore::new();
    store.fail_inserts_into("information_section").await;
    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        StageChain::default(),
        store.clone(),
        TwoTableMapper {
            primary: "information_list".to_string(),
            secondary: "information_section".to_string(),
        },
    );

    let stats = pipeline
        .run(futures::stream::iter(records(&["a", "b"])))
        .await;

    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_committed, 0);
    assert!(store.rows("information_list").await.is_empty());
    assert!(store.rows("information_section").await.is_empty());
}

#[tokio::test]
async fn failing_stage_drops_only_its_batch() {
    init_test_tracing();

    let store = MemoryStore::new();
    let pipeline = Pipeline::new(
        &pipeline_config(2, 60_000),
        StageChain::new(vec![Stage::per_record(
            "reject",
            FailOnUid("bad".to_string()),
        )]),
        store.clone(),
        KeyOnlyMapper::default(),
    );

    let stats = pipeline
        .run(futures::stream::iter(records(&["a", "bad", "c", "d"])))
        .await;

    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.batches_committed, 1);
    let keys: Vec<Value> = store
        .rows("information_list")
        .await
        .into_iter()
        .filter_map(|mut row| row.remove("information_id"))
        .collect();
    assert_eq!(keys, vec![json!("c"), json!("d")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_stages_normalize_an_article() {
    init_test_tracing();

    let mut chain = build_stage_chain(&[
        StageConfig::Builtin {
            stage: BuiltinStage::StripTitle,
            preserves_input: false,
        },
        StageConfig::Parallel {
            name: "people_and_counts".to_string(),
            preserves_input: false,
            branches: vec![
                ParallelBranchConfig {
                    stage: BuiltinStage::NormalizeAuthor,
                    owned_fields: vec!["author".to_string()],
                },
                ParallelBranchConfig {
                    stage: BuiltinStage::ClampViewCount,
                    owned_fields: vec!["viewCount".to_string()],
                },
            ],
        },
    ])
    .unwrap();
    let recorder = RecordingStage::new();
    chain.push(Stage::per_batch("record", recorder.clone()));

    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        chain,
        MemoryStore::new(),
        KeyOnlyMapper::default(),
    );
    pipeline
        .run(futures::stream::iter(vec![article("x1", "  hi  ", "jo", -5)]))
        .await;

    let batches = recorder.batches();
    assert_eq!(
        Value::Object(batches[0][0].data.clone()),
        json!({"title": "hi", "author": "Jo", "viewCount": 0})
    );
}

#[tokio::test]
async fn preserving_stage_does_not_change_the_batch() {
    init_test_tracing();

    let mut chain = build_stage_chain(&[StageConfig::Builtin {
        stage: BuiltinStage::StripTitle,
        preserves_input: true,
    }])
    .unwrap();
    let recorder = RecordingStage::new();
    chain.push(Stage::per_batch("record", recorder.clone()));

    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        chain,
        MemoryStore::new(),
        KeyOnlyMapper::default(),
    );
    pipeline
        .run(futures::stream::iter(vec![article("x1", "  hi  ", "jo", 1)]))
        .await;

    assert_eq!(recorder.batches()[0][0].data_str("title"), Some("  hi  "));
}

#[tokio::test]
async fn processors_run_in_priority_order_while_reading_ndjson() {
    init_test_tracing();

    let mut config = pipeline_config(10, 60_000);
    config.processors = vec![
        ProcessorConfig {
            name: "clamp_view_count".to_string(),
            priority: 1,
        },
        ProcessorConfig {
            name: "strip_title".to_string(),
            priority: 0,
        },
        ProcessorConfig {
            name: "normalize_author".to_string(),
            priority: 1,
        },
    ];
    let processors = build_processor_chain(&config, ProcessorRegistry::with_builtins());

    let recorder = RecordingStage::new();
    let pipeline = Pipeline::new(
        &config,
        recording_chain(&recorder),
        MemoryStore::new(),
        KeyOnlyMapper::default(),
    );

    let input: &'static [u8] = br#"{"uid": "x1", "data": {"title": "  hi  ", "author": "jo", "viewCount": -5}}
{"uid": "x2", "data": {"title": "ok", "author": "ann lee", "viewCount": 3}}
"#;
    let stats = pipeline.run(ndjson_records(input, processors)).await;

    let batches = recorder.batches();
    assert_eq!(uids(&batches[0]), vec!["x1", "x2"]);
    assert_eq!(
        Value::Object(batches[0][0].data.clone()),
        json!({"title": "hi", "author": "Jo", "viewCount": 0})
    );
    assert_eq!(batches[0][1].data_str("author"), Some("Ann Lee"));
    assert_eq!(stats.rows_written, 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_the_pending_batch() {
    init_test_tracing();

    let store = MemoryStore::new();
    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        StageChain::default(),
        store.clone(),
        KeyOnlyMapper::default(),
    );
    let shutdown_tx = pipeline.shutdown_tx();

    let (tx, rx) = mpsc::channel(16);
    let handle = tokio::spawn(async move { pipeline.run(channel_source(rx)).await });

    for record in records(&["a", "b"]) {
        tx.send(record).await.unwrap();
    }
    sleep(Duration::from_millis(10)).await;

    shutdown_tx.shutdown().unwrap();
    let stats = handle.await.unwrap();

    assert_eq!(stats.batches_committed, 1);
    assert_eq!(store.rows("information_list").await.len(), 2);
}

#[tokio::test]
async fn parallel_group_fault_drops_only_the_faulted_record() {
    init_test_tracing();

    let store = MemoryStore::new();
    let group = ParallelStageGroup::new(vec![ParallelBranch::new(
        "reject",
        FailOnUid("bad".to_string()),
    )])
    .unwrap();
    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        StageChain::new(vec![Stage::per_batch("guarded", group)]),
        store.clone(),
        KeyOnlyMapper::default(),
    );

    let stats = pipeline
        .run(futures::stream::iter(records(&["good1", "bad", "good2"])))
        .await;

    assert_eq!(stats.batches_committed, 1);
    assert_eq!(stats.batches_failed, 0);
    assert_eq!(stats.rows_written, 2);
    let keys: Vec<Value> = store
        .rows("information_list")
        .await
        .into_iter()
        .filter_map(|mut row| row.remove("information_id"))
        .collect();
    assert_eq!(keys, vec![json!("good1"), json!("good2")]);
}

#[tokio::test]
async fn parallel_group_failing_every_record_fails_the_batch() {
    init_test_tracing();

    let store = MemoryStore::new();
    let group = ParallelStageGroup::new(vec![ParallelBranch::new(
        "reject",
        FailOnUid("bad".to_string()),
    )])
    .unwrap();
    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        StageChain::new(vec![Stage::per_batch("guarded", group)]),
        store.clone(),
        KeyOnlyMapper::default(),
    );

    let stats = pipeline
        .run(futures::stream::iter(records(&["bad"])))
        .await;

    assert_eq!(stats.batches_failed, 1);
    assert!(store.rows("information_list").await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_requested_before_run_stops_the_pipeline() {
    init_test_tracing();

    let pipeline = Pipeline::new(
        &pipeline_config(10, 60_000),
        StageChain::default(),
        MemoryStore::new(),
        KeyOnlyMapper::default(),
    );
    pipeline.shutdown_tx().shutdown().unwrap();

    // The sender stays alive, so only the shutdown can end the run.
    let (_tx, rx) = mpsc::channel::<Record>(16);
    let stats = timeout(Duration::from_secs(3600), pipeline.run(channel_source(rx)))
        .await
        .expect("pipeline ignored a shutdown sent before it started");

    assert_eq!(stats.batches_committed, 0);
}
