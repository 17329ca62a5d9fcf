//! Pipeline integration tests against an in-memory queue, a local object store and the
//! in-memory record store.
//!
//! Run with: `cargo test -p analysis-worker --test pipeline_test`

mod helpers;

use analysis_core::{AckPolicy, ProcessingStatus};
use analysis_db::RecordStore;
use analysis_worker::{EventOutcome, QueueClient, StopReason};
use helpers::{
    filter, queue_config, raw_message, s3_message, settings, FakeQueue, TestPipeline, BUCKET,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_successful_upload_is_completed_and_acknowledged() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("uploads/u1/s1/abc123.mp4", b"fake video!");
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/abc123.mp4")]);

    pipeline.orchestrator.run_cycle().await;

    let records = pipeline.records.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, ProcessingStatus::Completed);
    assert_eq!(record.upload_id.as_deref(), Some("abc123"));
    assert_eq!(record.source_key, "uploads/u1/s1/abc123.mp4");
    assert!(record.completed_at.is_some());
    assert_eq!(record.retry_count, 0);

    let blob = record.metadata_blob.as_ref().unwrap();
    assert_eq!(
        blob["real_metadata"]["technical"]["extraction_method"],
        json!("basic_analysis")
    );
    assert_eq!(
        blob["real_metadata"]["technical"]["detected_format"],
        json!("MP4")
    );
    assert_eq!(blob["real_metadata"]["file_info"]["file_size_bytes"], json!(11));
    assert_eq!(
        blob["real_metadata"]["source_object"]["content_type"],
        json!("video/mp4")
    );
    assert_eq!(blob["placeholder_analysis"]["simulated"], json!(true));
    assert!(blob["real_metadata"].get("placeholder_analysis").is_none());

    assert_eq!(pipeline.queue.deleted(), vec!["receipt-m1".to_string()]);
    assert_eq!(pipeline.scratch_files(), 0, "local copy should be cleaned up");

    let stats = pipeline.orchestrator.stats();
    assert_eq!(stats.messages_processed, 1);
    assert_eq!(stats.files_downloaded, 1);
    assert_eq!(stats.processing_errors, 0);
    assert!(stats.last_activity.is_some());
}

#[tokio::test]
async fn test_missing_object_fails_record_and_still_acknowledges() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/gone.mp4")]);

    pipeline.orchestrator.run_cycle().await;

    let records = pipeline.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ProcessingStatus::Failed);
    assert_eq!(records[0].retry_count, 1);
    let error = records[0].error_text.as_deref().unwrap();
    assert!(error.contains("not found"), "unexpected error text: {}", error);
    assert!(records[0].metadata_blob.is_none());

    assert_eq!(pipeline.queue.deleted(), vec!["receipt-m1".to_string()]);
    assert_eq!(pipeline.orchestrator.stats().processing_errors, 1);
    assert_eq!(pipeline.orchestrator.stats().files_downloaded, 0);
}

#[tokio::test]
async fn test_success_only_policy_leaves_failed_message() {
    let mut strict = settings();
    strict.ack_policy = AckPolicy::SuccessOnly;
    let mut pipeline = TestPipeline::new(strict).await;
    pipeline.put_object("uploads/u1/s1/ok.mov", b"present");
    pipeline.queue.push_batch(vec![
        s3_message("bad", BUCKET, "uploads/u1/s1/gone.mp4"),
        s3_message("good", BUCKET, "uploads/u1/s1/ok.mov"),
    ]);

    pipeline.orchestrator.run_cycle().await;

    assert_eq!(pipeline.queue.deleted(), vec!["receipt-good".to_string()]);
    let stats = pipeline.records.stats().await.unwrap();
    assert_eq!(stats.status_counts.failed, 1);
    assert_eq!(stats.status_counts.completed, 1);
}

#[tokio::test]
async fn test_ineligible_messages_are_deleted_without_records() {
    let mut pipeline = TestPipeline::new(settings()).await;
    let garbage = analysis_worker::RawMessage {
        message_id: "junk".to_string(),
        receipt_handle: "receipt-junk".to_string(),
        body: "{not json".to_string(),
    };
    pipeline.queue.push_batch(vec![
        garbage,
        s3_message("wrong-bucket", "elsewhere", "uploads/u1/s1/a.mp4"),
        s3_message("wrong-prefix", BUCKET, "private/u1/s1/a.mp4"),
        raw_message(
            "test-event",
            json!({"Service": "Amazon S3", "Event": "s3:TestEvent"}),
        ),
    ]);

    pipeline.orchestrator.run_cycle().await;

    assert!(pipeline.records.records().is_empty());
    let mut deleted = pipeline.queue.deleted();
    deleted.sort();
    assert_eq!(
        deleted,
        vec![
            "receipt-junk",
            "receipt-test-event",
            "receipt-wrong-bucket",
            "receipt-wrong-prefix"
        ]
    );
    assert_eq!(pipeline.orchestrator.stats().messages_rejected, 4);
    assert!(pipeline.orchestrator.stats().last_activity.is_none());
}

#[tokio::test]
async fn test_manual_message_is_processed() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("manual/clip.avi", b"avi bytes");
    pipeline.queue.push_batch(vec![raw_message(
        "manual",
        json!({"bucket": BUCKET, "key": "manual/clip.avi", "size": 1000, "test": true}),
    )]);

    pipeline.orchestrator.run_cycle().await;

    let records = pipeline.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ProcessingStatus::Completed);
    assert!(records[0].upload_id.is_none());
    let blob = records[0].metadata_blob.as_ref().unwrap();
    assert_eq!(
        blob["real_metadata"]["technical"]["detected_format"],
        json!("AVI")
    );
}

#[tokio::test]
async fn test_duplicate_delivery_creates_second_attempt() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("uploads/u1/s1/dup.mp4", b"twice");
    pipeline
        .queue
        .push_batch(vec![s3_message("first", BUCKET, "uploads/u1/s1/dup.mp4")]);
    pipeline
        .queue
        .push_batch(vec![s3_message("second", BUCKET, "uploads/u1/s1/dup.mp4")]);

    pipeline.orchestrator.run_cycle().await;
    pipeline.orchestrator.run_cycle().await;

    let records = pipeline.records.records();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.status == ProcessingStatus::Completed && r.upload_id.as_deref() == Some("dup")));
    assert_eq!(pipeline.queue.deleted().len(), 2);
}

#[tokio::test]
async fn test_process_event_reports_outcome() {
    let mut pipeline = TestPipeline::new(settings()).await;
    let event = analysis_worker::decode_message(
        &s3_message("m1", BUCKET, "uploads/u1/s1/missing.mkv"),
        &filter(),
    )
    .unwrap();

    let outcome = pipeline.orchestrator.process_event(&event).await;
    assert!(matches!(outcome, EventOutcome::Failed(ref e) if e.contains("not found")));
}

#[tokio::test]
async fn test_zero_runtime_budget_exits_before_polling() {
    let mut limited = settings();
    limited.max_runtime = Some(Duration::ZERO);
    let mut pipeline = TestPipeline::new(limited).await;
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/a.mp4")]);

    let summary = pipeline.orchestrator.run().await;

    assert_eq!(summary.reason, StopReason::RuntimeBudget);
    assert_eq!(pipeline.queue.receive_calls(), 0);
    assert!(pipeline.records.records().is_empty());
}

#[tokio::test]
async fn test_runtime_budget_stops_loop() {
    let mut limited = settings();
    limited.max_runtime = Some(Duration::from_millis(50));
    limited.poll_interval = Duration::from_millis(5);
    let mut pipeline = TestPipeline::new(limited).await;

    let summary = tokio::time::timeout(Duration::from_secs(10), pipeline.orchestrator.run())
        .await
        .expect("loop should stop on its own");

    assert_eq!(summary.reason, StopReason::RuntimeBudget);
    assert!(summary.elapsed >= Duration::from_millis(50));
    assert!(pipeline.queue.receive_calls() >= 1);
    assert_eq!(summary.stats.cycles as usize, pipeline.queue.receive_calls());
}

#[tokio::test]
async fn test_budget_expiring_mid_batch_finishes_batch_without_polling_again() {
    let mut limited = settings();
    limited.max_runtime = Some(Duration::from_millis(50));
    let mut pipeline =
        TestPipeline::with_extraction_delay(limited, Duration::from_millis(40)).await;
    let keys = ["uploads/u1/s1/a.mp4", "uploads/u1/s1/b.mp4", "uploads/u1/s1/c.mp4"];
    for key in keys {
        pipeline.put_object(key, b"fake video!");
    }
    pipeline.queue.push_batch(vec![
        s3_message("m1", BUCKET, keys[0]),
        s3_message("m2", BUCKET, keys[1]),
        s3_message("m3", BUCKET, keys[2]),
    ]);
    pipeline
        .queue
        .push_batch(vec![s3_message("m4", BUCKET, "uploads/u1/s1/d.mp4")]);

    let summary = tokio::time::timeout(Duration::from_secs(10), pipeline.orchestrator.run())
        .await
        .expect("loop should stop on its own");

    assert_eq!(summary.reason, StopReason::RuntimeBudget);
    assert!(summary.elapsed >= Duration::from_millis(120));
    assert_eq!(pipeline.queue.receive_calls(), 1);

    let records = pipeline.records.records();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r.status == ProcessingStatus::Completed));
    assert_eq!(
        pipeline.queue.deleted(),
        vec![
            "receipt-m1".to_string(),
            "receipt-m2".to_string(),
            "receipt-m3".to_string()
        ]
    );
    assert_eq!(summary.stats.messages_processed, 3);
}

#[tokio::test]
async fn test_empty_object_fails_and_leaves_no_scratch_file() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("uploads/u1/s1/empty.mp4", b"");
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/empty.mp4")]);

    pipeline.orchestrator.run_cycle().await;

    let records = pipeline.records.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ProcessingStatus::Failed);
    assert_eq!(pipeline.scratch_files(), 0);
    assert_eq!(pipeline.queue.deleted(), vec!["receipt-m1".to_string()]);
}

#[tokio::test]
async fn test_failed_download_is_removed_even_without_cleanup() {
    let mut keep = settings();
    keep.cleanup_after_processing = false;
    let mut pipeline = TestPipeline::new(keep).await;
    pipeline.put_object("uploads/u1/s1/empty.mp4", b"");
    pipeline.put_object("uploads/u1/s1/full.mp4", b"fake video!");
    pipeline.queue.push_batch(vec![
        s3_message("m1", BUCKET, "uploads/u1/s1/empty.mp4"),
        s3_message("m2", BUCKET, "uploads/u1/s1/full.mp4"),
    ]);

    pipeline.orchestrator.run_cycle().await;

    let kept: Vec<_> = std::fs::read_dir(pipeline.scratch.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(kept, vec![std::ffi::OsString::from("full.mp4")]);
}

#[tokio::test]
async fn test_source_metadata_uses_a_single_lookup() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("uploads/u1/s1/abc123.mp4", b"fake video!");
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/abc123.mp4")]);

    pipeline.orchestrator.run_cycle().await;

    assert_eq!(pipeline.head_calls(), 1);
    let records = pipeline.records.records();
    let blob = records[0].metadata_blob.as_ref().unwrap();
    assert_eq!(
        blob["real_metadata"]["source_object"]["content_type"],
        json!("video/mp4")
    );
}

#[tokio::test]
async fn test_shutdown_before_run_skips_polling() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.shutdown.request();

    let summary = pipeline.orchestrator.run().await;

    assert_eq!(summary.reason, StopReason::Shutdown);
    assert_eq!(pipeline.queue.receive_calls(), 0);
}

#[tokio::test]
async fn test_shutdown_interrupts_inter_cycle_sleep() {
    let mut slow = settings();
    slow.poll_interval = Duration::from_secs(300);
    let mut pipeline = TestPipeline::new(slow).await;

    let handle = pipeline.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.request();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), pipeline.orchestrator.run())
        .await
        .expect("shutdown should wake the sleep");

    assert_eq!(summary.reason, StopReason::Shutdown);
    assert_eq!(pipeline.queue.receive_calls(), 1);
}

#[tokio::test]
async fn test_poll_failure_yields_no_events() {
    let queue = Arc::new(FakeQueue::default());
    queue.push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/a.mp4")]);
    queue.fail_receive();
    let client = QueueClient::new(queue.clone(), filter(), &queue_config());

    assert!(client.poll(10).await.is_empty());
    assert!(queue.deleted().is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let queue = Arc::new(FakeQueue::default());
    queue.push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/a.mp4")]);
    let client = QueueClient::new(queue.clone(), filter(), &queue_config());

    let events = client.poll(10).await;
    assert_eq!(events.len(), 1);
    assert!(client.delete(&events[0]).await);
    assert!(!client.delete(&events[0]).await);
    assert_eq!(queue.deleted().len(), 1);
}

#[tokio::test]
async fn test_queue_stats_never_fail() {
    let queue = Arc::new(FakeQueue::default());
    let client = QueueClient::new(queue.clone(), filter(), &queue_config());
    assert_eq!(client.stats().await.approx_visible, Some(0));

    queue.fail_attributes();
    assert!(client.stats().await.is_unknown());
}

#[tokio::test]
async fn test_send_test_message_uses_simplified_body() {
    let queue = Arc::new(FakeQueue::default());
    let client = QueueClient::new(queue.clone(), filter(), &queue_config());

    let id = client
        .send_test_message(BUCKET, "uploads/u1/s1/test.mp4")
        .await
        .unwrap();
    assert_eq!(id, "sent-1");

    let body: serde_json::Value = serde_json::from_str(&queue.sent()[0]).unwrap();
    assert_eq!(body["key"], json!("uploads/u1/s1/test.mp4"));
    assert_eq!(body["test"], json!(true));
}

#[tokio::test]
async fn test_status_report_reflects_counters() {
    let mut pipeline = TestPipeline::new(settings()).await;
    pipeline.put_object("uploads/u1/s1/a.mp4", b"data");
    pipeline
        .queue
        .push_batch(vec![s3_message("m1", BUCKET, "uploads/u1/s1/a.mp4")]);
    pipeline.orchestrator.run_cycle().await;

    let report = pipeline.orchestrator.status_report().await;
    assert_eq!(report.stats.messages_processed, 1);
    assert_eq!(report.records.as_ref().unwrap().status_counts.completed, 1);
    assert!(!report.durable_records);

    let text = report.to_string();
    assert!(text.contains("Messages Processed: 1"));
    assert!(text.contains("Time Limit: Unlimited"));
}
