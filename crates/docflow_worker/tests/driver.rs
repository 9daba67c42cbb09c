mod common;

use std::time::Duration;

use common::{at, document, document_of, record, record_of, store, store_with_failpoints};
use docflow_store::{DocflowResult, ProcessOutcome, RunOutcome};
use docflow_worker::{ApplyMode, Worker, WorkerSettings};
use serde_json::json;
use tempfile::tempdir;

fn settings(worker_id: &str) -> WorkerSettings {
    WorkerSettings {
        document_type: Some("transfer_document".to_string()),
        worker_id: worker_id.to_string(),
        lease: Duration::from_secs(60),
        apply_mode: ApplyMode::Atomic,
    }
}

#[tokio::test]
async fn idle_when_nothing_is_pending() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let worker = Worker::new(store(&dir).await?, settings("worker_a"));
    let outcome = worker.process_document().await;
    assert!(matches!(outcome, RunOutcome::Idle));
    assert!(!outcome.succeeded());
    assert_eq!(outcome.exit_code(), 2);
    Ok(())
}

#[tokio::test]
async fn processes_oldest_document_once() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store(&dir).await?;
    store.save(&record("A1", Some(1), None, Some("O1"))).await?;
    store
        .save(&document(
            "D1",
            "transfer_document",
            at(1),
            &["A1"],
            json!({"owner": {"old": "O1", "new": "O2"}}),
        ))
        .await?;
    store
        .save(&document(
            "D2",
            "transfer_document",
            at(2),
            &["A1"],
            json!({"owner": {"old": "O2", "new": "O3"}}),
        ))
        .await?;
    let worker = Worker::new(store.clone(), settings("worker_a"));

    let first = worker.process_document().await;
    assert!(first.succeeded());
    assert_eq!(first.exit_code(), 0);
    assert_eq!(record_of(&store, "A1").await.owner.as_deref(), Some("O2"));
    let stamped = document_of(&store, "D1").await;
    assert!(stamped.processed_at.is_some());
    assert_eq!(stamped.claimed_by, None);

    let second = worker.process_document().await;
    assert!(matches!(
        &second,
        RunOutcome::Completed(outcome) if outcome.doc_id() == "D2"
    ));
    assert_eq!(record_of(&store, "A1").await.owner.as_deref(), Some("O3"));
    assert!(matches!(worker.process_document().await, RunOutcome::Idle));
    Ok(())
}

#[tokio::test]
async fn rejected_document_keeps_its_claim() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store(&dir).await?;
    let mut bad = document("D1", "transfer_document", at(1), &[], json!({}));
    bad.document_data["document_data"]["document_id"] = json!("D999");
    store.save(&bad).await?;

    let worker = Worker::new(store.clone(), settings("worker_a"));
    let outcome = worker.process_document().await;
    assert!(matches!(
        outcome,
        RunOutcome::Completed(ProcessOutcome::Rejected { .. })
    ));
    assert_eq!(outcome.exit_code(), 1);
    let held = document_of(&store, "D1").await;
    assert!(held.processed_at.is_none());
    assert_eq!(held.claimed_by.as_deref(), Some("worker_a"));

    // Another worker backs off until the lease runs out.
    let other = Worker::new(store.clone(), settings("worker_b"));
    assert!(matches!(other.process_document().await, RunOutcome::Idle));
    Ok(())
}

#[tokio::test]
async fn selection_failure_is_reported_not_raised() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let healthy = store(&dir).await?;
    healthy
        .save(&document("D1", "transfer_document", at(1), &[], json!({})))
        .await?;

    let broken = store_with_failpoints(&dir, &["claim_document"]).await?;
    let outcome = Worker::new(broken, settings("worker_a")).process_document().await;
    assert!(matches!(outcome, RunOutcome::Failed(_)));
    assert_eq!(outcome.exit_code(), 1);
    Ok(())
}
