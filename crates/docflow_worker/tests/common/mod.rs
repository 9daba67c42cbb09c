#![allow(dead_code)]

use std::time::Duration;

use docflow_store::{
    DocflowConfig, DocflowResult, DocflowStore, Document, Record, RetryConfig, RetryStrategy,
    Timestamp, add_duration, now_utc,
};
use serde_json::{Value, json};
use tempfile::TempDir;

pub fn config(dir: &TempDir, failpoints: &[&str]) -> DocflowConfig {
    let mut config =
        DocflowConfig::default_sqlite(dir.path().join("worker.sqlite").to_string_lossy());
    config.failpoints = Some(failpoints.iter().map(|key| key.to_string()).collect());
    config.retry = Some(RetryConfig {
        max_attempts: Some(2),
        base_delay_ms: Some(0),
        max_delay_ms: Some(0),
        jitter_ms: Some(0),
        strategy: Some(RetryStrategy::Fixed),
    });
    config
}

pub async fn store(dir: &TempDir) -> DocflowResult<DocflowStore> {
    DocflowStore::connect(&config(dir, &[])).await
}

pub async fn store_with_failpoints(
    dir: &TempDir,
    failpoints: &[&str],
) -> DocflowResult<DocflowStore> {
    DocflowStore::connect(&config(dir, failpoints)).await
}

/// Received-at times a day in the past, `offset_secs` apart.
pub fn at(offset_secs: u64) -> Timestamp {
    let base = now_utc() - time::Duration::days(1);
    add_duration(base, Duration::from_secs(offset_secs))
}

pub fn payload(doc_id: &str, document_type: &str, objects: &[&str], details: Value) -> Value {
    json!({
        "document_data": {"document_id": doc_id, "document_type": document_type},
        "objects": objects,
        "operation_details": details,
    })
}

pub fn document(
    doc_id: &str,
    document_type: &str,
    received_at: Timestamp,
    objects: &[&str],
    details: Value,
) -> Document {
    Document::new(
        doc_id,
        document_type,
        payload(doc_id, document_type, objects, details),
        received_at,
    )
}

pub fn record(
    object: &str,
    status: Option<i32>,
    parent: Option<&str>,
    owner: Option<&str>,
) -> Record {
    Record {
        object: object.to_string(),
        status,
        level: Some(if parent.is_some() { 0 } else { 1 }),
        parent: parent.map(str::to_string),
        owner: owner.map(str::to_string),
    }
}

pub async fn record_of(store: &DocflowStore, object: &str) -> Record {
    store
        .get::<Record>(object)
        .await
        .expect("read record")
        .expect("record exists")
}

pub async fn document_of(store: &DocflowStore, doc_id: &str) -> Document {
    store
        .get::<Document>(doc_id)
        .await
        .expect("read document")
        .expect("document exists")
}
