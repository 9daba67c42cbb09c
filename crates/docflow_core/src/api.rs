use std::time::Duration;

use async_trait::async_trait;

use crate::{DocflowResult, QueueStats, Timestamp};

/// Queue bookkeeping on the `documents` table.
#[async_trait]
pub trait DocumentQueueApi {
    /// Take an expiring claim on a pending document. Returns `false` when the
    /// document is processed or held by a live claim.
    async fn claim_document(
        &self,
        doc_id: &str,
        worker_id: &str,
        now: Timestamp,
        lease: Duration,
    ) -> DocflowResult<bool>;

    /// Stamp `processed_at` once and clear the claim. Returns `false` when the
    /// document was already processed.
    async fn mark_document_processed(&self, doc_id: &str, now: Timestamp) -> DocflowResult<bool>;

    /// Drop a claim held by `worker_id` without stamping the document.
    async fn release_claim(&self, doc_id: &str, worker_id: &str) -> DocflowResult<bool>;

    async fn queue_stats(
        &self,
        document_type: Option<&str>,
        now: Timestamp,
    ) -> DocflowResult<QueueStats>;
}
