use std::time::Duration;

use log::debug;

use docflow_store::queue::{claimable_condition, pending_condition};
use docflow_store::{
    DocflowResult, DocflowStore, Document, DocumentQueueApi, Documents, Order, RowQuery,
    add_duration, now_utc,
};

/// Rounds of select-then-claim before giving up to a faster worker.
const CLAIM_ROUNDS: u32 = 5;

fn oldest_first<'a>(query: RowQuery<'a, Document>) -> RowQuery<'a, Document> {
    query
        .order_by(Documents::ReceivedAt, Order::Asc)
        .order_by(Documents::DocId, Order::Asc)
}

/// Oldest unprocessed document, optionally restricted to one type.
/// `None` or an empty type matches every document.
pub async fn find_non_processed_document(
    store: &DocflowStore,
    document_type: Option<&str>,
) -> DocflowResult<Option<Document>> {
    oldest_first(store.query::<Document>().filter(pending_condition(document_type)))
        .first()
        .await
}

/// Select the oldest claimable document and take a lease on it.
pub async fn claim_next_document(
    store: &DocflowStore,
    document_type: Option<&str>,
    worker_id: &str,
    lease: Duration,
) -> DocflowResult<Option<Document>> {
    for round in 1..=CLAIM_ROUNDS {
        let now = now_utc();
        let candidate = oldest_first(
            store
                .query::<Document>()
                .filter(pending_condition(document_type))
                .filter(claimable_condition(now)),
        )
        .first()
        .await?;
        let Some(candidate) = candidate else {
            return Ok(None);
        };
        if store
            .claim_document(&candidate.doc_id, worker_id, now, lease)
            .await?
        {
            debug!("worker: {worker_id} claimed {}", candidate.doc_id);
            return Ok(Some(Document {
                claimed_by: Some(worker_id.to_string()),
                claim_expires_at: Some(add_duration(now, lease)),
                ..candidate
            }));
        }
        debug!(
            "worker: lost claim on {} to another worker (round {round})",
            candidate.doc_id
        );
    }
    Ok(None)
}
