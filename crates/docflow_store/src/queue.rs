use sea_orm::sea_query::{Condition, Expr, ExprTrait, Value as SeaValue};

use crate::db::Documents;
use docflow_core::Timestamp;

/// Unprocessed documents, optionally of one type. An empty type matches all.
///
/// Tables adopted from older tooling allow NULL header columns; such rows
/// cannot be decoded into a [`docflow_core::Document`] and are never pending.
pub fn pending_condition(document_type: Option<&str>) -> Condition {
    let mut condition = Condition::all()
        .add(Expr::col(Documents::ProcessedAt).is_null())
        .add(Expr::col(Documents::ReceivedAt).is_not_null())
        .add(Expr::col(Documents::DocumentType).is_not_null())
        .add(Expr::col(Documents::DocumentData).is_not_null());
    if let Some(document_type) = document_type.filter(|value| !value.is_empty()) {
        condition = condition.add(Expr::col(Documents::DocumentType).eq(document_type));
    }
    condition
}

/// No live claim at `now`.
pub fn claimable_condition(now: Timestamp) -> Condition {
    Condition::any()
        .add(Expr::col(Documents::ClaimedBy).is_null())
        .add(Expr::col(Documents::ClaimExpiresAt).is_null())
        .add(Expr::col(Documents::ClaimExpiresAt).lte(now))
}

/// A live claim held by anyone at `now`.
pub fn claimed_condition(now: Timestamp) -> Condition {
    Condition::all()
        .add(Expr::col(Documents::ClaimedBy).is_not_null())
        .add(Expr::col(Documents::ClaimExpiresAt).gt(now))
}

/// Guard for taking or renewing a claim: the document is pending and either
/// free or already held by `worker_id`.
pub fn claim_guard(doc_id: &str, worker_id: &str, now: Timestamp) -> Condition {
    Condition::all()
        .add(Expr::col(Documents::DocId).eq(doc_id))
        .add(Expr::col(Documents::ProcessedAt).is_null())
        .add(
            claimable_condition(now).add(Expr::col(Documents::ClaimedBy).eq(worker_id)),
        )
}

pub fn claim_updates(worker_id: &str, expires_at: Timestamp) -> Vec<(Documents, SeaValue)> {
    vec![
        (Documents::ClaimedBy, worker_id.to_string().into()),
        (Documents::ClaimExpiresAt, expires_at.into()),
    ]
}

/// The processed stamp only ever lands on a pending row.
pub fn stamp_condition(doc_id: &str) -> Condition {
    Condition::all()
        .add(Expr::col(Documents::DocId).eq(doc_id))
        .add(Expr::col(Documents::ProcessedAt).is_null())
}

pub fn stamp_updates(now: Timestamp) -> Vec<(Documents, SeaValue)> {
    let mut updates = vec![(Documents::ProcessedAt, now.into())];
    updates.extend(release_updates());
    updates
}

pub fn release_condition(doc_id: &str, worker_id: &str) -> Condition {
    Condition::all()
        .add(Expr::col(Documents::DocId).eq(doc_id))
        .add(Expr::col(Documents::ClaimedBy).eq(worker_id))
}

pub fn release_updates() -> Vec<(Documents, SeaValue)> {
    vec![
        (Documents::ClaimedBy, SeaValue::String(None)),
        (Documents::ClaimExpiresAt, Option::<Timestamp>::None.into()),
    ]
}
