//! Applies a document's change-set to the `data` table.
//!
//! Every field update is conditional on the record still holding the
//! expected old value, so replaying a document never clobbers newer state.

use log::debug;
use sea_orm::sea_query::{Condition, Expr, ExprTrait, Value as SeaValue};
use sea_orm::{ConnectionTrait, DbErr, TransactionTrait};

use crate::logging::log_error;
use crate::settings::ApplyMode;
use docflow_store::queue::{stamp_condition, stamp_updates};
use docflow_store::{
    BatchReport, Data, DocflowError, DocflowResult, DocflowStore, Document, DocumentPayload,
    DocumentQueueApi, FieldChange, FieldReport, FieldValue, ProcessOutcome, Record, RecordField,
    StampStatus, Timestamp, ValueKind, now_utc, update_rows, with_retry,
};

/// Validate and apply one document. Errors never escape; they become a
/// `Rejected` or `Failed` outcome.
pub async fn process_document_objects(
    store: &DocflowStore,
    document: &Document,
    mode: ApplyMode,
) -> ProcessOutcome {
    let doc_id = document.doc_id.clone();
    debug!("{doc_id} -- processing started ({mode})");

    let payload = match document.payload() {
        Ok(payload) => payload,
        Err(reason) => {
            debug!("{doc_id} -- rejected: {reason}");
            return ProcessOutcome::Rejected { doc_id, reason };
        }
    };

    let result = match mode {
        ApplyMode::Atomic => apply_atomic(store, &doc_id, &payload).await,
        ApplyMode::PerField => apply_per_field(store, &doc_id, &payload).await,
    };
    match result {
        Ok(report) => {
            match report.stamp {
                StampStatus::Stamped(_) => debug!("{doc_id} -- processed"),
                StampStatus::AlreadyProcessed => {
                    debug!("{doc_id} -- already processed by another run")
                }
            }
            ProcessOutcome::Applied(report)
        }
        Err(error) => {
            debug!("{doc_id} -- processing failed");
            log_error(&format!("{doc_id} -- processing error"), &error);
            ProcessOutcome::Failed { doc_id, error }
        }
    }
}

/// `(object IN objects OR parent IN objects) AND field = old`, with a null
/// `old` matching `IS NULL`.
pub fn change_filter(objects: &[String], change: &FieldChange) -> Condition {
    let column = Data::field(change.field);
    let scope = Condition::any()
        .add(Expr::col(Data::Object).is_in(objects.iter().cloned()))
        .add(Expr::col(Data::Parent).is_in(objects.iter().cloned()));
    let current = match &change.old {
        FieldValue::Null => Expr::col(column).is_null(),
        old => Expr::col(column).eq(field_value(change.field, old)),
    };
    Condition::all().add(scope).add(current)
}

fn field_value(field: RecordField, value: &FieldValue) -> SeaValue {
    match (value, field.kind()) {
        (FieldValue::Int(value), _) => (*value).into(),
        (FieldValue::Text(value), _) => value.clone().into(),
        (FieldValue::Null, ValueKind::Int) => Option::<i32>::None.into(),
        (FieldValue::Null, ValueKind::Text) => Option::<String>::None.into(),
    }
}

fn change_update(change: &FieldChange) -> [(Data, SeaValue); 1] {
    [(Data::field(change.field), field_value(change.field, &change.new))]
}

fn field_report(doc_id: &str, change: &FieldChange, rows_affected: u64) -> FieldReport {
    debug!(
        "{doc_id} -- updated {rows_affected} records for field {}: {} -> {}",
        change.field, change.old, change.new
    );
    FieldReport {
        field: change.field,
        old: change.old.clone(),
        new: change.new.clone(),
        rows_affected,
    }
}

fn field_failpoint(change: &FieldChange) -> String {
    format!("apply_field:{}", change.field)
}

/// All updates plus the stamp in one transaction, retried as a unit.
async fn apply_atomic(
    store: &DocflowStore,
    doc_id: &str,
    payload: &DocumentPayload,
) -> DocflowResult<BatchReport> {
    let now = now_utc();
    let applied = with_retry(store.retry_policy(), "apply_document", move || async move {
        let tx = store.connection().begin().await?;
        match apply_in_transaction(store, &tx, doc_id, payload, now).await {
            Ok(Some(fields)) => {
                tx.commit().await?;
                Ok(Some(fields))
            }
            Ok(None) => {
                tx.rollback().await?;
                Ok(None)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!("{doc_id} -- rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    })
    .await
    .map_err(DocflowError::from)?;

    Ok(match applied {
        Some(fields) => BatchReport {
            doc_id: doc_id.to_string(),
            fields,
            stamp: StampStatus::Stamped(now),
        },
        None => BatchReport {
            doc_id: doc_id.to_string(),
            fields: Vec::new(),
            stamp: StampStatus::AlreadyProcessed,
        },
    })
}

/// `None` when the document was stamped by someone else; the caller rolls back.
async fn apply_in_transaction<C: ConnectionTrait>(
    store: &DocflowStore,
    tx: &C,
    doc_id: &str,
    payload: &DocumentPayload,
    now: Timestamp,
) -> Result<Option<Vec<FieldReport>>, DbErr> {
    let mut fields = Vec::with_capacity(payload.changes.len());
    for change in &payload.changes {
        store.failpoint(&field_failpoint(change))?;
        let affected = update_rows::<Record, _>(
            tx,
            change_filter(&payload.objects, change),
            &change_update(change),
        )
        .await?;
        fields.push(field_report(doc_id, change, affected));
    }
    store.failpoint("mark_document_processed")?;
    let stamped = update_rows::<Document, _>(tx, stamp_condition(doc_id), &stamp_updates(now)).await?;
    Ok((stamped > 0).then_some(fields))
}

/// Legacy behaviour: each field commits on its own, then the stamp.
async fn apply_per_field(
    store: &DocflowStore,
    doc_id: &str,
    payload: &DocumentPayload,
) -> DocflowResult<BatchReport> {
    let mut fields = Vec::with_capacity(payload.changes.len());
    for change in &payload.changes {
        store
            .failpoint(&field_failpoint(change))
            .map_err(DocflowError::from)?;
        let affected = store
            .update_all::<Record>(change_filter(&payload.objects, change), &change_update(change))
            .await?;
        fields.push(field_report(doc_id, change, affected));
    }
    let now = now_utc();
    let stamp = if store.mark_document_processed(doc_id, now).await? {
        StampStatus::Stamped(now)
    } else {
        StampStatus::AlreadyProcessed
    };
    Ok(BatchReport {
        doc_id: doc_id.to_string(),
        fields,
        stamp,
    })
}
