use log::info;

use crate::engine::process_document_objects;
use crate::logging::log_error;
use crate::selector::claim_next_document;
use crate::settings::WorkerSettings;
use docflow_store::{DocflowStore, RunOutcome};

/// One pass of the document worker.
pub struct Worker {
    store: DocflowStore,
    settings: WorkerSettings,
}

impl Worker {
    pub fn new(store: DocflowStore, settings: WorkerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &DocflowStore {
        &self.store
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Claim the oldest pending document and apply it. A failed or rejected
    /// document keeps its claim until the lease runs out.
    pub async fn process_document(&self) -> RunOutcome {
        let claimed = claim_next_document(
            &self.store,
            self.settings.document_type.as_deref(),
            &self.settings.worker_id,
            self.settings.lease,
        )
        .await;
        let document = match claimed {
            Ok(Some(document)) => document,
            Ok(None) => {
                info!("worker: no pending documents");
                return RunOutcome::Idle;
            }
            Err(err) => {
                log_error("worker: document selection failed", &err);
                return RunOutcome::Failed(err);
            }
        };
        let outcome =
            process_document_objects(&self.store, &document, self.settings.apply_mode).await;
        info!(
            "worker: {} finished, succeeded = {}",
            outcome.doc_id(),
            outcome.succeeded()
        );
        RunOutcome::Completed(outcome)
    }
}
