use serde::Serialize;

use crate::{DocflowError, FieldValue, RecordField, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub field: RecordField,
    pub old: FieldValue,
    pub new: FieldValue,
    pub rows_affected: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StampStatus {
    Stamped(#[serde(with = "crate::outcome::timestamp_format")] Timestamp),
    /// Another run stamped the document first; nothing was changed.
    AlreadyProcessed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub doc_id: String,
    pub fields: Vec<FieldReport>,
    pub stamp: StampStatus,
}

impl BatchReport {
    pub fn rows_affected(&self) -> u64 {
        self.fields.iter().map(|field| field.rows_affected).sum()
    }
}

/// Result of applying one document.
#[derive(Debug)]
pub enum ProcessOutcome {
    Applied(BatchReport),
    Rejected { doc_id: String, reason: DocflowError },
    Failed { doc_id: String, error: DocflowError },
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ProcessOutcome::Applied(_))
    }

    pub fn doc_id(&self) -> &str {
        match self {
            ProcessOutcome::Applied(report) => &report.doc_id,
            ProcessOutcome::Rejected { doc_id, .. } | ProcessOutcome::Failed { doc_id, .. } => {
                doc_id
            }
        }
    }
}

/// Result of one worker pass.
#[derive(Debug)]
pub enum RunOutcome {
    Idle,
    Completed(ProcessOutcome),
    Failed(DocflowError),
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RunOutcome::Completed(outcome) if outcome.succeeded())
    }

    /// 0 = processed, 1 = rejected or failed, 2 = nothing to do.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Idle => 2,
            outcome if outcome.succeeded() => 0,
            _ => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub claimed: u64,
    pub processed: u64,
}

mod timestamp_format {
    use serde::Serializer;
    use time::format_description::well_known::Rfc3339;

    use crate::Timestamp;

    pub fn serialize<S: Serializer>(value: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = value
            .assume_utc()
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}
