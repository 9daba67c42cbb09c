use std::collections::HashSet;

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};

use crate::{DocflowError, DocflowResult, FieldValue, RecordField, Timestamp};

pub const DEFAULT_DOCUMENT_TYPE: &str = "transfer_document";

/// Row of the `documents` table.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub received_at: Timestamp,
    pub document_type: String,
    pub document_data: JsonValue,
    pub processed_at: Option<Timestamp>,
    pub claimed_by: Option<String>,
    pub claim_expires_at: Option<Timestamp>,
}

impl Document {
    pub fn new(
        doc_id: impl Into<String>,
        document_type: impl Into<String>,
        document_data: JsonValue,
        received_at: Timestamp,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            received_at,
            document_type: document_type.into(),
            document_data,
            processed_at: None,
            claimed_by: None,
            claim_expires_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Parse the embedded change-set and check it belongs to this document.
    pub fn payload(&self) -> DocflowResult<DocumentPayload> {
        let payload = DocumentPayload::parse(&self.document_data)?;
        payload.verify_owner(self)?;
        Ok(payload)
    }
}

/// Row of the `data` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub object: String,
    pub status: Option<i32>,
    pub level: Option<i32>,
    pub parent: Option<String>,
    pub owner: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldChange {
    pub field: RecordField,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Validated form of a document's `document_data` column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentPayload {
    pub document_id: String,
    pub document_type: String,
    pub objects: Vec<String>,
    /// In payload order.
    pub changes: Vec<FieldChange>,
}

#[derive(Deserialize)]
struct RawPayload {
    document_data: RawHeader,
    objects: Vec<String>,
    operation_details: Map<String, JsonValue>,
}

#[derive(Deserialize)]
struct RawHeader {
    document_id: String,
    document_type: String,
}

#[derive(Deserialize)]
struct RawChange {
    #[serde(default)]
    old: JsonValue,
    #[serde(default)]
    new: JsonValue,
}

impl DocumentPayload {
    pub fn parse(raw: &JsonValue) -> DocflowResult<Self> {
        // Older writers stored the payload as a JSON-encoded string.
        let decoded;
        let raw = match raw {
            JsonValue::String(encoded) => {
                decoded = serde_json::from_str::<JsonValue>(encoded).map_err(|err| {
                    DocflowError::validation(format!("document_data is not valid json: {err}"))
                })?;
                &decoded
            }
            other => other,
        };
        let payload: RawPayload = serde_json::from_value(raw.clone())
            .map_err(|err| DocflowError::validation(format!("malformed document_data: {err}")))?;

        let mut seen = HashSet::new();
        let objects = payload
            .objects
            .into_iter()
            .filter(|object| seen.insert(object.clone()))
            .collect();

        let mut changes = Vec::with_capacity(payload.operation_details.len());
        for (name, detail) in payload.operation_details {
            let field: RecordField = name.parse()?;
            let detail: RawChange = serde_json::from_value(detail).map_err(|err| {
                DocflowError::validation(format!("malformed change for '{field}': {err}"))
            })?;
            changes.push(FieldChange {
                field,
                old: FieldValue::from_json(field, &detail.old)?,
                new: FieldValue::from_json(field, &detail.new)?,
            });
        }

        Ok(Self {
            document_id: payload.document_data.document_id,
            document_type: payload.document_data.document_type,
            objects,
            changes,
        })
    }

    pub fn verify_owner(&self, document: &Document) -> DocflowResult<()> {
        if self.document_id != document.doc_id {
            return Err(DocflowError::validation(format!(
                "document_id mismatch: payload has '{}'",
                self.document_id
            )));
        }
        if self.document_type != document.document_type {
            return Err(DocflowError::validation(format!(
                "document_type mismatch: payload has '{}', row has '{}'",
                self.document_type, document.document_type
            )));
        }
        Ok(())
    }
}
