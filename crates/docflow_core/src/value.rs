use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{DocflowError, DocflowResult};

/// Columns of the `data` table a document is allowed to change.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordField {
    Status,
    Level,
    Parent,
    Owner,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Int,
    Text,
}

impl RecordField {
    pub const ALL: [RecordField; 4] = [
        RecordField::Status,
        RecordField::Level,
        RecordField::Parent,
        RecordField::Owner,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RecordField::Status => "status",
            RecordField::Level => "level",
            RecordField::Parent => "parent",
            RecordField::Owner => "owner",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            RecordField::Status | RecordField::Level => ValueKind::Int,
            RecordField::Parent | RecordField::Owner => ValueKind::Text,
        }
    }
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = DocflowError;

    fn from_str(value: &str) -> DocflowResult<Self> {
        RecordField::ALL
            .into_iter()
            .find(|field| field.as_str() == value)
            .ok_or_else(|| DocflowError::validation(format!("unknown record field '{value}'")))
    }
}

/// A typed value for one [`RecordField`]; `Null` matches and writes SQL NULL.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Int(i32),
    Text(String),
}

impl FieldValue {
    /// Convert a payload value, enforcing the column type of `field`.
    pub fn from_json(field: RecordField, value: &JsonValue) -> DocflowResult<Self> {
        match (field.kind(), value) {
            (_, JsonValue::Null) => Ok(FieldValue::Null),
            (ValueKind::Int, JsonValue::Number(number)) => number
                .as_i64()
                .and_then(|raw| i32::try_from(raw).ok())
                .map(FieldValue::Int)
                .ok_or_else(|| {
                    DocflowError::validation(format!(
                        "field '{field}' expects a 32-bit integer, got {number}"
                    ))
                }),
            (ValueKind::Text, JsonValue::String(text)) => Ok(FieldValue::Text(text.clone())),
            (ValueKind::Int, other) => Err(DocflowError::validation(format!(
                "field '{field}' expects an integer, got {other}"
            ))),
            (ValueKind::Text, other) => Err(DocflowError::validation(format!(
                "field '{field}' expects a string, got {other}"
            ))),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}
