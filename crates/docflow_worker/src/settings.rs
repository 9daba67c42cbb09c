use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docflow_core::{DEFAULT_DOCUMENT_TYPE, DocflowError, DocflowResult};

const DEFAULT_LEASE_MS: u64 = 300_000;

/// How a document's field updates reach the record table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Every field update and the processed stamp commit together.
    #[default]
    Atomic,
    /// One transaction per field, then one for the stamp.
    PerField,
}

impl FromStr for ApplyMode {
    type Err = DocflowError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "atomic" => Ok(ApplyMode::Atomic),
            "per_field" => Ok(ApplyMode::PerField),
            other => Err(DocflowError::config(format!(
                "DOCFLOW_APPLY_MODE must be 'atomic' or 'per_field', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyMode::Atomic => "atomic",
            ApplyMode::PerField => "per_field",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerSettings {
    /// `None` selects documents of any type.
    pub document_type: Option<String>,
    pub worker_id: String,
    pub lease: Duration,
    pub apply_mode: ApplyMode,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            document_type: Some(DEFAULT_DOCUMENT_TYPE.to_string()),
            worker_id: generated_worker_id(),
            lease: Duration::from_millis(DEFAULT_LEASE_MS),
            apply_mode: ApplyMode::default(),
        }
    }
}

impl WorkerSettings {
    pub fn from_env() -> DocflowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocflowResult<Self> {
        let mut settings = Self::default();
        // An explicitly empty type disables the filter.
        if let Some(document_type) = lookup("DOCFLOW_DOCUMENT_TYPE") {
            let document_type = document_type.trim();
            settings.document_type = (!document_type.is_empty()).then(|| document_type.to_string());
        }
        if let Some(worker_id) = lookup("DOCFLOW_WORKER_ID").filter(|id| !id.trim().is_empty()) {
            settings.worker_id = worker_id.trim().to_string();
        }
        if let Some(raw) = lookup("DOCFLOW_LEASE_MS").filter(|raw| !raw.trim().is_empty()) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                DocflowError::config(format!("DOCFLOW_LEASE_MS must be a number, got '{raw}'"))
            })?;
            if millis == 0 {
                return Err(DocflowError::config("DOCFLOW_LEASE_MS must be positive"));
            }
            settings.lease = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("DOCFLOW_APPLY_MODE").filter(|raw| !raw.trim().is_empty()) {
            settings.apply_mode = raw.parse()?;
        }
        Ok(settings)
    }
}

fn generated_worker_id() -> String {
    format!("worker-{}", Uuid::new_v4())
}
