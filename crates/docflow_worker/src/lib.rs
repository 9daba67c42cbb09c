//! Document worker: claims the oldest pending document, validates its
//! payload, and applies the change-set to the record table.

pub mod driver;
pub mod engine;
pub mod logging;
pub mod selector;
pub mod settings;

pub use driver::Worker;
pub use engine::{change_filter, process_document_objects};
pub use logging::{LogHandle, LogSettings, log_error};
pub use selector::{claim_next_document, find_non_processed_document};
pub use settings::{ApplyMode, WorkerSettings};
