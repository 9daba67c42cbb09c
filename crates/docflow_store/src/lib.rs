pub mod config;
pub mod datastore;
mod db;
pub mod migration;
pub mod queue;
pub mod retry;
pub mod store;
pub mod table;

pub use config::{DatabaseConfig, DocflowConfig, PoolConfig, RetryConfig, RetryStrategy};
pub use datastore::{load_config, open_store, open_store_from_env};
pub use db::{Data, Documents};
pub use docflow_core::*;
pub use retry::{RetryError, RetryPolicy, is_transient, with_retry};
pub use store::{DocflowStore, commit_or_rollback, update_rows};
pub use table::{RowQuery, TableRow};

pub use sea_orm::sea_query::{Condition, Order};
