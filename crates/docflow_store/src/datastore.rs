use std::path::Path;

use crate::{DocflowConfig, DocflowResult, DocflowStore};

/// Config from a JSON file when given, otherwise from the environment.
pub fn load_config(path: Option<&Path>) -> DocflowResult<DocflowConfig> {
    match path {
        Some(path) => DocflowConfig::load(path),
        None => DocflowConfig::from_env(),
    }
}

pub async fn open_store(path: Option<&Path>) -> DocflowResult<DocflowStore> {
    let config = load_config(path)?;
    DocflowStore::connect(&config).await
}

pub async fn open_store_from_env() -> DocflowResult<DocflowStore> {
    open_store(None).await
}
