use std::collections::HashSet;

use docflow_store::{DocflowConfig, DocflowError, DocflowResult, DocflowStore};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use tempfile::tempdir;

async fn list_names(store: &DocflowStore, sql: &str) -> DocflowResult<HashSet<String>> {
    let rows = store
        .connection()
        .query_all_raw(Statement::from_string(DatabaseBackend::Sqlite, sql))
        .await
        .map_err(DocflowError::from)?;
    let mut names = HashSet::new();
    for row in rows {
        let name: String = row.try_get("", "name").map_err(DocflowError::from)?;
        names.insert(name);
    }
    Ok(names)
}

#[tokio::test]
async fn sqlite_migrations_create_documents_and_data() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let config = DocflowConfig::default_sqlite(dir.path().join("docflow.sqlite").to_string_lossy());
    let store = DocflowStore::connect(&config).await?;

    let tables = list_names(&store, "SELECT name FROM sqlite_master WHERE type = 'table'").await?;
    assert!(tables.contains("documents"));
    assert!(tables.contains("data"));

    let columns = list_names(&store, "SELECT name FROM pragma_table_info('documents')").await?;
    for column in [
        "doc_id",
        "recieved_at",
        "document_type",
        "document_data",
        "processed_at",
        "claimed_by",
        "claim_expires_at",
    ] {
        assert!(columns.contains(column), "missing column {column}");
    }

    let indexes = list_names(&store, "SELECT name FROM sqlite_master WHERE type = 'index'").await?;
    assert!(indexes.contains("idx_documents_pending"));
    assert!(indexes.contains("idx_data_parent"));
    Ok(())
}

#[tokio::test]
async fn reconnecting_keeps_schema_and_rows() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let config = DocflowConfig::default_sqlite(dir.path().join("docflow.sqlite").to_string_lossy());
    let store = DocflowStore::connect(&config).await?;
    store
        .connection()
        .execute_raw(Statement::from_string(
            DatabaseBackend::Sqlite,
            "INSERT INTO data (object, status) VALUES ('obj_1', 1)",
        ))
        .await
        .map_err(DocflowError::from)?;
    drop(store);

    let store = DocflowStore::connect(&config).await?;
    let objects = list_names(&store, "SELECT object AS name FROM data").await?;
    assert_eq!(objects, HashSet::from(["obj_1".to_string()]));
    Ok(())
}
