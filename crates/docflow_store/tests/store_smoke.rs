use docflow_store::{
    Condition, Data, DocflowConfig, DocflowError, DocflowResult, DocflowStore, Order, Record,
    RetryConfig, RetryStrategy,
};
use sea_orm::sea_query::{Expr, ExprTrait};
use tempfile::{TempDir, tempdir};

fn record(object: &str, status: Option<i32>, parent: Option<&str>) -> Record {
    Record {
        object: object.to_string(),
        status,
        level: Some(1),
        parent: parent.map(str::to_string),
        owner: Some("owner_1".to_string()),
    }
}

fn config(dir: &TempDir, failpoints: &[&str]) -> DocflowConfig {
    let mut config =
        DocflowConfig::default_sqlite(dir.path().join("store.sqlite").to_string_lossy());
    config.failpoints = Some(failpoints.iter().map(|key| key.to_string()).collect());
    config.retry = Some(RetryConfig {
        max_attempts: Some(3),
        base_delay_ms: Some(0),
        max_delay_ms: Some(0),
        jitter_ms: Some(0),
        strategy: Some(RetryStrategy::Fixed),
    });
    config
}

async fn seeded_store(dir: &TempDir, failpoints: &[&str]) -> DocflowResult<DocflowStore> {
    // Seed through a clean store so failpoints only affect the store under test.
    let seeder = DocflowStore::connect(&config(dir, &[])).await?;
    seeder
        .insert_many(&[
            record("parent_1", Some(1), None),
            record("child_1", Some(1), Some("parent_1")),
            record("child_2", Some(2), Some("parent_1")),
            record("other", Some(1), None),
        ])
        .await?;
    DocflowStore::connect(&config(dir, failpoints)).await
}

#[tokio::test]
async fn query_filters_orders_and_counts() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(&dir, &[]).await?;

    let all = store.query::<Record>().all().await?;
    assert_eq!(all.len(), 4);

    let children = store
        .query::<Record>()
        .filter(Condition::all().add(Expr::col(Data::Parent).eq("parent_1")))
        .order_by(Data::Object, Order::Desc)
        .all()
        .await?;
    let names: Vec<_> = children.iter().map(|row| row.object.as_str()).collect();
    assert_eq!(names, ["child_2", "child_1"]);

    let status_one = store
        .query::<Record>()
        .filter(Condition::all().add(Expr::col(Data::Status).eq(1)))
        .count()
        .await?;
    assert_eq!(status_one, 3);

    let missing = store
        .query::<Record>()
        .filter(Condition::all().add(Expr::col(Data::Object).eq("nope")))
        .first()
        .await?;
    assert!(missing.is_none());
    assert_eq!(store.get::<Record>("child_1").await?, Some(record("child_1", Some(1), Some("parent_1"))));
    Ok(())
}

#[tokio::test]
async fn update_all_is_conditional_and_save_upserts() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(&dir, &[]).await?;

    let filter = Condition::all()
        .add(Expr::col(Data::Parent).eq("parent_1"))
        .add(Expr::col(Data::Status).eq(1));
    let affected = store
        .update_all::<Record>(filter.clone(), &[(Data::Status, 5.into())])
        .await?;
    assert_eq!(affected, 1);
    let again = store
        .update_all::<Record>(filter, &[(Data::Status, 5.into())])
        .await?;
    assert_eq!(again, 0);
    assert_eq!(store.update_all::<Record>(Condition::all(), &[]).await?, 0);

    let mut changed = record("other", Some(9), Some("parent_1"));
    changed.owner = None;
    let saved = store.save(&changed).await?;
    assert_eq!(saved, changed);
    let inserted = store.save(&record("fresh", None, None)).await?;
    assert_eq!(inserted.status, None);
    assert_eq!(store.query::<Record>().count().await?, 5);
    Ok(())
}

#[tokio::test]
async fn read_failures_degrade_to_empty() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(&dir, &["query", "count"]).await?;
    assert!(store.query::<Record>().all().await?.is_empty());
    assert!(store.get::<Record>("child_1").await?.is_none());
    assert_eq!(store.query::<Record>().count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn write_failures_surface_and_leave_rows_untouched() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(&dir, &["update_all", "save"]).await?;

    let err = store
        .update_all::<Record>(Condition::all(), &[(Data::Status, 7.into())])
        .await
        .unwrap_err();
    assert!(matches!(err, DocflowError::Storage { .. }));
    let err = store.save(&record("fresh", None, None)).await.unwrap_err();
    assert!(matches!(err, DocflowError::Storage { .. }));

    let unchanged = store
        .query::<Record>()
        .filter(Condition::all().add(Expr::col(Data::Status).eq(7)))
        .count()
        .await?;
    assert_eq!(unchanged, 0);
    assert!(store.get::<Record>("fresh").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn transient_failures_exhaust_into_unavailable() -> DocflowResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = seeded_store(&dir, &["update_all:transient", "query:transient"]).await?;

    let err = store
        .update_all::<Record>(Condition::all(), &[(Data::Status, 7.into())])
        .await
        .unwrap_err();
    assert!(matches!(err, DocflowError::Unavailable { .. }));
    let err = store.query::<Record>().all().await.unwrap_err();
    assert!(matches!(err, DocflowError::Unavailable { .. }));
    Ok(())
}
