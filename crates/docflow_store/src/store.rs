use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use sea_orm::sea_query::{
    Alias, Condition, Expr, ExprTrait, Func, MysqlQueryBuilder, OnConflict, PostgresQueryBuilder,
    Query, QueryStatementWriter, SqliteQueryBuilder, Value as SeaValue,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection,
    DatabaseTransaction, DbErr, QueryResult, RuntimeErr, Statement, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::db::Documents;
use crate::migration::Migrator;
use crate::queue::{
    claim_guard, claim_updates, claimable_condition, claimed_condition, pending_condition,
    release_condition, release_updates, stamp_condition, stamp_updates,
};
use crate::retry::{RetryError, RetryPolicy, with_retry};
use crate::table::{RowQuery, TableRow};
use crate::DocflowConfig;
use docflow_core::{
    DocflowError, DocflowResult, Document, DocumentQueueApi, QueueStats, Timestamp, add_duration,
};

const INSERT_CHUNK_ROWS: usize = 500;

#[derive(Clone)]
pub struct DocflowStore {
    conn: DatabaseConnection,
    retry: RetryPolicy,
    failpoints: HashSet<String>,
}

impl DocflowStore {
    pub async fn connect(config: &DocflowConfig) -> DocflowResult<Self> {
        let url = config.connection_url();
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let retry = RetryPolicy::from_config(config.retry.as_ref());
        let failpoints = config
            .failpoints
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>();
        let conn = with_retry(&retry, "connect", || Database::connect(options.clone())).await?;
        let store = Self {
            conn,
            retry,
            failpoints,
        };
        Migrator::up(&store.conn, None)
            .await
            .map_err(DocflowError::from)?;
        info!(
            "docflow store connected ({} backend)",
            config.backend_name()
        );
        Ok(store)
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Injected failure for `key`: `key` is permanent, `key:transient` is a
    /// dropped connection.
    pub fn failpoint(&self, key: &str) -> Result<(), DbErr> {
        if self.failpoints.contains(&format!("{key}:transient")) {
            return Err(DbErr::Conn(RuntimeErr::Internal(format!(
                "failpoint {key}:transient"
            ))));
        }
        if self.failpoints.contains(key) {
            return Err(DbErr::Custom(format!("failpoint {key}")));
        }
        Ok(())
    }

    pub fn query<T: TableRow>(&self) -> RowQuery<'_, T> {
        RowQuery::new(self)
    }

    pub async fn get<T: TableRow>(&self, key: impl Into<SeaValue>) -> DocflowResult<Option<T>> {
        let filter = Condition::all().add(Expr::col(T::primary_key()).eq(key.into()));
        self.query::<T>().filter(filter).first().await
    }

    /// Conditional bulk update in its own transaction. Returns affected rows.
    pub async fn update_all<T: TableRow>(
        &self,
        filter: Condition,
        updates: &[(T::Column, SeaValue)],
    ) -> DocflowResult<u64> {
        let operation = format!("update_all {}", T::NAME);
        let filter = &filter;
        let affected = self
            .write(&operation, move || async move {
                self.failpoint("update_all")?;
                let tx = self.conn.begin().await?;
                let result = update_rows::<T, _>(&tx, filter.clone(), updates).await;
                commit_or_rollback(tx, result).await
            })
            .await?;
        debug!("{operation}: {affected} rows affected");
        Ok(affected)
    }

    /// Insert or update by primary key, then return the row as persisted.
    pub async fn save<T: TableRow>(&self, row: &T) -> DocflowResult<T> {
        let operation = format!("save {}", T::NAME);
        self.write(&operation, move || async move {
            self.failpoint("save")?;
            let tx = self.conn.begin().await?;
            let result = upsert_row(&tx, row).await;
            commit_or_rollback(tx, result).await
        })
        .await
    }

    /// Bulk insert in a single transaction.
    pub async fn insert_many<T: TableRow>(&self, rows: &[T]) -> DocflowResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let operation = format!("insert_many {}", T::NAME);
        let inserted = self
            .write(&operation, move || async move {
                self.failpoint("insert_many")?;
                let tx = self.conn.begin().await?;
                let result = insert_rows(&tx, rows).await;
                commit_or_rollback(tx, result).await
            })
            .await?;
        info!("{operation}: inserted {inserted} rows");
        Ok(inserted)
    }

    pub(crate) async fn fetch_all<T: TableRow>(
        &self,
        query: &RowQuery<'_, T>,
    ) -> DocflowResult<Vec<T>> {
        let mut select = Query::select();
        select
            .from(T::table())
            .columns(T::columns())
            .cond_where(query.condition.clone());
        for (column, order) in &query.order {
            select.order_by(*column, order.clone());
        }
        if let Some(limit) = query.limit {
            select.limit(limit);
        }
        let select = &select;
        let operation = format!("query {}", T::NAME);
        self.read(&operation, Vec::new(), move || async move {
            self.failpoint("query")?;
            let rows = query_all(&self.conn, select).await?;
            rows.iter().map(T::from_row).collect::<Result<Vec<_>, _>>()
        })
        .await
    }

    pub(crate) async fn fetch_count<T: TableRow>(
        &self,
        query: &RowQuery<'_, T>,
    ) -> DocflowResult<u64> {
        let select = Query::select()
            .from(T::table())
            .expr_as(
                Func::count(Expr::col(T::primary_key())),
                Alias::new("row_count"),
            )
            .cond_where(query.condition.clone())
            .to_owned();
        let select = &select;
        let operation = format!("count {}", T::NAME);
        self.read(&operation, 0, move || async move {
            self.failpoint("count")?;
            let Some(row) = query_one(&self.conn, select).await? else {
                return Ok(0);
            };
            let count: i64 = row.try_get("", "row_count")?;
            Ok(Ord::max(count, 0) as u64)
        })
        .await
    }

    /// Reads degrade to `fallback` on a permanent failure; only exhausted
    /// retries surface as an error.
    async fn read<T, F, Fut>(&self, operation: &str, fallback: T, attempt: F) -> DocflowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        match with_retry(&self.retry, operation, attempt).await {
            Ok(value) => Ok(value),
            Err(RetryError::Failed(err)) => {
                error!("{operation} failed: {err}");
                Ok(fallback)
            }
            Err(err) => {
                let err = DocflowError::from(err);
                error!("{err}");
                Err(err)
            }
        }
    }

    async fn write<T, F, Fut>(&self, operation: &str, attempt: F) -> DocflowResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        with_retry(&self.retry, operation, attempt)
            .await
            .map_err(|err| {
                let err = DocflowError::from(err);
                error!("{operation} failed: {err}");
                err
            })
    }

    async fn update_documents(
        &self,
        operation: &str,
        filter: Condition,
        updates: Vec<(Documents, SeaValue)>,
    ) -> DocflowResult<u64> {
        let filter = &filter;
        let updates = updates.as_slice();
        self.write(operation, move || async move {
            self.failpoint(operation)?;
            let tx = self.conn.begin().await?;
            let result = update_rows::<Document, _>(&tx, filter.clone(), updates).await;
            commit_or_rollback(tx, result).await
        })
        .await
    }
}

#[async_trait]
impl DocumentQueueApi for DocflowStore {
    async fn claim_document(
        &self,
        doc_id: &str,
        worker_id: &str,
        now: Timestamp,
        lease: Duration,
    ) -> DocflowResult<bool> {
        let expires_at = add_duration(now, lease);
        let affected = self
            .update_documents(
                "claim_document",
                claim_guard(doc_id, worker_id, now),
                claim_updates(worker_id, expires_at),
            )
            .await?;
        if affected == 0 {
            debug!("document {doc_id} is not claimable by {worker_id}");
        }
        Ok(affected > 0)
    }

    async fn mark_document_processed(&self, doc_id: &str, now: Timestamp) -> DocflowResult<bool> {
        let affected = self
            .update_documents(
                "mark_document_processed",
                stamp_condition(doc_id),
                stamp_updates(now),
            )
            .await?;
        Ok(affected > 0)
    }

    async fn release_claim(&self, doc_id: &str, worker_id: &str) -> DocflowResult<bool> {
        let affected = self
            .update_documents(
                "release_claim",
                release_condition(doc_id, worker_id),
                release_updates(),
            )
            .await?;
        Ok(affected > 0)
    }

    async fn queue_stats(
        &self,
        document_type: Option<&str>,
        now: Timestamp,
    ) -> DocflowResult<QueueStats> {
        let pending = self
            .query::<Document>()
            .filter(pending_condition(document_type))
            .filter(claimable_condition(now))
            .count()
            .await?;
        let claimed = self
            .query::<Document>()
            .filter(pending_condition(document_type))
            .filter(claimed_condition(now))
            .count()
            .await?;
        let mut processed_filter =
            Condition::all().add(Expr::col(Documents::ProcessedAt).is_not_null());
        if let Some(document_type) = document_type.filter(|value| !value.is_empty()) {
            processed_filter =
                processed_filter.add(Expr::col(Documents::DocumentType).eq(document_type));
        }
        let processed = self
            .query::<Document>()
            .filter(processed_filter)
            .count()
            .await?;
        Ok(QueueStats {
            pending,
            claimed,
            processed,
        })
    }
}

/// Conditional update on any connection or open transaction.
pub async fn update_rows<T, C>(
    conn: &C,
    filter: Condition,
    updates: &[(T::Column, SeaValue)],
) -> Result<u64, DbErr>
where
    T: TableRow,
    C: ConnectionTrait,
{
    if updates.is_empty() {
        return Ok(0);
    }
    let update = Query::update()
        .table(T::table())
        .values(
            updates
                .iter()
                .map(|(column, value)| (*column, value.clone().into())),
        )
        .cond_where(filter)
        .to_owned();
    exec_count(conn, &update).await
}

/// Commit on success, roll back explicitly on failure.
pub async fn commit_or_rollback<T>(
    tx: DatabaseTransaction,
    result: Result<T, DbErr>,
) -> Result<T, DbErr> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("rollback failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

async fn upsert_row<T: TableRow, C: ConnectionTrait>(conn: &C, row: &T) -> Result<T, DbErr> {
    let primary_key = T::primary_key();
    let non_key = T::columns()
        .into_iter()
        .filter(|column| *column != primary_key)
        .collect::<Vec<_>>();
    let insert = Query::insert()
        .into_table(T::table())
        .columns(T::columns())
        .values(row.values().into_iter().map(Into::into))
        .map_err(|err| DbErr::Custom(err.to_string()))?
        .on_conflict(
            OnConflict::column(primary_key)
                .update_columns(non_key)
                .to_owned(),
        )
        .to_owned();
    exec_count(conn, &insert).await?;

    let select = Query::select()
        .from(T::table())
        .columns(T::columns())
        .and_where(Expr::col(primary_key).eq(row.primary_key_value()))
        .to_owned();
    let saved = query_one(conn, &select)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("{} row vanished after save", T::NAME)))?;
    T::from_row(&saved)
}

async fn insert_rows<T: TableRow, C: ConnectionTrait>(conn: &C, rows: &[T]) -> Result<u64, DbErr> {
    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut insert = Query::insert();
        insert.into_table(T::table()).columns(T::columns());
        for row in chunk {
            insert
                .values(row.values().into_iter().map(Into::into))
                .map_err(|err| DbErr::Custom(err.to_string()))?;
        }
        inserted += exec_count(conn, &insert).await?;
    }
    Ok(inserted)
}

fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Sqlite => stmt.build(SqliteQueryBuilder),
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

async fn exec_count<C, S>(conn: &C, stmt: &S) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute_raw(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(result.rows_affected())
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> Result<Vec<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_all_raw(Statement::from_sql_and_values(backend, sql, values))
        .await
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> Result<Option<QueryResult>, DbErr>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.query_one_raw(Statement::from_sql_and_values(backend, sql, values))
        .await
}
