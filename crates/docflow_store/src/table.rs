use std::marker::PhantomData;

use sea_orm::sea_query::{Condition, Iden, Order, Value as SeaValue};
use sea_orm::{DbErr, QueryResult};
use serde_json::Value as JsonValue;

use crate::db::{Data, Documents};
use crate::store::DocflowStore;
use docflow_core::{DocflowResult, Document, Record, Timestamp};

/// A struct persisted as one row of a single table.
pub trait TableRow: Sized + Send + Sync + 'static {
    type Column: Iden + Copy + PartialEq + Send + Sync + 'static;

    /// Name used in log lines and failpoint keys.
    const NAME: &'static str;

    fn table() -> Self::Column;
    fn primary_key() -> Self::Column;
    /// Every persisted column, in the order of [`TableRow::values`].
    fn columns() -> Vec<Self::Column>;
    fn primary_key_value(&self) -> SeaValue;
    fn values(&self) -> Vec<SeaValue>;
    fn from_row(row: &QueryResult) -> Result<Self, DbErr>;
}

pub(crate) fn col_name(column: impl Iden) -> String {
    column.to_string()
}

impl TableRow for Document {
    type Column = Documents;
    const NAME: &'static str = "documents";

    fn table() -> Documents {
        Documents::Table
    }

    fn primary_key() -> Documents {
        Documents::DocId
    }

    fn columns() -> Vec<Documents> {
        vec![
            Documents::DocId,
            Documents::ReceivedAt,
            Documents::DocumentType,
            Documents::DocumentData,
            Documents::ProcessedAt,
            Documents::ClaimedBy,
            Documents::ClaimExpiresAt,
        ]
    }

    fn primary_key_value(&self) -> SeaValue {
        self.doc_id.clone().into()
    }

    fn values(&self) -> Vec<SeaValue> {
        vec![
            self.doc_id.clone().into(),
            self.received_at.into(),
            self.document_type.clone().into(),
            self.document_data.clone().into(),
            self.processed_at.into(),
            self.claimed_by.clone().into(),
            self.claim_expires_at.into(),
        ]
    }

    fn from_row(row: &QueryResult) -> Result<Self, DbErr> {
        Ok(Self {
            doc_id: row.try_get("", &col_name(Documents::DocId))?,
            received_at: row.try_get::<Timestamp>("", &col_name(Documents::ReceivedAt))?,
            document_type: row.try_get("", &col_name(Documents::DocumentType))?,
            document_data: row.try_get::<JsonValue>("", &col_name(Documents::DocumentData))?,
            processed_at: row.try_get("", &col_name(Documents::ProcessedAt))?,
            claimed_by: row.try_get("", &col_name(Documents::ClaimedBy))?,
            claim_expires_at: row.try_get("", &col_name(Documents::ClaimExpiresAt))?,
        })
    }
}

impl TableRow for Record {
    type Column = Data;
    const NAME: &'static str = "data";

    fn table() -> Data {
        Data::Table
    }

    fn primary_key() -> Data {
        Data::Object
    }

    fn columns() -> Vec<Data> {
        vec![Data::Object, Data::Status, Data::Level, Data::Parent, Data::Owner]
    }

    fn primary_key_value(&self) -> SeaValue {
        self.object.clone().into()
    }

    fn values(&self) -> Vec<SeaValue> {
        vec![
            self.object.clone().into(),
            self.status.into(),
            self.level.into(),
            self.parent.clone().into(),
            self.owner.clone().into(),
        ]
    }

    fn from_row(row: &QueryResult) -> Result<Self, DbErr> {
        Ok(Self {
            object: row.try_get("", &col_name(Data::Object))?,
            status: row.try_get("", &col_name(Data::Status))?,
            level: row.try_get("", &col_name(Data::Level))?,
            parent: row.try_get("", &col_name(Data::Parent))?,
            owner: row.try_get("", &col_name(Data::Owner))?,
        })
    }
}

/// Lazily built select over one table. Nothing runs until a terminal call.
pub struct RowQuery<'a, T: TableRow> {
    store: &'a DocflowStore,
    pub(crate) condition: Condition,
    pub(crate) order: Vec<(T::Column, Order)>,
    pub(crate) limit: Option<u64>,
    _row: PhantomData<T>,
}

impl<'a, T: TableRow> RowQuery<'a, T> {
    pub(crate) fn new(store: &'a DocflowStore) -> Self {
        Self {
            store,
            condition: Condition::all(),
            order: Vec::new(),
            limit: None,
            _row: PhantomData,
        }
    }

    /// Filters accumulate with AND.
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = self.condition.add(condition);
        self
    }

    pub fn order_by(mut self, column: T::Column, order: Order) -> Self {
        self.order.push((column, order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub async fn all(self) -> DocflowResult<Vec<T>> {
        self.store.fetch_all(&self).await
    }

    /// First matching row; a miss is `None`, never an error.
    pub async fn first(self) -> DocflowResult<Option<T>> {
        let query = self.limit(1);
        let rows = query.store.fetch_all(&query).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn count(self) -> DocflowResult<u64> {
        self.store.fetch_count(&self).await
    }
}
