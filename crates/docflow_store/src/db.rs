use sea_orm::sea_query;
use sea_orm_migration::prelude::Iden;

#[derive(Iden, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Documents {
    Table,
    DocId,
    // Column name predates this crate; existing databases depend on it.
    #[iden = "recieved_at"]
    ReceivedAt,
    DocumentType,
    DocumentData,
    ProcessedAt,
    ClaimedBy,
    ClaimExpiresAt,
}

#[derive(Iden, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Data {
    Table,
    Object,
    Status,
    Level,
    Parent,
    Owner,
}

impl Data {
    pub fn field(field: docflow_core::RecordField) -> Self {
        use docflow_core::RecordField;
        match field {
            RecordField::Status => Data::Status,
            RecordField::Level => Data::Level,
            RecordField::Parent => Data::Parent,
            RecordField::Owner => Data::Owner,
        }
    }
}
