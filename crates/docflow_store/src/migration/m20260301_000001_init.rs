use sea_orm_migration::prelude::*;

use crate::db::{Data, Documents};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // `if_not_exists` lets the worker adopt tables created by older tooling.
        // Those may hold NULL header columns; selection skips such rows.
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Documents::DocId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Documents::ReceivedAt).timestamp().not_null())
                    .col(ColumnDef::new(Documents::DocumentType).string().not_null())
                    .col(ColumnDef::new(Documents::DocumentData).json().not_null())
                    .col(ColumnDef::new(Documents::ProcessedAt).timestamp().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Data::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Data::Object)
                            .string_len(50)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Data::Status).integer().null())
                    .col(ColumnDef::new(Data::Level).integer().null())
                    .col(ColumnDef::new(Data::Parent).string().null())
                    .col(ColumnDef::new(Data::Owner).string_len(14).null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_data_parent")
                    .table(Data::Table)
                    .col(Data::Parent)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Data::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await?;
        Ok(())
    }
}
