use sea_orm_migration::prelude::*;

use crate::db::PartitionMetadata;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PartitionMetadata::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PartitionMetadata::Scheme)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PartitionMetadata::BaseTable)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PartitionMetadata::PartitionCount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PartitionMetadata::NextCursor)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(PartitionMetadata::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
