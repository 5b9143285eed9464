use sea_orm::sea_query;
use sea_orm_migration::prelude::Iden;

/// Columns shared by the base table and every partition table.
#[derive(Iden, Clone, Copy)]
pub enum RatingCol {
    UserId,
    ItemId,
    Rating,
}

#[derive(Iden, Clone, Copy)]
pub enum PartitionMetadata {
    Table,
    Scheme,
    BaseTable,
    PartitionCount,
    NextCursor,
}
