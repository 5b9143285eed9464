use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{PartitionCount, PartitionResult, PartitionScheme, RatingRow};

/// Persisted record describing the live partition set of one scheme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    pub scheme: PartitionScheme,
    pub base_table: String,
    pub partition_count: PartitionCount,
    pub next_cursor: usize,
}

impl PartitionMetadata {
    pub fn table_names(&self) -> Vec<String> {
        (0..self.partition_count.get())
            .map(|index| self.scheme.table_name(index))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub scheme: PartitionScheme,
    pub partition_count: PartitionCount,
    pub row_counts: Vec<u64>,
}

impl PartitionSummary {
    pub fn total_rows(&self) -> u64 {
        self.row_counts.iter().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutedInsert {
    pub scheme: PartitionScheme,
    pub partition_index: usize,
    pub table: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    TableCount { expected: usize, found: usize },
    Incomplete { expected: u64, found: u64 },
    Overlapping { expected: u64, found: u64 },
    PartitionSize { index: usize, expected: u64, found: u64 },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionReport {
    pub scheme: PartitionScheme,
    pub partition_count: PartitionCount,
    pub base_rows: u64,
    pub partition_rows: Vec<u64>,
    pub violations: Vec<Violation>,
}

impl PartitionReport {
    pub fn is_sound(&self) -> bool {
        self.violations.is_empty()
    }
}

#[async_trait]
pub trait RatingsLoadApi {
    /// Drops and recreates `base_table`, then loads every row of `path`.
    async fn load_ratings(&self, base_table: &str, path: &Path) -> PartitionResult<u64>;

    /// Appends already parsed rows to an existing base table.
    async fn insert_ratings(&self, base_table: &str, rows: &[RatingRow]) -> PartitionResult<u64>;
}

#[async_trait]
pub trait PartitionApi {
    async fn range_partition(
        &self,
        base_table: &str,
        partitions: i64,
    ) -> PartitionResult<PartitionSummary>;

    async fn round_robin_partition(
        &self,
        base_table: &str,
        partitions: i64,
    ) -> PartitionResult<PartitionSummary>;

    /// Drops every partition table of `scheme` and forgets its metadata.
    async fn delete_partitions(&self, scheme: PartitionScheme) -> PartitionResult<usize>;
}

#[async_trait]
pub trait InsertRouterApi {
    async fn range_insert(
        &self,
        base_table: &str,
        row: RatingRow,
    ) -> PartitionResult<RoutedInsert>;

    async fn round_robin_insert(
        &self,
        base_table: &str,
        row: RatingRow,
    ) -> PartitionResult<RoutedInsert>;
}

#[async_trait]
pub trait IntrospectionApi {
    /// Number of tables in the active catalog whose name starts with `prefix`.
    async fn count_partitions(&self, prefix: &str) -> PartitionResult<usize>;

    async fn partition_metadata(
        &self,
        scheme: PartitionScheme,
    ) -> PartitionResult<Option<PartitionMetadata>>;

    async fn partition_sizes(&self, scheme: PartitionScheme) -> PartitionResult<Vec<u64>>;

    async fn read_partition(
        &self,
        scheme: PartitionScheme,
        index: usize,
    ) -> PartitionResult<Vec<RatingRow>>;

    async fn read_table(&self, table: &str) -> PartitionResult<Vec<RatingRow>>;

    async fn count_rows(&self, table: &str) -> PartitionResult<u64>;
}

#[async_trait]
pub trait VerificationApi {
    async fn verify_partitions(
        &self,
        base_table: &str,
        scheme: PartitionScheme,
    ) -> PartitionResult<PartitionReport>;
}
