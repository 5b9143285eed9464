use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use sea_orm::sea_query;
use sea_orm::sea_query::{
    Alias, Asterisk, ColumnDef, Condition, Expr, Func, MysqlQueryBuilder, OnConflict, Order,
    PostgresQueryBuilder, Query, QueryStatementWriter, SelectStatement, SqliteQueryBuilder, Table,
    TableCreateStatement, WindowStatement,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, QueryResult,
    Statement, StatementBuilder, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;

use crate::db::{PartitionMetadata as MetadataTable, RatingCol};
use crate::loader::RatingsReader;
use crate::migration::Migrator;
use crate::{DatabaseConfig, LoaderConfig, StoreConfig};
use ratings_partition_core::round_robin::{self, RoundRobinCursor};
use ratings_partition_core::{
    InsertRouterApi, IntrospectionApi, PartitionApi, PartitionCount, PartitionError,
    PartitionMetadata, PartitionReport, PartitionResult, PartitionScheme, PartitionSummary,
    RangeBounds, RangeLayout, RatingRow, RatingsLoadApi, RoutedInsert, VerificationApi, Violation,
    validate_table_name,
};

const RATING_COLUMNS: [RatingCol; 3] = [RatingCol::UserId, RatingCol::ItemId, RatingCol::Rating];

// Stays under the bind parameter ceiling of every supported backend.
const MAX_BIND_PARAMS: usize = 30_000;

const ROW_COUNT: &str = "row_count";
const ROW_POSITION: &str = "row_position";

#[derive(Clone)]
pub struct RatingsStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    loader: LoaderConfig,
    insert_batch: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct BackendCapabilities {
    pub transactional_ddl: bool,
    pub information_schema: bool,
}

impl RatingsStore {
    pub async fn connect(config: &StoreConfig, base_dir: &Path) -> PartitionResult<Self> {
        config.loader.validate()?;
        let url = build_connection_url(config, base_dir)?;
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
        let conn = Database::connect(options).await.map_err(PartitionError::from)?;
        let backend = conn.get_database_backend();
        let store = Self {
            conn,
            backend,
            loader: config.loader.clone(),
            insert_batch: config.insert_batch(),
        };
        Migrator::up(&store.conn, None)
            .await
            .map_err(PartitionError::from)?;
        debug!(
            "connected ratings store backend={} insert_batch={}",
            config.backend_name(),
            store.insert_batch
        );
        Ok(store)
    }

    pub async fn connect_sqlite(path: &Path) -> PartitionResult<Self> {
        let config = StoreConfig::default_sqlite(path.to_string_lossy());
        Self::connect(&config, path.parent().unwrap_or_else(|| Path::new("."))).await
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        match self.backend {
            DatabaseBackend::Sqlite => BackendCapabilities {
                transactional_ddl: true,
                information_schema: false,
            },
            DatabaseBackend::Postgres => BackendCapabilities {
                transactional_ddl: true,
                information_schema: true,
            },
            DatabaseBackend::MySql => BackendCapabilities {
                transactional_ddl: false,
                information_schema: true,
            },
            _ => BackendCapabilities {
                transactional_ddl: false,
                information_schema: false,
            },
        }
    }

    fn warn_if_ddl_not_atomic(&self, operation: &str) {
        if !self.capabilities().transactional_ddl {
            warn!(
                "{operation}: backend {:?} commits DDL implicitly; a failure can leave a partially rebuilt partition set",
                self.backend
            );
        }
    }

    fn batch_rows(&self) -> usize {
        self.insert_batch
            .min(MAX_BIND_PARAMS / RATING_COLUMNS.len())
            .max(1)
    }

    async fn insert_rows<C: ConnectionTrait>(
        &self,
        conn: &C,
        table: &str,
        rows: &[RatingRow],
    ) -> PartitionResult<()> {
        for chunk in rows.chunks(self.batch_rows()) {
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table))
                .columns(RATING_COLUMNS);
            for row in chunk {
                insert.values_panic([
                    row.user_id.into(),
                    row.item_id.into(),
                    row.rating.into(),
                ]);
            }
            exec(conn, &insert).await?;
        }
        Ok(())
    }

    /// Recreates partition tables `0..count` and drops any higher-indexed
    /// leftovers of the same scheme.
    async fn reset_partition_tables<C: ConnectionTrait>(
        &self,
        conn: &C,
        scheme: PartitionScheme,
        count: PartitionCount,
    ) -> PartitionResult<()> {
        let stale: Vec<String> = list_tables(conn)
            .await?
            .into_iter()
            .filter(|table| {
                scheme
                    .parse_index(table)
                    .is_some_and(|index| index >= count.get())
            })
            .collect();
        for table in &stale {
            debug!("dropping stale {scheme} partition {table}");
            exec_schema(conn, &Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }
        for index in 0..count.get() {
            let table = scheme.table_name(index);
            exec_schema(
                conn,
                &Table::drop()
                    .table(Alias::new(table.as_str()))
                    .if_exists()
                    .to_owned(),
            )
            .await?;
            exec_schema(conn, &ratings_table(&table, false)).await?;
        }
        Ok(())
    }

    async fn require_metadata<C: ConnectionTrait>(
        &self,
        conn: &C,
        scheme: PartitionScheme,
        base_table: &str,
    ) -> PartitionResult<PartitionMetadata> {
        let metadata = load_metadata(conn, scheme)
            .await?
            .ok_or_else(|| PartitionError::no_partitions(scheme.as_str()))?;
        if metadata.base_table != base_table {
            return Err(PartitionError::invalid(format!(
                "{scheme} partitions were built from '{}', not '{base_table}'",
                metadata.base_table
            )));
        }
        Ok(metadata)
    }
}

#[async_trait]
impl RatingsLoadApi for RatingsStore {
    async fn load_ratings(&self, base_table: &str, path: &Path) -> PartitionResult<u64> {
        let base_table = validate_table_name(base_table)?;
        let mut reader = RatingsReader::open(path, self.loader.clone())?;
        self.warn_if_ddl_not_atomic("load ratings");
        let tx = self.conn.begin().await?;
        exec_schema(
            &tx,
            &Table::drop()
                .table(Alias::new(base_table))
                .if_exists()
                .to_owned(),
        )
        .await?;
        exec_schema(&tx, &ratings_table(base_table, false)).await?;
        for scheme in PartitionScheme::ALL {
            let built_from_base = load_metadata(&tx, scheme)
                .await?
                .is_some_and(|metadata| metadata.base_table == base_table);
            if built_from_base {
                let dropped = drop_partition_set(&tx, scheme).await?;
                info!("reload of {base_table} dropped {dropped} {scheme} partitions");
            }
        }
        let mut total = 0u64;
        loop {
            let batch = reader.next_batch(self.batch_rows())?;
            if batch.is_empty() {
                break;
            }
            self.insert_rows(&tx, base_table, &batch).await?;
            total += batch.len() as u64;
        }
        tx.commit().await?;
        info!(
            "loaded {total} ratings from {} into {base_table}",
            path.display()
        );
        Ok(total)
    }

    async fn insert_ratings(&self, base_table: &str, rows: &[RatingRow]) -> PartitionResult<u64> {
        let base_table = validate_table_name(base_table)?;
        for row in rows {
            row.validated()?;
        }
        let tx = self.conn.begin().await?;
        exec_schema(&tx, &ratings_table(base_table, true)).await?;
        self.insert_rows(&tx, base_table, rows).await?;
        tx.commit().await?;
        debug!("appended {} ratings to {base_table}", rows.len());
        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl PartitionApi for RatingsStore {
    async fn range_partition(
        &self,
        base_table: &str,
        partitions: i64,
    ) -> PartitionResult<PartitionSummary> {
        let base_table = validate_table_name(base_table)?;
        let count = PartitionCount::new(partitions)?;
        let layout = RangeLayout::new(count);
        self.warn_if_ddl_not_atomic("range partition");

        let tx = self.conn.begin().await?;
        self.reset_partition_tables(&tx, PartitionScheme::Range, count)
            .await?;
        let mut row_counts = Vec::with_capacity(count.get());
        for (index, bounds) in layout.all_bounds().iter().enumerate() {
            let table = PartitionScheme::Range.table_name(index);
            let select = Query::select()
                .columns(RATING_COLUMNS)
                .from(Alias::new(base_table))
                .cond_where(range_condition(bounds))
                .to_owned();
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table.as_str()))
                .columns(RATING_COLUMNS)
                .select_from(select)
                .map_err(|err| PartitionError::storage(err.to_string()))?;
            exec(&tx, &insert).await?;
            row_counts.push(count_table(&tx, &table).await?);
        }
        save_metadata(
            &tx,
            &PartitionMetadata {
                scheme: PartitionScheme::Range,
                base_table: base_table.to_string(),
                partition_count: count,
                next_cursor: 0,
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            "range partitioned {base_table} into {} partitions (delta={}) rows={row_counts:?}",
            count.get(),
            layout.delta()
        );
        Ok(PartitionSummary {
            scheme: PartitionScheme::Range,
            partition_count: count,
            row_counts,
        })
    }

    async fn round_robin_partition(
        &self,
        base_table: &str,
        partitions: i64,
    ) -> PartitionResult<PartitionSummary> {
        let base_table = validate_table_name(base_table)?;
        let count = PartitionCount::new(partitions)?;
        self.warn_if_ddl_not_atomic("round-robin partition");

        let tx = self.conn.begin().await?;
        self.reset_partition_tables(&tx, PartitionScheme::RoundRobin, count)
            .await?;
        let mut row_counts = Vec::with_capacity(count.get());
        for index in 0..count.get() {
            let table = PartitionScheme::RoundRobin.table_name(index);
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table.as_str()))
                .columns(RATING_COLUMNS)
                .select_from(round_robin_select(base_table, index, count))
                .map_err(|err| PartitionError::storage(err.to_string()))?;
            exec(&tx, &insert).await?;
            row_counts.push(count_table(&tx, &table).await?);
        }
        let cursor = RoundRobinCursor::start(count);
        save_metadata(
            &tx,
            &PartitionMetadata {
                scheme: PartitionScheme::RoundRobin,
                base_table: base_table.to_string(),
                partition_count: count,
                next_cursor: cursor.next(),
            },
        )
        .await?;
        tx.commit().await?;

        info!(
            "round-robin partitioned {base_table} into {} partitions rows={row_counts:?}",
            count.get()
        );
        Ok(PartitionSummary {
            scheme: PartitionScheme::RoundRobin,
            partition_count: count,
            row_counts,
        })
    }

    async fn delete_partitions(&self, scheme: PartitionScheme) -> PartitionResult<usize> {
        self.warn_if_ddl_not_atomic("delete partitions");
        let tx = self.conn.begin().await?;
        let dropped = drop_partition_set(&tx, scheme).await?;
        tx.commit().await?;
        info!("dropped {dropped} {scheme} partitions");
        Ok(dropped)
    }
}

#[async_trait]
impl InsertRouterApi for RatingsStore {
    async fn range_insert(
        &self,
        base_table: &str,
        row: RatingRow,
    ) -> PartitionResult<RoutedInsert> {
        let base_table = validate_table_name(base_table)?;
        let row = row.validated()?;

        let tx = self.conn.begin().await?;
        let metadata = self
            .require_metadata(&tx, PartitionScheme::Range, base_table)
            .await?;
        let index = RangeLayout::new(metadata.partition_count).index_for(row.rating)?;
        let table = PartitionScheme::Range.table_name(index);
        self.insert_rows(&tx, base_table, &[row]).await?;
        self.insert_rows(&tx, &table, &[row]).await?;
        tx.commit().await?;

        debug!(
            "range insert user={} item={} rating={} -> {table}",
            row.user_id, row.item_id, row.rating
        );
        Ok(RoutedInsert {
            scheme: PartitionScheme::Range,
            partition_index: index,
            table,
        })
    }

    async fn round_robin_insert(
        &self,
        base_table: &str,
        row: RatingRow,
    ) -> PartitionResult<RoutedInsert> {
        let base_table = validate_table_name(base_table)?;
        let row = row.validated()?;

        let tx = self.conn.begin().await?;
        let metadata = self
            .require_metadata(&tx, PartitionScheme::RoundRobin, base_table)
            .await?;
        let mut cursor =
            RoundRobinCursor::restore(metadata.next_cursor as i64, metadata.partition_count)?;
        let index = cursor.advance();
        let table = PartitionScheme::RoundRobin.table_name(index);
        self.insert_rows(&tx, base_table, &[row]).await?;
        self.insert_rows(&tx, &table, &[row]).await?;
        let update = Query::update()
            .table(MetadataTable::Table)
            .values([(MetadataTable::NextCursor, (cursor.next() as i64).into())])
            .and_where(Expr::col(MetadataTable::Scheme).eq(PartitionScheme::RoundRobin.as_str()))
            .to_owned();
        exec(&tx, &update).await?;
        tx.commit().await?;

        debug!(
            "round-robin insert user={} item={} -> {table} (next cursor {})",
            row.user_id,
            row.item_id,
            cursor.next()
        );
        Ok(RoutedInsert {
            scheme: PartitionScheme::RoundRobin,
            partition_index: index,
            table,
        })
    }
}

#[async_trait]
impl IntrospectionApi for RatingsStore {
    async fn count_partitions(&self, prefix: &str) -> PartitionResult<usize> {
        let tables = list_tables(&self.conn).await?;
        Ok(tables
            .iter()
            .filter(|table| table.starts_with(prefix))
            .count())
    }

    async fn partition_metadata(
        &self,
        scheme: PartitionScheme,
    ) -> PartitionResult<Option<PartitionMetadata>> {
        load_metadata(&self.conn, scheme).await
    }

    async fn partition_sizes(&self, scheme: PartitionScheme) -> PartitionResult<Vec<u64>> {
        let metadata = load_metadata(&self.conn, scheme)
            .await?
            .ok_or_else(|| PartitionError::no_partitions(scheme.as_str()))?;
        let mut sizes = Vec::with_capacity(metadata.partition_count.get());
        for table in metadata.table_names() {
            sizes.push(count_table(&self.conn, &table).await?);
        }
        Ok(sizes)
    }

    async fn read_partition(
        &self,
        scheme: PartitionScheme,
        index: usize,
    ) -> PartitionResult<Vec<RatingRow>> {
        let metadata = load_metadata(&self.conn, scheme)
            .await?
            .ok_or_else(|| PartitionError::no_partitions(scheme.as_str()))?;
        if index >= metadata.partition_count.get() {
            return Err(PartitionError::invalid(format!(
                "{scheme} partition {index} does not exist (count {})",
                metadata.partition_count.get()
            )));
        }
        read_rows(&self.conn, &scheme.table_name(index), false).await
    }

    async fn read_table(&self, table: &str) -> PartitionResult<Vec<RatingRow>> {
        let table = validate_table_name(table)?;
        read_rows(&self.conn, table, true).await
    }

    async fn count_rows(&self, table: &str) -> PartitionResult<u64> {
        let table = validate_table_name(table)?;
        count_table(&self.conn, table).await
    }
}

#[async_trait]
impl VerificationApi for RatingsStore {
    async fn verify_partitions(
        &self,
        base_table: &str,
        scheme: PartitionScheme,
    ) -> PartitionResult<PartitionReport> {
        let base_table = validate_table_name(base_table)?;
        let metadata = self
            .require_metadata(&self.conn, scheme, base_table)
            .await?;
        let count = metadata.partition_count;
        let mut violations = Vec::new();

        let tables: HashSet<String> = list_tables(&self.conn).await?.into_iter().collect();
        let live = tables
            .iter()
            .filter(|table| table.starts_with(scheme.table_prefix()))
            .count();
        if live != count.get() {
            violations.push(Violation::TableCount {
                expected: count.get(),
                found: live,
            });
        }

        let base_rows = count_table(&self.conn, base_table).await?;
        let mut partition_rows = Vec::with_capacity(count.get());
        for table in metadata.table_names() {
            if tables.contains(&table) {
                partition_rows.push(count_table(&self.conn, &table).await?);
            } else {
                partition_rows.push(0);
            }
        }
        let merged: u64 = partition_rows.iter().sum();
        if merged < base_rows {
            violations.push(Violation::Incomplete {
                expected: base_rows,
                found: merged,
            });
        }
        if merged > base_rows {
            violations.push(Violation::Overlapping {
                expected: base_rows,
                found: merged,
            });
        }

        let expected = match scheme {
            PartitionScheme::Range => {
                let layout = RangeLayout::new(count);
                let mut expected = Vec::with_capacity(count.get());
                for bounds in layout.all_bounds() {
                    expected.push(
                        count_matching(&self.conn, base_table, Some(range_condition(&bounds)))
                            .await?,
                    );
                }
                Some(expected)
            }
            PartitionScheme::RoundRobin if metadata.next_cursor == 0 => {
                Some(round_robin::expected_counts(base_rows, count))
            }
            PartitionScheme::RoundRobin => None,
        };
        if let Some(expected) = expected {
            for (index, (expected, found)) in expected.iter().zip(&partition_rows).enumerate() {
                if expected != found {
                    violations.push(Violation::PartitionSize {
                        index,
                        expected: *expected,
                        found: *found,
                    });
                }
            }
        }

        if !violations.is_empty() {
            warn!(
                "{scheme} partitions of {base_table} failed verification: {violations:?}"
            );
        }
        Ok(PartitionReport {
            scheme,
            partition_count: count,
            base_rows,
            partition_rows,
            violations,
        })
    }
}

fn ratings_table(name: &str, if_not_exists: bool) -> TableCreateStatement {
    let mut table = Table::create();
    table
        .table(Alias::new(name))
        .col(ColumnDef::new(RatingCol::UserId).big_integer().not_null())
        .col(ColumnDef::new(RatingCol::ItemId).big_integer().not_null())
        .col(ColumnDef::new(RatingCol::Rating).double().not_null());
    if if_not_exists {
        table.if_not_exists();
    }
    table.to_owned()
}

fn range_condition(bounds: &RangeBounds) -> Condition {
    let lower = if bounds.lower_inclusive {
        Expr::col(RatingCol::Rating).gte(bounds.lower)
    } else {
        Expr::col(RatingCol::Rating).gt(bounds.lower)
    };
    Condition::all()
        .add(lower)
        .add(Expr::col(RatingCol::Rating).lte(bounds.upper))
}

fn metadata_select(scheme: PartitionScheme) -> SelectStatement {
    Query::select()
        .from(MetadataTable::Table)
        .columns([
            MetadataTable::Scheme,
            MetadataTable::BaseTable,
            MetadataTable::PartitionCount,
            MetadataTable::NextCursor,
        ])
        .and_where(Expr::col(MetadataTable::Scheme).eq(scheme.as_str()))
        .limit(1)
        .to_owned()
}

async fn load_metadata<C: ConnectionTrait>(
    conn: &C,
    scheme: PartitionScheme,
) -> PartitionResult<Option<PartitionMetadata>> {
    let Some(row) = query_one(conn, &metadata_select(scheme)).await? else {
        return Ok(None);
    };
    let stored_scheme: String = row.try_get("", &col_name(MetadataTable::Scheme))?;
    let base_table: String = row.try_get("", &col_name(MetadataTable::BaseTable))?;
    let partition_count: i64 = row.try_get("", &col_name(MetadataTable::PartitionCount))?;
    let next_cursor: i64 = row.try_get("", &col_name(MetadataTable::NextCursor))?;
    let partition_count = PartitionCount::new(partition_count).map_err(|err| {
        PartitionError::storage(format!("corrupt {stored_scheme} metadata: {err}"))
    })?;
    let cursor = RoundRobinCursor::restore(next_cursor, partition_count)?;
    Ok(Some(PartitionMetadata {
        scheme: stored_scheme.parse()?,
        base_table,
        partition_count,
        next_cursor: cursor.next(),
    }))
}

async fn save_metadata<C: ConnectionTrait>(
    conn: &C,
    metadata: &PartitionMetadata,
) -> PartitionResult<()> {
    let upsert = Query::insert()
        .into_table(MetadataTable::Table)
        .columns([
            MetadataTable::Scheme,
            MetadataTable::BaseTable,
            MetadataTable::PartitionCount,
            MetadataTable::NextCursor,
        ])
        .values_panic([
            metadata.scheme.as_str().into(),
            metadata.base_table.clone().into(),
            i64::from(metadata.partition_count).into(),
            (metadata.next_cursor as i64).into(),
        ])
        .on_conflict(
            OnConflict::column(MetadataTable::Scheme)
                .update_columns([
                    MetadataTable::BaseTable,
                    MetadataTable::PartitionCount,
                    MetadataTable::NextCursor,
                ])
                .to_owned(),
        )
        .to_owned();
    exec(conn, &upsert).await
}

async fn read_rows<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    ordered: bool,
) -> PartitionResult<Vec<RatingRow>> {
    let mut select = Query::select();
    select.columns(RATING_COLUMNS).from(Alias::new(table));
    if ordered {
        select
            .order_by(RatingCol::UserId, Order::Asc)
            .order_by(RatingCol::ItemId, Order::Asc)
            .order_by(RatingCol::Rating, Order::Asc);
    }
    query_all(conn, &select)
        .await?
        .iter()
        .map(read_rating_row)
        .collect()
}

async fn count_table<C: ConnectionTrait>(conn: &C, table: &str) -> PartitionResult<u64> {
    count_matching(conn, table, None).await
}

async fn count_matching<C: ConnectionTrait>(
    conn: &C,
    table: &str,
    filter: Option<Condition>,
) -> PartitionResult<u64> {
    let mut select = Query::select();
    select
        .expr_as(Func::count(Expr::col(Asterisk)), Alias::new(ROW_COUNT))
        .from(Alias::new(table));
    if let Some(condition) = filter {
        select.cond_where(condition);
    }
    let count: i64 = match query_one(conn, &select).await? {
        Some(row) => row.try_get("", ROW_COUNT)?,
        None => 0,
    };
    Ok(count.max(0) as u64)
}

/// Rows of `base_table` whose 1-based position in `user_id, item_id, rating`
/// order is congruent to `index + 1` modulo the partition count.
fn round_robin_select(base_table: &str, index: usize, count: PartitionCount) -> SelectStatement {
    let numbered = Query::select()
        .columns(RATING_COLUMNS)
        .expr_window_as(
            Func::cust(Alias::new("ROW_NUMBER")),
            WindowStatement::new()
                .order_by(RatingCol::UserId, Order::Asc)
                .order_by(RatingCol::ItemId, Order::Asc)
                .order_by(RatingCol::Rating, Order::Asc)
                .to_owned(),
            Alias::new(ROW_POSITION),
        )
        .from(Alias::new(base_table))
        .to_owned();
    let modulus = count.get() as i64;
    let residue = round_robin::position_residue(index, count) as i64;
    Query::select()
        .columns(RATING_COLUMNS)
        .from_subquery(numbered, Alias::new("numbered"))
        .and_where(Expr::expr(Expr::col(Alias::new(ROW_POSITION)).modulo(modulus)).eq(residue))
        .to_owned()
}

/// Drops every `<prefix><index>` table of the scheme and forgets its metadata.
async fn drop_partition_set<C: ConnectionTrait>(
    conn: &C,
    scheme: PartitionScheme,
) -> PartitionResult<usize> {
    let tables: Vec<String> = list_tables(conn)
        .await?
        .into_iter()
        .filter(|table| scheme.parse_index(table).is_some())
        .collect();
    for table in &tables {
        exec_schema(conn, &Table::drop().table(Alias::new(table)).if_exists().to_owned()).await?;
    }
    let delete = Query::delete()
        .from_table(MetadataTable::Table)
        .and_where(Expr::col(MetadataTable::Scheme).eq(scheme.as_str()))
        .to_owned();
    exec(conn, &delete).await?;
    Ok(tables.len())
}

/// Every table in the active schema, as named in the catalog.
async fn list_tables<C: ConnectionTrait>(conn: &C) -> PartitionResult<Vec<String>> {
    let backend = conn.get_database_backend();
    let sql = match backend {
        DatabaseBackend::Postgres => {
            "SELECT table_name::text AS table_name FROM information_schema.tables \
             WHERE table_schema = current_schema()"
        }
        DatabaseBackend::MySql => {
            "SELECT table_name AS table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE()"
        }
        _ => "SELECT name AS table_name FROM sqlite_master WHERE type = 'table'",
    };
    let rows = conn.query_all(Statement::from_string(backend, sql)).await?;
    rows.iter()
        .map(|row| {
            row.try_get::<String>("", "table_name")
                .map_err(PartitionError::from)
        })
        .collect()
}

fn read_rating_row(row: &QueryResult) -> PartitionResult<RatingRow> {
    Ok(RatingRow {
        user_id: row.try_get("", &col_name(RatingCol::UserId))?,
        item_id: row.try_get("", &col_name(RatingCol::ItemId))?,
        rating: row.try_get("", &col_name(RatingCol::Rating))?,
    })
}

fn col_name(column: impl sea_query::Iden) -> String {
    column.to_string()
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

async fn exec<C, S>(conn: &C, stmt: &S) -> PartitionResult<()>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    conn.execute(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(())
}

async fn exec_schema<C, S>(conn: &C, stmt: &S) -> PartitionResult<()>
where
    C: ConnectionTrait,
    S: StatementBuilder,
{
    let statement = conn.get_database_backend().build(stmt);
    conn.execute(statement).await?;
    Ok(())
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> PartitionResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(rows)
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> PartitionResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one(Statement::from_sql_and_values(backend, sql, values))
        .await?;
    Ok(row)
}

fn build_connection_url(config: &StoreConfig, base_dir: &Path) -> PartitionResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
        DatabaseConfig::Mysql { url } => Ok(url.clone()),
    }
}
