use ratings_partition_store::{
    InsertRouterApi, IntrospectionApi, PartitionApi, PartitionError, PartitionResult,
    PartitionScheme, RangeLayout, RatingRow, RatingsLoadApi, RatingsStore, VerificationApi,
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use tempfile::tempdir;

async fn drop_table(store: &RatingsStore, table: &str) -> PartitionResult<()> {
    store
        .connection()
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("DROP TABLE {table}"),
        ))
        .await?;
    Ok(())
}

async fn store_with_base(dir: &std::path::Path) -> PartitionResult<RatingsStore> {
    let store = RatingsStore::connect_sqlite(&dir.join("ratings.sqlite")).await?;
    store
        .insert_ratings(
            "ratings",
            &[
                RatingRow::new(1, 10, 1.0),
                RatingRow::new(2, 11, 2.5),
                RatingRow::new(3, 12, 5.0),
                RatingRow::new(4, 13, 3.5),
            ],
        )
        .await?;
    Ok(store)
}

#[tokio::test]
async fn range_insert_matches_bulk_assignment() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;

    for n in [1, 2, 3, 4, 6] {
        store.range_partition("ratings", n).await?;
        let metadata = store
            .partition_metadata(PartitionScheme::Range)
            .await?
            .expect("metadata");
        let layout = RangeLayout::new(metadata.partition_count);
        let ratings = [0.0, layout.delta(), 2.5, 5.0 / 3.0, 4.999, 5.0];
        for (offset, rating) in ratings.into_iter().enumerate() {
            let row = RatingRow::new(1_000 + offset as i64, n, rating);
            let routed = store.range_insert("ratings", row).await?;
            assert_eq!(routed.partition_index, layout.index_for(rating)?);
            let rows = store
                .read_partition(PartitionScheme::Range, routed.partition_index)
                .await?;
            assert!(rows.contains(&row), "n={n} rating={rating}");
        }

        // A fresh bulk rebuild must agree with every incremental placement.
        let before = store.partition_sizes(PartitionScheme::Range).await?;
        let rebuilt = store.range_partition("ratings", n).await?;
        assert_eq!(before, rebuilt.row_counts, "n={n}");
        let report = store
            .verify_partitions("ratings", PartitionScheme::Range)
            .await?;
        assert!(report.is_sound(), "n={n}: {:?}", report.violations);
    }
    Ok(())
}

#[tokio::test]
async fn exact_multiple_of_delta_goes_down_one_partition() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.range_partition("ratings", 5).await?;

    let routed = store
        .range_insert("ratings", RatingRow::new(9, 9, 3.0))
        .await?;
    assert_eq!(routed.partition_index, 2);
    assert_eq!(routed.table, "range_part2");

    let routed = store
        .range_insert("ratings", RatingRow::new(9, 10, 0.0))
        .await?;
    assert_eq!(routed.partition_index, 0);
    Ok(())
}

#[tokio::test]
async fn inserts_before_partitioning_fail_without_writing() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;

    let err = store
        .range_insert("ratings", RatingRow::new(5, 5, 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::NoPartitionsExist { .. }));
    let err = store
        .round_robin_insert("ratings", RatingRow::new(5, 5, 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::NoPartitionsExist { .. }));

    assert_eq!(store.count_rows("ratings").await?, 4);
    Ok(())
}

#[tokio::test]
async fn out_of_range_rating_is_rejected_before_any_write() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.range_partition("ratings", 2).await?;
    store.round_robin_partition("ratings", 2).await?;

    for rating in [-1.0, 5.5, f64::NAN] {
        let err = store
            .range_insert("ratings", RatingRow::new(7, 7, rating))
            .await
            .unwrap_err();
        assert!(matches!(err, PartitionError::OutOfRangeRating { .. }));
        let err = store
            .round_robin_insert("ratings", RatingRow::new(7, 7, rating))
            .await
            .unwrap_err();
        assert!(matches!(err, PartitionError::OutOfRangeRating { .. }));
    }

    assert_eq!(store.count_rows("ratings").await?, 4);
    let metadata = store
        .partition_metadata(PartitionScheme::RoundRobin)
        .await?
        .expect("metadata");
    assert_eq!(metadata.next_cursor, 0);
    Ok(())
}

#[tokio::test]
async fn inserts_must_target_the_partitioned_base_table() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.range_partition("ratings", 2).await?;
    store
        .insert_ratings("other_ratings", &[RatingRow::new(1, 1, 1.0)])
        .await?;

    let err = store
        .range_insert("other_ratings", RatingRow::new(2, 2, 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::InvalidInput { .. }));
    let err = store
        .range_insert("ratings; drop table ratings", RatingRow::new(2, 2, 2.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::InvalidInput { .. }));
    Ok(())
}

#[tokio::test]
async fn round_robin_insert_writes_base_and_partition() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.round_robin_partition("ratings", 3).await?;

    let row = RatingRow::new(50, 500, 4.0);
    let routed = store.round_robin_insert("ratings", row).await?;
    assert_eq!(routed.partition_index, 0);
    assert!(store.read_table("ratings").await?.contains(&row));
    let partition = store
        .read_partition(PartitionScheme::RoundRobin, 0)
        .await?;
    assert!(partition.contains(&row));
    assert_eq!(store.count_rows("ratings").await?, 5);
    Ok(())
}

#[tokio::test]
async fn failed_round_robin_insert_rolls_back_base_row_and_cursor() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.round_robin_partition("ratings", 2).await?;
    drop_table(&store, "rrobin_part0").await?;

    let err = store
        .round_robin_insert("ratings", RatingRow::new(60, 600, 3.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::Storage { .. }), "{err:?}");

    assert_eq!(store.count_rows("ratings").await?, 4);
    let metadata = store
        .partition_metadata(PartitionScheme::RoundRobin)
        .await?
        .expect("metadata");
    assert_eq!(metadata.next_cursor, 0);
    assert_eq!(store.count_rows("rrobin_part1").await?, 2);
    Ok(())
}

#[tokio::test]
async fn failed_range_insert_rolls_back_base_row() -> PartitionResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = store_with_base(dir.path()).await?;
    store.range_partition("ratings", 2).await?;
    drop_table(&store, "range_part0").await?;

    let err = store
        .range_insert("ratings", RatingRow::new(60, 600, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, PartitionError::Storage { .. }), "{err:?}");

    assert_eq!(store.count_rows("ratings").await?, 4);
    assert!(!store.read_table("ratings").await?.contains(&RatingRow::new(60, 600, 1.0)));
    assert_eq!(store.count_rows("range_part1").await?, 2);
    Ok(())
}
