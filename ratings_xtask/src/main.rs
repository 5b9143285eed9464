use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;
use ratings_partition_store::{
    InsertRouterApi, IntrospectionApi, PartitionApi, PartitionScheme, RatingRow, RatingsLoadApi,
    RatingsStore, VerificationApi, open_store,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let store = open_store(&cli.data_dir)
        .await
        .with_context(|| format!("open datastore {}", cli.data_dir.display()))?;
    run(&store, cli.command).await
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Partition a ratings table by range or round-robin"
)]
struct Cli {
    /// Directory holding ratings.json and the default sqlite file.
    #[arg(long, default_value = ".ratings")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drop and reload the base table from a delimited ratings file.
    Load(LoadArgs),
    /// Rebuild N equal-width rating range partitions.
    RangePartition(PartitionArgs),
    /// Rebuild N round-robin partitions and reset the insert cursor.
    RoundRobinPartition(PartitionArgs),
    /// Insert one rating into the base table and its range partition.
    RangeInsert(InsertArgs),
    /// Insert one rating into the base table and the next round-robin partition.
    RoundRobinInsert(InsertArgs),
    /// Count tables whose name starts with a prefix.
    CountPartitions(CountArgs),
    /// Check partition count, completeness, disjointness and partition sizes.
    Verify(VerifyArgs),
    /// Drop every partition of a scheme.
    DeletePartitions(SchemeArgs),
}

#[derive(Parser)]
struct LoadArgs {
    #[arg(long, default_value = "ratings")]
    table: String,
    /// Ratings file, one `user::item::rating::timestamp` row per line.
    #[arg(long)]
    input: PathBuf,
}

#[derive(Parser)]
struct PartitionArgs {
    #[arg(long, default_value = "ratings")]
    table: String,
    #[arg(long, allow_negative_numbers = true)]
    partitions: i64,
}

#[derive(Parser)]
struct InsertArgs {
    #[arg(long, default_value = "ratings")]
    table: String,
    #[arg(long)]
    user: i64,
    #[arg(long)]
    item: i64,
    #[arg(long)]
    rating: f64,
}

#[derive(Parser)]
struct CountArgs {
    #[arg(long)]
    prefix: String,
}

#[derive(Parser)]
struct VerifyArgs {
    #[arg(long, default_value = "ratings")]
    table: String,
    /// `range` or `round_robin`.
    #[arg(long)]
    scheme: PartitionScheme,
    /// Print the report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser)]
struct SchemeArgs {
    #[arg(long)]
    scheme: PartitionScheme,
}

async fn run(store: &RatingsStore, command: Command) -> Result<()> {
    match command {
        Command::Load(args) => {
            let rows = store
                .load_ratings(&args.table, &args.input)
                .await
                .with_context(|| format!("load {}", args.input.display()))?;
            println!("loaded {rows} ratings into {}", args.table);
        }
        Command::RangePartition(args) => {
            let summary = store
                .range_partition(&args.table, args.partitions)
                .await
                .context("range partition")?;
            println!(
                "range partitions of {}: {:?}",
                args.table, summary.row_counts
            );
        }
        Command::RoundRobinPartition(args) => {
            let summary = store
                .round_robin_partition(&args.table, args.partitions)
                .await
                .context("round-robin partition")?;
            println!(
                "round-robin partitions of {}: {:?}",
                args.table, summary.row_counts
            );
        }
        Command::RangeInsert(args) => {
            let routed = store
                .range_insert(&args.table, RatingRow::new(args.user, args.item, args.rating))
                .await
                .context("range insert")?;
            println!("inserted into {}", routed.table);
        }
        Command::RoundRobinInsert(args) => {
            let routed = store
                .round_robin_insert(&args.table, RatingRow::new(args.user, args.item, args.rating))
                .await
                .context("round-robin insert")?;
            println!("inserted into {}", routed.table);
        }
        Command::CountPartitions(args) => {
            let count = store
                .count_partitions(&args.prefix)
                .await
                .context("count partitions")?;
            println!("{count}");
        }
        Command::Verify(args) => {
            let report = store
                .verify_partitions(&args.table, args.scheme)
                .await
                .context("verify partitions")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} partitions of {}: base={} partitions={:?}",
                    args.scheme, args.table, report.base_rows, report.partition_rows
                );
                for violation in &report.violations {
                    println!("  violation: {violation:?}");
                }
            }
            if !report.is_sound() {
                return Err(anyhow!(
                    "{} partitions of {} failed verification",
                    args.scheme,
                    args.table
                ));
            }
        }
        Command::DeletePartitions(args) => {
            let dropped = store
                .delete_partitions(args.scheme)
                .await
                .context("delete partitions")?;
            info!("dropped {dropped} {} partition tables", args.scheme);
            println!("dropped {dropped}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_partition_flags() {
        let cli = Cli::parse_from([
            "xtask",
            "range-partition",
            "--table",
            "movie_ratings",
            "--partitions",
            "5",
        ]);
        assert_eq!(cli.data_dir, PathBuf::from(".ratings"));
        match cli.command {
            Command::RangePartition(args) => {
                assert_eq!(args.table, "movie_ratings");
                assert_eq!(args.partitions, 5);
            }
            _ => panic!("expected range-partition command"),
        }
    }

    #[test]
    fn cli_passes_negative_counts_through_for_validation() {
        let cli = Cli::parse_from(["xtask", "round-robin-partition", "--partitions", "-2"]);
        match cli.command {
            Command::RoundRobinPartition(args) => assert_eq!(args.partitions, -2),
            _ => panic!("expected round-robin-partition command"),
        }
    }

    #[test]
    fn cli_parses_insert_and_scheme() {
        let cli = Cli::parse_from([
            "xtask",
            "--data-dir",
            "/tmp/ratings",
            "round-robin-insert",
            "--user",
            "1",
            "--item",
            "42",
            "--rating",
            "3.5",
        ]);
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/ratings"));
        match cli.command {
            Command::RoundRobinInsert(args) => {
                assert_eq!(args.table, "ratings");
                assert_eq!((args.user, args.item), (1, 42));
                assert_eq!(args.rating, 3.5);
            }
            _ => panic!("expected round-robin-insert command"),
        }

        let cli = Cli::parse_from(["xtask", "verify", "--scheme", "round_robin"]);
        match cli.command {
            Command::Verify(args) => {
                assert_eq!(args.scheme, PartitionScheme::RoundRobin);
                assert!(!args.json);
            }
            _ => panic!("expected verify command"),
        }
    }

    #[tokio::test]
    async fn run_loads_partitions_and_verifies() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("ratings.dat");
        std::fs::write(&input, "1::10::1.0::0\n2::11::2.5::0\n3::12::5.0::0\n")?;
        let store = open_store(dir.path()).await?;

        run(
            &store,
            Command::Load(LoadArgs {
                table: "ratings".to_string(),
                input,
            }),
        )
        .await?;
        run(
            &store,
            Command::RangePartition(PartitionArgs {
                table: "ratings".to_string(),
                partitions: 2,
            }),
        )
        .await?;
        run(
            &store,
            Command::RangeInsert(InsertArgs {
                table: "ratings".to_string(),
                user: 4,
                item: 13,
                rating: 2.5,
            }),
        )
        .await?;
        run(
            &store,
            Command::Verify(VerifyArgs {
                table: "ratings".to_string(),
                scheme: PartitionScheme::Range,
                json: false,
            }),
        )
        .await?;
        assert_eq!(store.partition_sizes(PartitionScheme::Range).await?, vec![3, 1]);

        let err = run(
            &store,
            Command::RoundRobinPartition(PartitionArgs {
                table: "ratings".to_string(),
                partitions: 0,
            }),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("round-robin partition"));
        Ok(())
    }
}
