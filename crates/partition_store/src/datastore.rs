use std::path::{Path, PathBuf};

use crate::config::DEFAULT_SQLITE_NAME;
use crate::{PartitionResult, RatingsStore, StoreConfig};

/// Sqlite file used when `ratings.json` names no path.
pub fn default_sqlite_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DEFAULT_SQLITE_NAME)
}

pub fn load_or_init_config(data_dir: &Path) -> PartitionResult<StoreConfig> {
    StoreConfig::load_or_init(data_dir, &default_sqlite_path(data_dir))
}

/// Loads (or seeds) the data directory config and connects, running migrations.
pub async fn open_store(data_dir: &Path) -> PartitionResult<RatingsStore> {
    let config = load_or_init_config(data_dir)?;
    RatingsStore::connect(&config, data_dir).await
}
