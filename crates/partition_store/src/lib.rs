pub mod config;
pub mod datastore;
mod db;
pub mod loader;
pub mod migration;
pub mod store;

pub use config::{DatabaseConfig, LimitsConfig, LoaderConfig, PoolConfig, StoreConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store};
pub use loader::{RatingsReader, parse_line};
pub use ratings_partition_core::*;
pub use store::{BackendCapabilities, RatingsStore};
