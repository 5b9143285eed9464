use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ratings_partition_core::{PartitionError, PartitionResult};

const DEFAULT_CONFIG_NAME: &str = "ratings.json";
pub(crate) const DEFAULT_SQLITE_NAME: &str = "ratings.sqlite";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

/// Layout of the delimited ratings source.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderConfig {
    pub delimiter: String,
    pub user_field: usize,
    pub item_field: usize,
    pub rating_field: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: "::".to_string(),
            user_field: 0,
            item_field: 1,
            rating_field: 2,
        }
    }
}

impl LoaderConfig {
    pub fn min_fields(&self) -> usize {
        self.user_field.max(self.item_field).max(self.rating_field) + 1
    }

    pub fn validate(&self) -> PartitionResult<()> {
        if self.delimiter.is_empty() {
            return Err(PartitionError::invalid("loader delimiter must not be empty"));
        }
        let fields = [self.user_field, self.item_field, self.rating_field];
        if fields[0] == fields[1] || fields[0] == fields[2] || fields[1] == fields[2] {
            return Err(PartitionError::invalid(
                "loader field positions must be distinct",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_insert_batch: Option<usize>,
}

impl LimitsConfig {
    pub const DEFAULT_INSERT_BATCH: usize = 5_000;

    pub fn with_defaults() -> Self {
        Self {
            max_insert_batch: Some(Self::DEFAULT_INSERT_BATCH),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    #[serde(default)]
    pub loader: LoaderConfig,
    pub limits: Option<LimitsConfig>,
}

impl DatabaseConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Postgres { .. } => "postgres",
            Self::Mysql { .. } => "mysql",
        }
    }
}

impl StoreConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            loader: LoaderConfig::default(),
            limits: Some(LimitsConfig::with_defaults()),
        }
    }

    /// Reads `ratings.json` from `base_dir`, writing a sqlite default on first use.
    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> PartitionResult<Self> {
        fs::create_dir_all(base_dir).map_err(|err| {
            PartitionError::storage(format!("create {}: {err}", base_dir.display()))
        })?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        let config = if config_path.exists() {
            Self::read_from(&config_path)?
        } else {
            let fresh = Self::default_sqlite(default_sqlite_path.to_string_lossy());
            fresh.write_to(&config_path)?;
            fresh
        };
        config.loader.validate()?;
        Ok(config)
    }

    fn read_from(path: &Path) -> PartitionResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            PartitionError::storage(format!("read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|err| {
            PartitionError::invalid(format!("parse {}: {err}", path.display()))
        })
    }

    fn write_to(&self, path: &Path) -> PartitionResult<()> {
        let payload = serde_json::to_string_pretty(self)
            .map_err(|err| PartitionError::storage(format!("encode config: {err}")))?;
        fs::write(path, payload).map_err(|err| {
            PartitionError::storage(format!("write {}: {err}", path.display()))
        })
    }

    /// Sqlite file location; relative paths resolve against `base_dir`.
    pub fn sqlite_path(&self, base_dir: &Path) -> PartitionResult<PathBuf> {
        let DatabaseConfig::Sqlite { path } = &self.database else {
            return Err(PartitionError::invalid(format!(
                "{} backend has no sqlite file",
                self.backend_name()
            )));
        };
        let file = Path::new(path.as_deref().unwrap_or(DEFAULT_SQLITE_NAME));
        Ok(if file.is_absolute() {
            file.to_path_buf()
        } else {
            base_dir.join(file)
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.database.name()
    }

    pub fn connection_url(&self) -> Option<&str> {
        match &self.database {
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Some(url.as_str()),
            DatabaseConfig::Sqlite { .. } => None,
        }
    }

    pub fn insert_batch(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|limits| limits.max_insert_batch)
            .filter(|batch| *batch > 0)
            .unwrap_or(LimitsConfig::DEFAULT_INSERT_BATCH)
    }
}
