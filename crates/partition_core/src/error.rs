use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("invalid partition count: {count} (expected at least 1)")]
    InvalidPartitionCount { count: i64 },
    #[error("no {scheme} partitions exist; run a bulk partition first")]
    NoPartitionsExist { scheme: String },
    #[error("rating {rating} is outside [0, 5]")]
    OutOfRangeRating { rating: f64 },
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl PartitionError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn no_partitions(scheme: impl Into<String>) -> Self {
        Self::NoPartitionsExist {
            scheme: scheme.into(),
        }
    }

    pub fn out_of_range(rating: f64) -> Self {
        Self::OutOfRangeRating { rating }
    }

    pub fn invalid_count(count: i64) -> Self {
        Self::InvalidPartitionCount { count }
    }
}

pub type PartitionResult<T> = Result<T, PartitionError>;

impl From<sea_orm::DbErr> for PartitionError {
    fn from(value: sea_orm::DbErr) -> Self {
        PartitionError::storage(value.to_string())
    }
}
