pub mod api;
pub mod error;
pub mod range;
pub mod rating;
pub mod round_robin;
pub mod scheme;

pub use api::*;
pub use error::{PartitionError, PartitionResult};
pub use range::{RangeBounds, RangeLayout};
pub use rating::{MAX_RATING, MIN_RATING, RatingRow, validate_rating};
pub use round_robin::RoundRobinCursor;
pub use scheme::*;
