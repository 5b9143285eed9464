use serde::{Deserialize, Serialize};

use crate::{PartitionError, PartitionResult};

pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 5.0;

/// One (user, item, rating) triple. Duplicate (user, item) pairs are allowed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRow {
    pub user_id: i64,
    pub item_id: i64,
    pub rating: f64,
}

impl RatingRow {
    pub fn new(user_id: i64, item_id: i64, rating: f64) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }

    pub fn validated(self) -> PartitionResult<Self> {
        validate_rating(self.rating)?;
        Ok(self)
    }
}

pub fn validate_rating(rating: f64) -> PartitionResult<f64> {
    if rating.is_finite() && (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(PartitionError::out_of_range(rating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_closed_interval_bounds() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(5.0).is_ok());
        assert!(validate_rating(2.5).is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        for rating in [-0.5, 5.01, f64::NAN, f64::INFINITY] {
            let err = validate_rating(rating).unwrap_err();
            assert!(matches!(err, PartitionError::OutOfRangeRating { .. }));
        }
        assert!(RatingRow::new(1, 2, 6.0).validated().is_err());
    }
}
