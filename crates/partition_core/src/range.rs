use serde::{Deserialize, Serialize};

use crate::rating::{validate_rating, MAX_RATING, MIN_RATING};
use crate::{PartitionCount, PartitionResult};

/// Interval covered by one range partition.
///
/// Partition 0 is closed on both ends (`[0, delta]`); every other partition is
/// `(lower, upper]`. Adjacent partitions share the exact same boundary value,
/// so a rating equal to a boundary belongs to the lower partition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub lower: f64,
    pub upper: f64,
    pub lower_inclusive: bool,
}

impl RangeBounds {
    pub fn contains(&self, rating: f64) -> bool {
        let above_lower = if self.lower_inclusive {
            rating >= self.lower
        } else {
            rating > self.lower
        };
        above_lower && rating <= self.upper
    }
}

/// Equal-width split of `[0, 5]` into N buckets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeLayout {
    count: PartitionCount,
    delta: f64,
}

impl RangeLayout {
    pub fn new(count: PartitionCount) -> Self {
        Self {
            count,
            delta: (MAX_RATING - MIN_RATING) / count.get() as f64,
        }
    }

    pub fn count(&self) -> PartitionCount {
        self.count
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    fn boundary(&self, index: usize) -> f64 {
        if index >= self.count.get() {
            MAX_RATING
        } else {
            MIN_RATING + index as f64 * self.delta
        }
    }

    pub fn bounds(&self, index: usize) -> RangeBounds {
        RangeBounds {
            lower: self.boundary(index),
            upper: self.boundary(index + 1),
            lower_inclusive: index == 0,
        }
    }

    pub fn all_bounds(&self) -> Vec<RangeBounds> {
        (0..self.count.get()).map(|index| self.bounds(index)).collect()
    }

    /// Partition index for `rating`.
    ///
    /// Starts from `floor(rating / delta)` and settles against
    /// [`RangeLayout::bounds`], so an exact multiple of delta moves down one
    /// partition and floating point drift can never disagree with the bulk
    /// partitioner's interval predicates.
    pub fn index_for(&self, rating: f64) -> PartitionResult<usize> {
        let rating = validate_rating(rating)?;
        let last = self.count.get() - 1;
        let mut index = ((rating - MIN_RATING) / self.delta).floor() as usize;
        index = index.min(last);
        while index > 0 && rating <= self.boundary(index) {
            index -= 1;
        }
        while index < last && rating > self.boundary(index + 1) {
            index += 1;
        }
        Ok(index)
    }

    /// Expected size of each partition for the given ratings.
    pub fn expected_counts<I>(&self, ratings: I) -> PartitionResult<Vec<u64>>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut counts = vec![0u64; self.count.get()];
        for rating in ratings {
            counts[self.index_for(rating)?] += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PartitionError;

    fn layout(n: i64) -> RangeLayout {
        RangeLayout::new(PartitionCount::new(n).unwrap())
    }

    #[test]
    fn first_partition_is_closed_and_rest_half_open() {
        let layout = layout(2);
        let first = layout.bounds(0);
        assert_eq!((first.lower, first.upper), (0.0, 2.5));
        assert!(first.lower_inclusive);
        let second = layout.bounds(1);
        assert_eq!((second.lower, second.upper), (2.5, 5.0));
        assert!(!second.lower_inclusive);
        assert!(first.contains(0.0));
        assert!(first.contains(2.5));
        assert!(!second.contains(2.5));
        assert!(second.contains(5.0));
    }

    #[test]
    fn boundary_ties_go_to_lower_partition() {
        for n in 1..=12 {
            let layout = layout(n);
            assert_eq!(layout.index_for(0.0).unwrap(), 0);
            assert_eq!(layout.index_for(5.0).unwrap(), n as usize - 1);
            for i in 1..n as usize {
                let tie = i as f64 * layout.delta();
                assert_eq!(layout.index_for(tie).unwrap(), i - 1, "n={n} i={i}");
            }
        }
    }

    #[test]
    fn index_agrees_with_bounds_everywhere() {
        for n in 1..=9 {
            let layout = layout(n);
            let bounds = layout.all_bounds();
            for step in 0..=500 {
                let rating = step as f64 / 100.0;
                let index = layout.index_for(rating).unwrap();
                let matching: Vec<usize> = bounds
                    .iter()
                    .enumerate()
                    .filter(|(_, b)| b.contains(rating))
                    .map(|(i, _)| i)
                    .collect();
                assert_eq!(matching, vec![index], "n={n} rating={rating}");
            }
        }
    }

    #[test]
    fn last_upper_bound_is_exactly_max() {
        for n in 1..=20 {
            let layout = layout(n);
            assert_eq!(layout.bounds(n as usize - 1).upper, MAX_RATING);
        }
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let err = layout(3).index_for(5.5).unwrap_err();
        assert!(matches!(err, PartitionError::OutOfRangeRating { .. }));
    }

    #[test]
    fn expected_counts_follow_example_dataset() {
        let counts = layout(2).expected_counts([1.0, 2.5, 5.0]).unwrap();
        assert_eq!(counts, vec![2, 1]);
    }
}
