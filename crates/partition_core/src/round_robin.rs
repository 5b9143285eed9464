use serde::{Deserialize, Serialize};

use crate::{PartitionCount, PartitionError, PartitionResult};

/// Residue modulo N of the 1-based read positions that land in partition
/// `index`. Row k (0-based) goes to partition `k mod N`.
pub fn position_residue(index: usize, count: PartitionCount) -> u64 {
    (index as u64 + 1) % count.get() as u64
}

/// Rows per partition after a fresh rebuild of `total` rows:
/// partition i holds `ceil((total - i) / N)`.
pub fn expected_counts(total: u64, count: PartitionCount) -> Vec<u64> {
    let n = count.get() as u64;
    (0..n)
        .map(|i| if total > i { (total - i).div_ceil(n) } else { 0 })
        .collect()
}

/// Next partition to receive a round-robin insert.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RoundRobinCursor {
    next: usize,
    count: PartitionCount,
}

impl RoundRobinCursor {
    pub fn start(count: PartitionCount) -> Self {
        Self { next: 0, count }
    }

    pub fn restore(next: i64, count: PartitionCount) -> PartitionResult<Self> {
        let next = usize::try_from(next)
            .ok()
            .filter(|next| *next < count.get())
            .ok_or_else(|| {
                PartitionError::storage(format!(
                    "round-robin cursor {next} outside 0..{}",
                    count.get()
                ))
            })?;
        Ok(Self { next, count })
    }

    pub fn next(&self) -> usize {
        self.next
    }

    pub fn count(&self) -> PartitionCount {
        self.count
    }

    /// Returns the partition to write to and moves the cursor on.
    pub fn advance(&mut self) -> usize {
        let target = self.next;
        self.next = (self.next + 1) % self.count.get();
        target
    }
}
