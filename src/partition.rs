//! 1-D row partitioning of A across ranks.
//!
//! Every rank computes the plan for itself from the broadcast row count and
//! the communicator size. The plan is never sent over the wire.

use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("cannot partition rows across zero processes")]
    NoProcesses,
}

/// Row counts and offsets per rank, in rank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

/// Split `total_rows` across `process_count` ranks as evenly as integer
/// division allows. The first `total_rows % process_count` ranks take one
/// extra row each.
pub fn plan(total_rows: usize, process_count: usize) -> Result<PartitionPlan, PartitionError> {
    if process_count == 0 {
        return Err(PartitionError::NoProcesses);
    }

    let block = total_rows / process_count;
    let extra = total_rows % process_count;

    let counts: Vec<usize> = (0..process_count)
        .map(|rank| if rank < extra { block + 1 } else { block })
        .collect();
    let offsets = counts
        .iter()
        .scan(0, |next, &count| {
            let offset = *next;
            *next += count;
            Some(offset)
        })
        .collect();

    Ok(PartitionPlan { counts, offsets })
}

impl PartitionPlan {
    pub fn process_count(&self) -> usize {
        self.counts.len()
    }

    pub fn total_rows(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn count(&self, rank: usize) -> usize {
        self.counts[rank]
    }

    pub fn offset(&self, rank: usize) -> usize {
        self.offsets[rank]
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Rows owned by `rank`.
    pub fn rows(&self, rank: usize) -> Range<usize> {
        let start = self.offsets[rank];
        start..start + self.counts[rank]
    }

    /// Per-rank element counts for a row-major buffer `width` columns wide.
    pub fn element_counts(&self, width: usize) -> Vec<usize> {
        self.counts.iter().map(|c| c * width).collect()
    }

    /// Per-rank element displacements for a row-major buffer `width` columns wide.
    pub fn element_offsets(&self, width: usize) -> Vec<usize> {
        self.offsets.iter().map(|o| o * width).collect()
    }
}
