//! Partitioning of a record set into bounded, contiguous chunks.

use serde::Serialize;
use std::ops::Range;

use crate::error::UploadError;

/// A contiguous slice `start..start + len` of the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 0-based position in submission order.
    pub index: usize,
    pub start: usize,
    pub len: usize,
}

impl Chunk {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// 1-based number, as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Split `total` records into `ceil(total / size)` chunks of at most `size`.
///
/// Only the last chunk may be short. Zero records yield no chunks.
pub fn plan_chunks(total: usize, size: usize) -> Result<Vec<Chunk>, UploadError> {
    if size == 0 {
        return Err(UploadError::InvalidChunkSize);
    }

    Ok((0..total.div_ceil(size))
        .map(|index| {
            let start = index * size;
            Chunk {
                index,
                start,
                len: size.min(total - start),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_127_by_50() {
        let chunks = plan_chunks(127, 50).unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len).collect();
        assert_eq!(sizes, vec![50, 50, 27]);
        assert_eq!(chunks[2].range(), 100..127);
        assert_eq!(chunks[2].number(), 3);
    }

    #[test]
    fn test_chunks_partition_input() {
        for total in [0, 1, 9, 10, 11, 50, 99, 100, 101] {
            for size in [1, 3, 10, 50] {
                let chunks = plan_chunks(total, size).unwrap();
                assert_eq!(chunks.len(), total.div_ceil(size));

                let covered: Vec<usize> = chunks.iter().flat_map(|c| c.range()).collect();
                assert_eq!(covered, (0..total).collect::<Vec<_>>());
                assert!(chunks.iter().all(|c| c.len >= 1 && c.len <= size));
            }
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(plan_chunks(10, 0), Err(UploadError::InvalidChunkSize));
    }
}
