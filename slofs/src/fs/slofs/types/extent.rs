// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::core::allocator::FsHandle;

/// One contiguous run of blocks (8 bytes on disk).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SloExtent {
    /// First block of the run
    pub start: u32,
    /// Number of blocks
    pub len: u32,
}

impl SloExtent {
    pub const fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    /// First block past the run.
    #[inline]
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Ordered extents of one record, addressed as a single logical byte range.
///
/// Logical block `n` of the record is found by walking the runs in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SloExtents {
    runs: Vec<SloExtent>,
}

impl FsHandle for SloExtents {}

impl SloExtents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from raw runs, dropping empty ones and merging neighbours.
    pub fn from_runs(runs: impl IntoIterator<Item = SloExtent>) -> Self {
        let mut out = Self::new();
        for run in runs {
            out.push_run(run.start, run.len);
        }
        out
    }

    pub fn single(start: u32, len: u32) -> Self {
        Self::from_runs([SloExtent::new(start, len)])
    }

    #[inline]
    pub fn as_slice(&self) -> &[SloExtent] {
        &self.runs
    }

    /// Number of runs.
    #[inline]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    #[inline]
    pub fn last(&self) -> Option<SloExtent> {
        self.runs.last().copied()
    }

    /// Total number of blocks covered.
    pub fn block_count(&self) -> u64 {
        self.runs.iter().map(|r| r.len as u64).sum()
    }

    /// Appends `len` blocks at `start`, extending the last run when contiguous.
    pub fn push_run(&mut self, start: u32, len: u32) {
        if len == 0 {
            return;
        }
        if let Some(last) = self.runs.last_mut()
            && last.end() == start
        {
            last.len += len;
            return;
        }
        self.runs.push(SloExtent::new(start, len));
    }

    /// Physical block of logical block `index`.
    pub fn block_at(&self, index: u64) -> Option<u32> {
        let mut base = 0u64;
        for run in &self.runs {
            if index < base + run.len as u64 {
                return Some(run.start + (index - base) as u32);
            }
            base += run.len as u64;
        }
        None
    }

    /// Keeps the first `keep` blocks and returns the detached tail.
    pub fn split_off_blocks(&mut self, keep: u64) -> SloExtents {
        let mut base = 0u64;
        for idx in 0..self.runs.len() {
            let run_len = self.runs[idx].len as u64;
            if base + run_len <= keep {
                base += run_len;
                continue;
            }

            let kept = (keep - base) as u32;
            let mut rest = self.runs.split_off(idx);
            if kept > 0 {
                self.runs.push(SloExtent::new(rest[0].start, kept));
                rest[0].start += kept;
                rest[0].len -= kept;
            }
            return SloExtents { runs: rest };
        }
        SloExtents::new()
    }

    /// Iterates every physical block, in logical order.
    pub fn blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.runs.iter().flat_map(|r| r.start..r.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_run_merges_contiguous() {
        let mut ext = SloExtents::new();
        ext.push_run(10, 2);
        ext.push_run(12, 3);
        ext.push_run(20, 1);
        ext.push_run(30, 0);
        assert_eq!(ext.as_slice(), &[SloExtent::new(10, 5), SloExtent::new(20, 1)]);
        assert_eq!(ext.block_count(), 6);
    }

    #[test]
    fn test_block_at() {
        let ext = SloExtents::from_runs([SloExtent::new(10, 2), SloExtent::new(40, 3)]);
        assert_eq!(ext.block_at(0), Some(10));
        assert_eq!(ext.block_at(1), Some(11));
        assert_eq!(ext.block_at(2), Some(40));
        assert_eq!(ext.block_at(4), Some(42));
        assert_eq!(ext.block_at(5), None);
    }

    #[test]
    fn test_split_off_inside_run() {
        let mut ext = SloExtents::from_runs([SloExtent::new(10, 4), SloExtent::new(40, 3)]);
        let tail = ext.split_off_blocks(2);
        assert_eq!(ext.as_slice(), &[SloExtent::new(10, 2)]);
        assert_eq!(tail.as_slice(), &[SloExtent::new(12, 2), SloExtent::new(40, 3)]);
    }

    #[test]
    fn test_split_off_on_boundary_and_ends() {
        let mut ext = SloExtents::from_runs([SloExtent::new(10, 4), SloExtent::new(40, 3)]);
        let tail = ext.split_off_blocks(4);
        assert_eq!(ext.as_slice(), &[SloExtent::new(10, 4)]);
        assert_eq!(tail.as_slice(), &[SloExtent::new(40, 3)]);

        let none = ext.split_off_blocks(10);
        assert!(none.is_empty());

        let all = ext.split_off_blocks(0);
        assert!(ext.is_empty());
        assert_eq!(all.block_count(), 4);
    }

    #[test]
    fn test_blocks_iter() {
        let ext = SloExtents::from_runs([SloExtent::new(3, 2), SloExtent::new(9, 1)]);
        let blocks: Vec<u32> = ext.blocks().collect();
        assert_eq!(blocks, [3, 4, 9]);
    }
}
