// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use alloc::collections::BTreeSet;

use sloio::{BlockIO, errors::BlockIOResult};
use tracing::trace;

use crate::core::{
    allocator::{FsAllocator, FsAllocatorError, FsAllocatorResult},
    utils::bitmap::BitmapOps,
};
use crate::fs::slofs::{meta::SloMeta, types::SloExtents};

/// Block allocator over the on-disk block bitmap.
///
/// The whole bitmap is kept in memory; changed bitmap blocks are tracked
/// and written back by [`SloAllocator::commit`].
#[derive(Debug, Clone)]
pub struct SloAllocator {
    bitmap: Vec<u8>,
    block_size: u32,
    block_count: u32,
    bitmap_start: u32,
    data_start: u32,
    free: u32,
    hint: u32,
    dirty: BTreeSet<u32>,
}

impl SloAllocator {
    /// Empty allocator for a freshly formatted volume: only metadata blocks are used.
    pub fn new(meta: &SloMeta) -> Self {
        let bytes = meta.layout.bitmap_blocks as usize * meta.block_size as usize;
        let mut alloc = Self {
            bitmap: vec![0u8; bytes],
            block_size: meta.block_size,
            block_count: meta.block_count,
            bitmap_start: meta.layout.bitmap_start,
            data_start: meta.layout.data_start,
            free: 0,
            hint: meta.layout.data_start,
            dirty: (0..meta.layout.bitmap_blocks).collect(),
        };
        alloc.reserve_metadata();
        alloc.free = alloc.count_free();
        alloc
    }

    /// Loads the bitmap of a mounted volume.
    pub fn load<IO: BlockIO + ?Sized>(io: &mut IO, meta: &SloMeta) -> BlockIOResult<Self> {
        let mut alloc = Self::new(meta);
        let offset = meta.block_offset(meta.layout.bitmap_start);
        io.read_at(offset, &mut alloc.bitmap)?;
        alloc.dirty.clear();
        alloc.reserve_metadata();
        alloc.free = alloc.count_free();
        Ok(alloc)
    }

    /// Metadata blocks and the padding bits past the last block are never free.
    fn reserve_metadata(&mut self) {
        self.bitmap.set_range(0, self.data_start as usize, true);
        let bits = self.bitmap.len() * 8;
        let tail = self.block_count as usize;
        self.bitmap.set_range(tail, bits.saturating_sub(tail), true);
    }

    fn count_free(&self) -> u32 {
        let used = self
            .bitmap
            .count_ones_in_range(self.data_start as usize, self.block_count as usize);
        (self.block_count - self.data_start).saturating_sub(used as u32)
    }

    #[inline]
    pub fn is_allocated(&self, block: u32) -> bool {
        self.bitmap.get_bit(block as usize)
    }

    #[inline]
    pub fn free_blocks(&self) -> u32 {
        self.free
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    fn mark(&mut self, block: u32, used: bool) {
        self.bitmap.set_bit(block as usize, used);
        if used {
            self.free -= 1;
        } else {
            self.free += 1;
        }
        self.dirty.insert(block / (self.block_size * 8));
    }

    fn find_free(&self, from: u32) -> Option<u32> {
        let limit = self.block_count as usize;
        let pick = |start: usize| self.bitmap.find_first_zero(start).filter(|&b| b < limit);
        pick(from as usize)
            .or_else(|| pick(self.data_start as usize))
            .map(|b| b as u32)
    }

    /// Adds `additional` blocks at the end of `extents`.
    ///
    /// The last run is extended in place while the following blocks are free,
    /// the rest comes from the first free runs after the allocation hint.
    /// On failure nothing stays allocated and `extents` is unchanged.
    pub fn grow(
        &mut self,
        extents: &mut SloExtents,
        additional: u64,
        max_runs: usize,
    ) -> FsAllocatorResult {
        if additional == 0 {
            return Ok(());
        }
        crate::ensure!(self.free as u64 >= additional, FsAllocatorError::OutOfSpace);

        let before = extents.block_count();
        let mut remaining = additional;

        if let Some(last) = extents.last() {
            let mut next = last.end();
            while remaining > 0 && next < self.block_count && !self.is_allocated(next) {
                self.mark(next, true);
                extents.push_run(next, 1);
                next += 1;
                remaining -= 1;
            }
        }

        let mut cursor = self.hint;
        while remaining > 0 {
            let Some(start) = self.find_free(cursor) else {
                break;
            };
            let mut len = 0u32;
            while remaining > 0
                && start + len < self.block_count
                && !self.is_allocated(start + len)
            {
                self.mark(start + len, true);
                len += 1;
                remaining -= 1;
            }
            extents.push_run(start, len);
            cursor = start + len;

            if extents.len() > max_runs {
                self.rollback(extents, before);
                return Err(FsAllocatorError::TooFragmented);
            }
        }

        if remaining > 0 {
            self.rollback(extents, before);
            return Err(FsAllocatorError::OutOfSpace);
        }

        self.hint = cursor;
        trace!(additional, runs = extents.len(), free = self.free, "blocks allocated");
        Ok(())
    }

    fn rollback(&mut self, extents: &mut SloExtents, keep: u64) {
        let tail = extents.split_off_blocks(keep);
        for block in tail.blocks() {
            self.mark(block, false);
        }
    }

    /// Writes every changed bitmap block back to the store.
    pub fn commit<IO: BlockIO + ?Sized>(&mut self, io: &mut IO) -> BlockIOResult {
        let bs = self.block_size as usize;
        while let Some(idx) = self.dirty.pop_first() {
            let from = idx as usize * bs;
            let offset = (self.bitmap_start + idx) as u64 * bs as u64;
            if let Err(e) = io.write_at(offset, &self.bitmap[from..from + bs]) {
                self.dirty.insert(idx);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Raw bitmap bytes, for the checker.
    pub fn bitmap(&self) -> &[u8] {
        &self.bitmap
    }
}

impl FsAllocator<SloExtents> for SloAllocator {
    fn allocate(&mut self, count: usize) -> FsAllocatorResult<SloExtents> {
        let mut extents = SloExtents::new();
        self.grow(&mut extents, count as u64, usize::MAX)?;
        Ok(extents)
    }

    fn release(&mut self, handle: &SloExtents) -> FsAllocatorResult {
        for block in handle.blocks() {
            if block < self.data_start || block >= self.block_count || !self.is_allocated(block) {
                return Err(FsAllocatorError::DoubleFree(block));
            }
        }
        for block in handle.blocks() {
            self.mark(block, false);
        }
        trace!(released = handle.block_count(), free = self.free, "blocks released");
        Ok(())
    }

    fn used_units(&self) -> usize {
        (self.block_count - self.free) as usize
    }

    fn remaining_units(&self) -> usize {
        self.free as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::slofs::types::SloExtent;

    fn meta() -> SloMeta {
        // 256 blocks of 512 bytes, 16 records: data starts at block 10.
        SloMeta::new_custom(256 * 512, None, Some([0; 16]), 512, Some(16))
    }

    #[test]
    fn test_fresh_allocator() {
        let m = meta();
        let alloc = SloAllocator::new(&m);
        assert_eq!(m.layout.data_start, 10);
        assert_eq!(alloc.free_blocks(), 246);
        assert!(alloc.is_allocated(9));
        assert!(!alloc.is_allocated(10));
        assert!(alloc.is_dirty());
    }

    #[test]
    fn test_allocate_and_release() {
        let mut alloc = SloAllocator::new(&meta());
        let ext = alloc.allocate(5).unwrap();
        assert_eq!(ext.as_slice(), &[SloExtent::new(10, 5)]);
        assert_eq!(alloc.remaining_units(), 241);

        alloc.release(&ext).unwrap();
        assert_eq!(alloc.remaining_units(), 246);
        assert_eq!(alloc.release(&ext), Err(FsAllocatorError::DoubleFree(10)));
    }

    #[test]
    fn test_grow_extends_last_run() {
        let mut alloc = SloAllocator::new(&meta());
        let mut ext = alloc.allocate(2).unwrap();
        alloc.grow(&mut ext, 3, 8).unwrap();
        assert_eq!(ext.as_slice(), &[SloExtent::new(10, 5)]);
    }

    #[test]
    fn test_grow_appends_when_blocked() {
        let mut alloc = SloAllocator::new(&meta());
        let mut a = alloc.allocate(2).unwrap();
        let b = alloc.allocate(1).unwrap();
        alloc.grow(&mut a, 2, 8).unwrap();
        assert_eq!(b.as_slice(), &[SloExtent::new(12, 1)]);
        assert_eq!(a.as_slice(), &[SloExtent::new(10, 2), SloExtent::new(13, 2)]);
    }

    #[test]
    fn test_out_of_space_leaves_state_unchanged() {
        let mut alloc = SloAllocator::new(&meta());
        let mut ext = alloc.allocate(10).unwrap();
        let before = ext.clone();
        assert_eq!(
            alloc.grow(&mut ext, 1000, 64),
            Err(FsAllocatorError::OutOfSpace)
        );
        assert_eq!(ext, before);
        assert_eq!(alloc.remaining_units(), 236);
    }

    #[test]
    fn test_too_fragmented_rolls_back() {
        let mut alloc = SloAllocator::new(&meta());
        // Checkerboard the data region.
        let mut keep = vec![];
        for _ in 0..20 {
            let used = alloc.allocate(1).unwrap();
            let hole = alloc.allocate(1).unwrap();
            keep.push(used);
            alloc.release(&hole).unwrap();
        }
        let free_before = alloc.free_blocks();
        let mut ext = SloExtents::new();
        // Holes are single blocks: 10 blocks would need 10 runs.
        alloc.hint = 10;
        assert_eq!(
            alloc.grow(&mut ext, 10, 4),
            Err(FsAllocatorError::TooFragmented)
        );
        assert!(ext.is_empty());
        assert_eq!(alloc.free_blocks(), free_before);
    }

    #[cfg(feature = "mem")]
    #[test]
    fn test_commit_and_load() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = sloio::prelude::MemBlockIO::new(&mut buf);

        let mut alloc = SloAllocator::new(&m);
        let ext = alloc.allocate(7).unwrap();
        alloc.commit(&mut io).unwrap();
        assert!(!alloc.is_dirty());

        let loaded = SloAllocator::load(&mut io, &m).unwrap();
        assert_eq!(loaded.free_blocks(), 239);
        assert!(ext.blocks().all(|b| loaded.is_allocated(b)));
        assert!(!loaded.is_allocated(17));
    }
}
