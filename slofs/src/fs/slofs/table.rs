// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sloio::{BlockIO, BlockIOStructExt};
use time::OffsetDateTime;
use tracing::{debug, trace};
use zerocopy::{FromBytes, FromZeros, IntoBytes};

use crate::core::{
    FsTableError, FsTableResult, allocator::FsAllocator, utils::bitmap::BitmapOps,
};
use crate::fs::slofs::{allocator::SloAllocator, constant::*, meta::SloMeta, types::*};

/// Record table: fileno → record.
///
/// Records live in a fixed array after the block bitmap; fileno `n` is
/// slot `n - 1`. An in-memory occupancy map mirrors the kind bytes so
/// creation never scans the store.
#[derive(Debug, Clone)]
pub struct SloTable {
    meta: SloMeta,
    occupied: Vec<u8>,
    free: u32,
    hint: u32,
}

impl SloTable {
    /// Table with every slot free.
    pub fn new(meta: &SloMeta) -> Self {
        let count = meta.record_count as usize;
        let mut occupied = vec![0u8; count.div_ceil(8)];
        let bits = occupied.len() * 8;
        occupied.set_range(count, bits - count, true);

        Self {
            meta: meta.clone(),
            occupied,
            free: meta.record_count,
            hint: 0,
        }
    }

    /// Scans the record table of a formatted store.
    pub fn load<IO: BlockIO + ?Sized>(io: &mut IO, meta: &SloMeta) -> FsTableResult<Self> {
        let mut table = Self::new(meta);
        let bs = meta.block_size as usize;
        let per_block = bs / SLO_RECORD_SIZE;
        let mut block = vec![0u8; bs];

        for b in 0..meta.layout.table_blocks {
            io.read_at(meta.block_offset(meta.layout.table_start + b), &mut block)?;
            for i in 0..per_block {
                let slot = b as usize * per_block + i;
                if slot >= meta.record_count as usize {
                    break;
                }
                if block[i * SLO_RECORD_SIZE] != SLO_KIND_FREE {
                    table.occupied.set_bit(slot, true);
                    table.free -= 1;
                }
            }
        }

        debug!(
            records = meta.record_count,
            free = table.free,
            "record table loaded"
        );
        Ok(table)
    }

    #[inline]
    pub fn record_count(&self) -> u32 {
        self.meta.record_count
    }

    #[inline]
    pub fn free_records(&self) -> u32 {
        self.free
    }

    pub fn is_live(&self, fileno: u32) -> bool {
        fileno != 0 && fileno <= self.meta.record_count && self.occupied.get_bit(fileno as usize - 1)
    }

    /// Filenos of every occupied slot, ascending.
    pub fn live_filenos(&self) -> Vec<u32> {
        (1..=self.meta.record_count)
            .filter(|&f| self.is_live(f))
            .collect()
    }

    pub fn lookup<IO: BlockIO + ?Sized>(
        &self,
        io: &mut IO,
        fileno: u32,
    ) -> FsTableResult<SloRecord> {
        crate::ensure!(self.is_live(fileno), FsTableError::InvalidFileno(fileno));

        let raw: SloRawRecord = io.read_struct(self.meta.record_offset(fileno))?;
        crate::ensure!(raw.r_kind != SLO_KIND_FREE, FsTableError::InvalidFileno(fileno));
        crate::ensure!(raw.r_fileno == fileno, FsTableError::Corrupted);

        let count = raw.r_extent_count as usize;
        crate::ensure!(count <= self.meta.max_extents(), FsTableError::Corrupted);

        let spilled = if count > SLO_INLINE_EXTENTS {
            self.read_overflow(io, raw.r_overflow, count - SLO_INLINE_EXTENTS)?
        } else {
            Vec::new()
        };
        SloRecord::from_raw(&raw, &spilled)
    }

    fn read_overflow<IO: BlockIO + ?Sized>(
        &self,
        io: &mut IO,
        block: u32,
        count: usize,
    ) -> FsTableResult<Vec<SloExtent>> {
        crate::ensure!(
            block >= self.meta.layout.data_start && block < self.meta.block_count,
            FsTableError::Corrupted
        );
        let mut buf = vec![0u8; count * SLO_EXTENT_SIZE];
        io.read_at(self.meta.block_offset(block), &mut buf)?;

        buf.chunks_exact(SLO_EXTENT_SIZE)
            .map(|chunk| SloExtent::read_from_bytes(chunk).map_err(|_| FsTableError::Corrupted))
            .collect()
    }

    fn find_free_slot(&self) -> Option<u32> {
        let count = self.meta.record_count as usize;
        let pick = |start: usize| self.occupied.find_first_zero(start).filter(|&s| s < count);
        pick(self.hint as usize).or_else(|| pick(0)).map(|s| s as u32)
    }

    /// Creates a record in the first free slot.
    ///
    /// `parent = None` makes the record its own parent (root directory).
    pub fn create<IO: BlockIO + ?Sized>(
        &mut self,
        io: &mut IO,
        kind: SloNodeKind,
        parent: Option<u32>,
        now: OffsetDateTime,
    ) -> FsTableResult<SloRecord> {
        let slot = self.find_free_slot().ok_or(FsTableError::TableFull)?;
        let fileno = slot + 1;
        let offset = self.meta.record_offset(fileno);

        let previous: SloRawRecord = io.read_struct(offset)?;
        let generation = previous.r_generation.wrapping_add(1).max(1);

        let rec = SloRecord::new(fileno, kind, parent.unwrap_or(fileno), generation, now);
        io.write_struct(offset, &rec.to_raw())?;

        self.occupied.set_bit(slot as usize, true);
        self.free -= 1;
        self.hint = fileno;
        debug!(fileno, ?kind, parent = rec.parent, generation, "record created");
        Ok(rec)
    }

    /// Persists `rec`, moving extents past the inline array to an overflow
    /// block. The overflow block is written before the record and released
    /// only after the record no longer points to it.
    pub fn store<IO: BlockIO + ?Sized>(
        &mut self,
        io: &mut IO,
        alloc: &mut SloAllocator,
        rec: &mut SloRecord,
    ) -> FsTableResult {
        crate::ensure!(self.is_live(rec.fileno), FsTableError::InvalidFileno(rec.fileno));
        crate::ensure!(
            rec.extents.len() <= self.meta.max_extents(),
            FsTableError::Allocator(crate::core::FsAllocatorError::TooFragmented)
        );

        let mut released = None;
        if rec.extents.len() > SLO_INLINE_EXTENTS {
            if rec.overflow == 0 {
                let unit = alloc.allocate_unit()?;
                rec.overflow = unit.as_slice()[0].start;
                alloc.commit(io)?;
            }
            let mut block = vec![0u8; self.meta.block_size as usize];
            for (chunk, run) in block
                .chunks_exact_mut(SLO_EXTENT_SIZE)
                .zip(rec.spilled_extents())
            {
                chunk.copy_from_slice(run.as_bytes());
            }
            io.write_at(self.meta.block_offset(rec.overflow), &block)?;
        } else if rec.overflow != 0 {
            released = Some(rec.overflow);
            rec.overflow = 0;
        }

        io.write_struct(self.meta.record_offset(rec.fileno), &rec.to_raw())?;
        trace!(fileno = rec.fileno, length = rec.length, runs = rec.extents.len(), "record stored");

        if let Some(block) = released {
            alloc.release(&SloExtents::single(block, 1))?;
            alloc.commit(io)?;
        }
        Ok(())
    }

    /// Applies `f` to a record, stamps its mtime and persists it.
    pub fn update<IO, F>(
        &mut self,
        io: &mut IO,
        alloc: &mut SloAllocator,
        fileno: u32,
        now: OffsetDateTime,
        f: F,
    ) -> FsTableResult<SloRecord>
    where
        IO: BlockIO + ?Sized,
        F: FnOnce(&mut SloRecord),
    {
        let mut rec = self.lookup(io, fileno)?;
        f(&mut rec);
        rec.touch(now);
        self.store(io, alloc, &mut rec)?;
        Ok(rec)
    }

    /// Frees the slot, then the record's blocks.
    ///
    /// The caller removes every directory entry naming `rec` first.
    pub fn delete<IO: BlockIO + ?Sized>(
        &mut self,
        io: &mut IO,
        alloc: &mut SloAllocator,
        rec: &SloRecord,
    ) -> FsTableResult {
        crate::ensure!(self.is_live(rec.fileno), FsTableError::InvalidFileno(rec.fileno));

        let mut raw = SloRawRecord::new_zeroed();
        raw.r_generation = rec.generation;
        io.write_struct(self.meta.record_offset(rec.fileno), &raw)?;

        self.occupied.set_bit(rec.fileno as usize - 1, false);
        self.free += 1;

        alloc.release(&rec.extents)?;
        if rec.overflow != 0 {
            alloc.release(&SloExtents::single(rec.overflow, 1))?;
        }
        alloc.commit(io)?;
        debug!(fileno = rec.fileno, "record deleted");
        Ok(())
    }
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::core::utils::time_utils::now_utc;
    use sloio::prelude::MemBlockIO;

    fn meta() -> SloMeta {
        SloMeta::new_custom(256 * 512, None, Some([0; 16]), 512, Some(16))
    }

    #[test]
    fn test_create_lookup_delete() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = MemBlockIO::new(&mut buf);
        let mut alloc = SloAllocator::new(&m);
        let mut table = SloTable::new(&m);

        let root = table.create(&mut io, SloNodeKind::Dir, None, now_utc()).unwrap();
        assert_eq!(root.fileno, SLO_ROOT_FILENO);
        assert_eq!(root.parent, SLO_ROOT_FILENO);

        let mut file = table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();
        assert_eq!(file.fileno, 2);

        file.extents = alloc.allocate(3).unwrap();
        file.length = 1200;
        table.store(&mut io, &mut alloc, &mut file).unwrap();
        assert_eq!(table.lookup(&mut io, 2).unwrap(), file);

        table.delete(&mut io, &mut alloc, &file).unwrap();
        assert_eq!(
            table.lookup(&mut io, 2),
            Err(FsTableError::InvalidFileno(2))
        );
        assert_eq!(alloc.free_blocks(), m.data_blocks());

        // Reused slot gets a new generation.
        let again = table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();
        assert_eq!(again.fileno, 2);
        assert_eq!(again.generation, file.generation + 1);
    }

    #[test]
    fn test_update_applies_mutator_and_stamps_mtime() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = MemBlockIO::new(&mut buf);
        let mut alloc = SloAllocator::new(&m);
        let mut table = SloTable::new(&m);
        table.create(&mut io, SloNodeKind::Dir, None, now_utc()).unwrap();
        let file = table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();

        let later = file.ctime + time::Duration::seconds(5);
        let updated = table
            .update(&mut io, &mut alloc, file.fileno, later, |rec| rec.length = 42)
            .unwrap();
        assert_eq!(updated.length, 42);
        assert_eq!(updated.mtime, later);
        assert_eq!(table.lookup(&mut io, file.fileno).unwrap(), updated);

        // A clock that went backwards never moves mtime before ctime.
        let earlier = file.ctime - time::Duration::seconds(60);
        let again = table
            .update(&mut io, &mut alloc, file.fileno, earlier, |rec| rec.length += 1)
            .unwrap();
        assert_eq!(again.length, 43);
        assert!(again.mtime >= again.ctime);
        assert_eq!(again.mtime, later);

        assert_eq!(
            table
                .update(&mut io, &mut alloc, 9, later, |_| {})
                .unwrap_err(),
            FsTableError::InvalidFileno(9)
        );
    }

    #[test]
    fn test_table_full() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = MemBlockIO::new(&mut buf);
        let mut table = SloTable::new(&m);

        for _ in 0..16 {
            table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();
        }
        assert_eq!(table.free_records(), 0);
        assert_eq!(
            table.create(&mut io, SloNodeKind::File, Some(1), now_utc()),
            Err(FsTableError::TableFull)
        );
    }

    #[test]
    fn test_overflow_block_lifecycle() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = MemBlockIO::new(&mut buf);
        let mut alloc = SloAllocator::new(&m);
        let mut table = SloTable::new(&m);
        table.create(&mut io, SloNodeKind::Dir, None, now_utc()).unwrap();
        let mut rec = table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();

        // 30 single-block runs separated by holes.
        let mut holes = vec![];
        for _ in 0..30 {
            let used = alloc.allocate(1).unwrap();
            rec.extents.push_run(used.as_slice()[0].start, 1);
            holes.push(alloc.allocate(1).unwrap());
        }
        table.store(&mut io, &mut alloc, &mut rec).unwrap();
        assert_ne!(rec.overflow, 0);
        assert!(alloc.is_allocated(rec.overflow));

        let loaded = table.lookup(&mut io, rec.fileno).unwrap();
        assert_eq!(loaded.extents, rec.extents);

        // Shrinking back under the inline limit releases the overflow block.
        let overflow = rec.overflow;
        let tail = rec.extents.split_off_blocks(4);
        table.store(&mut io, &mut alloc, &mut rec).unwrap();
        alloc.release(&tail).unwrap();
        assert_eq!(rec.overflow, 0);
        assert!(!alloc.is_allocated(overflow));
    }

    #[test]
    fn test_load_rebuilds_occupancy() {
        let m = meta();
        let mut buf = vec![0u8; 256 * 512];
        let mut io = MemBlockIO::new(&mut buf);
        let mut table = SloTable::new(&m);
        for _ in 0..5 {
            table.create(&mut io, SloNodeKind::File, Some(1), now_utc()).unwrap();
        }

        let loaded = SloTable::load(&mut io, &m).unwrap();
        assert_eq!(loaded.free_records(), 11);
        assert_eq!(loaded.live_filenos(), [1, 2, 3, 4, 5]);
    }
}
