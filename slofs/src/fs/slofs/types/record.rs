// SPDX-License-Identifier: MIT
//! Metadata records (one per fileno)

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use core::ops::Deref;

use time::OffsetDateTime;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::core::utils::time_utils::{datetime_from_parts, datetime_to_parts};
use crate::core::{FsError, FsResult, FsTableError, FsTableResult};
use crate::fs::slofs::{constant::*, types::extent::*};

/// On-disk record (256 bytes).
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
pub struct SloRawRecord {
    // 0x00
    /// 0 free, 1 file, 2 directory
    pub r_kind: u8,
    /// Reserved, zero
    pub r_flags: u8,
    /// Total extents, inline and overflow
    pub r_extent_count: u16,
    pub r_fileno: u32,
    /// Containing directory (root: itself)
    pub r_parent: u32,
    /// Block holding extents past the inline ones, 0 if none
    pub r_overflow: u32,
    // 0x10
    pub r_length: u64,
    // 0x18
    pub r_ctime: i64,
    pub r_ctime_nsec: u32,
    pub r_mtime: i64,
    pub r_mtime_nsec: u32,
    // 0x30
    /// Bumped each time the slot is reused
    pub r_generation: u32,
    pub r_reserved: [u8; 12],
    // 0x40
    pub r_extents: [SloExtent; SLO_INLINE_EXTENTS],
}

const _: () = assert!(core::mem::size_of::<SloRawRecord>() == SLO_RECORD_SIZE);

/// Closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SloNodeKind {
    File,
    Dir,
}

impl SloNodeKind {
    pub fn to_raw(self) -> u8 {
        match self {
            SloNodeKind::File => SLO_KIND_FILE,
            SloNodeKind::Dir => SLO_KIND_DIR,
        }
    }

    /// `None` for a free slot or an unknown kind byte.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            SLO_KIND_FILE => Some(SloNodeKind::File),
            SLO_KIND_DIR => Some(SloNodeKind::Dir),
            _ => None,
        }
    }
}

/// In-memory view of a live record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloRecord {
    pub fileno: u32,
    pub kind: SloNodeKind,
    pub parent: u32,
    pub length: u64,
    pub ctime: OffsetDateTime,
    pub mtime: OffsetDateTime,
    pub generation: u32,
    pub extents: SloExtents,
    pub overflow: u32,
}

impl SloRecord {
    pub fn new(
        fileno: u32,
        kind: SloNodeKind,
        parent: u32,
        generation: u32,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            fileno,
            kind,
            parent,
            length: 0,
            ctime: now,
            mtime: now,
            generation,
            extents: SloExtents::new(),
            overflow: 0,
        }
    }

    /// Marks a content change; `mtime` never moves before `ctime` or backwards.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.mtime = now.max(self.mtime).max(self.ctime);
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == SloNodeKind::Dir
    }

    /// Narrows to a directory, failing with `NotADirectory` for files.
    pub fn into_dir(self) -> FsResult<DirRecord> {
        match self.kind {
            SloNodeKind::Dir => Ok(DirRecord(self)),
            SloNodeKind::File => Err(FsError::NotADirectory),
        }
    }

    /// Extents stored past the inline array.
    pub fn spilled_extents(&self) -> &[SloExtent] {
        let runs = self.extents.as_slice();
        if runs.len() > SLO_INLINE_EXTENTS {
            &runs[SLO_INLINE_EXTENTS..]
        } else {
            &[]
        }
    }

    pub fn to_raw(&self) -> SloRawRecord {
        let runs = self.extents.as_slice();
        let mut inline = [SloExtent::default(); SLO_INLINE_EXTENTS];
        for (slot, run) in inline.iter_mut().zip(runs) {
            *slot = *run;
        }

        let (ctime, ctime_nsec) = datetime_to_parts(self.ctime);
        let (mtime, mtime_nsec) = datetime_to_parts(self.mtime);

        let mut raw = SloRawRecord::new_zeroed();
        raw.r_kind = self.kind.to_raw();
        raw.r_extent_count = runs.len() as u16;
        raw.r_fileno = self.fileno;
        raw.r_parent = self.parent;
        raw.r_overflow = self.overflow;
        raw.r_length = self.length;
        raw.r_ctime = ctime;
        raw.r_ctime_nsec = ctime_nsec;
        raw.r_mtime = mtime;
        raw.r_mtime_nsec = mtime_nsec;
        raw.r_generation = self.generation;
        raw.r_extents = inline;
        raw
    }

    /// Rebuilds a record from its raw form and the extents read from its
    /// overflow block (empty if it has none).
    pub fn from_raw(raw: &SloRawRecord, spilled: &[SloExtent]) -> FsTableResult<Self> {
        let kind = SloNodeKind::from_raw(raw.r_kind).ok_or(FsTableError::Corrupted)?;
        let count = raw.r_extent_count as usize;
        let inline = raw.r_extents;

        let inline_count = count.min(SLO_INLINE_EXTENTS);
        let spilled_count = count - inline_count;
        crate::ensure!(spilled.len() >= spilled_count, FsTableError::Corrupted);

        let mut runs: Vec<SloExtent> = Vec::with_capacity(count);
        runs.extend_from_slice(&inline[..inline_count]);
        runs.extend_from_slice(&spilled[..spilled_count]);
        crate::ensure!(runs.iter().all(|r| !r.is_empty()), FsTableError::Corrupted);

        Ok(Self {
            fileno: raw.r_fileno,
            kind,
            parent: raw.r_parent,
            length: raw.r_length,
            ctime: datetime_from_parts(raw.r_ctime, raw.r_ctime_nsec),
            mtime: datetime_from_parts(raw.r_mtime, raw.r_mtime_nsec),
            generation: raw.r_generation,
            extents: SloExtents::from_runs(runs),
            overflow: raw.r_overflow,
        })
    }
}

/// A record statically known to be a directory.
///
/// Entry encode/decode only accepts this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord(SloRecord);

impl DirRecord {
    #[inline]
    pub fn fileno(&self) -> u32 {
        self.0.fileno
    }

    #[inline]
    pub fn record_mut(&mut self) -> &mut SloRecord {
        &mut self.0
    }

    #[inline]
    pub fn into_inner(self) -> SloRecord {
        self.0
    }
}

impl Deref for DirRecord {
    type Target = SloRecord;

    fn deref(&self) -> &SloRecord {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::time_utils::now_utc;

    #[test]
    fn test_raw_round_trip_with_spill() {
        let now = now_utc();
        let mut rec = SloRecord::new(7, SloNodeKind::File, 1, 3, now);
        for i in 0..30u32 {
            rec.extents.push_run(100 + i * 2, 1);
        }
        rec.length = 30 * 512;
        rec.overflow = 99;

        let raw = rec.to_raw();
        assert_eq!({ raw.r_extent_count }, 30);

        let back = SloRecord::from_raw(&raw, rec.spilled_extents()).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn test_free_slot_is_not_a_record() {
        let raw = SloRawRecord::new_zeroed();
        assert_eq!(
            SloRecord::from_raw(&raw, &[]),
            Err(FsTableError::Corrupted)
        );
    }

    #[test]
    fn test_missing_spill_is_corrupted() {
        let mut rec = SloRecord::new(2, SloNodeKind::File, 1, 1, now_utc());
        for i in 0..26u32 {
            rec.extents.push_run(10 + i * 3, 1);
        }
        let raw = rec.to_raw();
        assert_eq!(SloRecord::from_raw(&raw, &[]), Err(FsTableError::Corrupted));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let now = now_utc();
        let mut rec = SloRecord::new(2, SloNodeKind::File, 1, 1, now);
        rec.touch(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(rec.mtime, now);
        assert!(rec.ctime <= rec.mtime);
    }

    #[test]
    fn test_into_dir() {
        let now = now_utc();
        let file = SloRecord::new(2, SloNodeKind::File, 1, 1, now);
        assert_eq!(file.into_dir().unwrap_err(), FsError::NotADirectory);

        let dir = SloRecord::new(3, SloNodeKind::Dir, 1, 1, now);
        assert_eq!(dir.into_dir().unwrap().fileno(), 3);
    }
}
