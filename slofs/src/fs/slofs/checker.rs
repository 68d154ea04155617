// SPDX-License-Identifier: MIT
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;
use alloc::collections::{BTreeMap, BTreeSet, VecDeque};

use sloio::prelude::*;

pub use crate::core::checker::*;

use crate::core::{FsError, FsTableError, utils::bitmap::BitmapOps};
use crate::fs::slofs::{
    allocator::SloAllocator, constant::*, meta::SloMeta, resolver::read_dir_table,
    table::SloTable, types::*,
};

#[derive(Clone, Debug)]
pub struct SloCheckOptions {
    pub phases: VerifyPhases,
    pub fail_fast: bool,
    /// Individual orphan findings before summarizing the rest
    pub orphan_sample_limit: usize,
}

impl Default for SloCheckOptions {
    fn default() -> Self {
        Self {
            phases: VerifyPhases::ALL,
            fail_fast: false,
            orphan_sample_limit: 8,
        }
    }
}

impl VerifierOptionsLike for SloCheckOptions {
    fn phases(&self) -> VerifyPhases {
        self.phases
    }
    fn fail_fast(&self) -> bool {
        self.fail_fast
    }
}

/// Read-only consistency checker. Never repairs anything.
pub struct SloChecker<'a, IO: BlockIO + ?Sized> {
    io: &'a mut IO,
    sb: Option<SloSuperblock>,
    meta: Option<SloMeta>,
    /// Every live record that could be decoded, by fileno.
    records: Option<BTreeMap<u32, SloRecord>>,
    /// Blocks referenced by records (extents and overflow blocks).
    claimed: Option<Vec<u8>>,
}

impl<'a, IO: BlockIO + ?Sized> SloChecker<'a, IO> {
    pub fn new(io: &'a mut IO) -> Self {
        Self {
            io,
            sb: None,
            meta: None,
            records: None,
            claimed: None,
        }
    }

    fn superblock(&mut self) -> FsCheckerResult<SloSuperblock> {
        if let Some(sb) = self.sb {
            return Ok(sb);
        }
        let sb: SloSuperblock = self.io.read_struct(SLO_SUPERBLOCK_OFFSET)?;
        self.sb = Some(sb);
        Ok(sb)
    }

    /// Geometry of a superblock that passed validation.
    fn meta(&mut self) -> FsCheckerResult<Option<SloMeta>> {
        if self.meta.is_none() {
            let sb = self.superblock()?;
            if sb.validate().is_ok() {
                self.meta = Some(SloMeta::from_superblock(&sb));
            }
        }
        Ok(self.meta.clone())
    }

    fn load_records(
        &mut self,
        meta: &SloMeta,
        rep: &mut VerifyReport,
    ) -> FsCheckerResult<BTreeMap<u32, SloRecord>> {
        if let Some(records) = &self.records {
            return Ok(records.clone());
        }

        let table = SloTable::load(self.io, meta)?;
        let mut records = BTreeMap::new();
        for fileno in table.live_filenos() {
            match table.lookup(self.io, fileno) {
                Ok(rec) => {
                    records.insert(fileno, rec);
                }
                Err(FsTableError::IO(e)) => return Err(e.into()),
                Err(e) => rep.push(Finding::err(
                    "REC.BAD",
                    format!("record {fileno}: {}", e.msg()),
                )),
            }
        }
        self.records = Some(records.clone());
        Ok(records)
    }

    /// Marks every block a record references; reports overlaps and strays.
    fn claim_blocks(
        meta: &SloMeta,
        records: &BTreeMap<u32, SloRecord>,
        rep: &mut VerifyReport,
    ) -> Vec<u8> {
        let mut claimed = vec![0u8; (meta.block_count as usize).div_ceil(8)];
        let in_data = |b: u32| b >= meta.layout.data_start && b < meta.block_count;
        let bs = meta.block_size as u64;

        for rec in records.values() {
            let fileno = rec.fileno;
            let mut shared = false;

            for run in rec.extents.as_slice() {
                let Some(end) = run.start.checked_add(run.len) else {
                    rep.push(Finding::err("CHAIN.RANGE", format!("record {fileno}: extent wraps")));
                    continue;
                };
                if !in_data(run.start) || end > meta.block_count {
                    rep.push(Finding::err(
                        "CHAIN.RANGE",
                        format!("record {fileno}: extent {}+{} outside data region", run.start, run.len),
                    ));
                    continue;
                }
                for b in run.start..end {
                    shared |= claimed.get_bit(b as usize);
                    claimed.set_bit(b as usize, true);
                }
            }

            if rec.extents.len() > SLO_INLINE_EXTENTS {
                if in_data(rec.overflow) {
                    shared |= claimed.get_bit(rec.overflow as usize);
                    claimed.set_bit(rec.overflow as usize, true);
                } else {
                    rep.push(Finding::err(
                        "CHAIN.OVFL",
                        format!("record {fileno}: overflow block {} invalid", rec.overflow),
                    ));
                }
            }

            if shared {
                rep.push(Finding::err(
                    "CHAIN.DUP",
                    format!("record {fileno}: blocks shared with another record"),
                ));
            }

            let capacity = rec.extents.block_count() * bs;
            if rec.length > capacity {
                rep.push(Finding::err(
                    "CHAIN.LEN",
                    format!("record {fileno}: length {} exceeds {capacity} allocated bytes", rec.length),
                ));
            } else if rec.extents.block_count() > rec.length.div_ceil(bs) {
                rep.push(Finding::warn(
                    "CHAIN.SLACK",
                    format!("record {fileno}: blocks allocated past end of content"),
                ));
            }
        }
        claimed
    }
}

/* ========================= FsChecker impl ========================= */

impl<'a, IO: BlockIO + ?Sized> FsChecker for SloChecker<'a, IO> {
    type Options = SloCheckOptions;

    fn check_boot(&mut self, _opt: &Self::Options, rep: &mut VerifyReport) -> FsCheckerResult<()> {
        let sb = self.superblock()?;

        if !sb.has_magic() {
            rep.push(Finding::err("SB.MAGIC", "Superblock: missing SLOF signature"));
            return Ok(());
        }
        let [major, minor, teeny] = sb.s_version;
        if !sb.is_supported_version() {
            rep.push(Finding::err(
                "SB.VER",
                format!("Superblock: unsupported version {major}.{minor}.{teeny}"),
            ));
        }
        let stored = sb.s_checksum;
        if stored != sb.compute_checksum() {
            rep.push(Finding::err("SB.CSUM", "Superblock: checksum mismatch"));
        }
        if !sb.is_clean() {
            rep.push(Finding::info("SB.DIRTY", "Volume is mounted or was not cleanly unmounted"));
        }
        rep.push(Finding::info(
            "SB.OK",
            format!("slofs {major}.{minor}.{teeny} label={:?}", sb.label()),
        ));
        Ok(())
    }

    fn check_geometry(
        &mut self,
        _opt: &Self::Options,
        rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        let sb = self.superblock()?;
        if let Err(reason) = sb.validate_geometry() {
            rep.push(Finding::err("GEO.LAYOUT", reason));
            return Ok(());
        }

        let meta = SloMeta::from_superblock(&sb);
        let mut last = [0u8; 1];
        match self.io.read_at(meta.volume_size_bytes - 1, &mut last) {
            Ok(()) => {}
            Err(BlockIOError::OutOfBounds) => rep.push(Finding::err(
                "GEO.SIZE",
                format!("Store shorter than {} bytes", meta.volume_size_bytes),
            )),
            Err(e) => return Err(e.into()),
        }

        rep.push(Finding::info(
            "GEO.OK",
            format!(
                "bs={} blocks={} records={} data_start={}",
                meta.block_size, meta.block_count, meta.record_count, meta.layout.data_start
            ),
        ));
        Ok(())
    }

    fn check_chain(&mut self, _opt: &Self::Options, rep: &mut VerifyReport) -> FsCheckerResult<()> {
        let Some(meta) = self.meta()? else {
            rep.push(Finding::err("CHAIN.SKIP", "Unusable superblock"));
            return Ok(());
        };
        let records = self.load_records(&meta, rep)?;
        let claimed = Self::claim_blocks(&meta, &records, rep);
        self.claimed = Some(claimed);
        Ok(())
    }

    fn check_root(&mut self, _opt: &Self::Options, rep: &mut VerifyReport) -> FsCheckerResult<()> {
        let Some(meta) = self.meta()? else {
            rep.push(Finding::err("ROOT.SKIP", "Unusable superblock"));
            return Ok(());
        };
        let records = self.load_records(&meta, rep)?;

        match records.get(&SLO_ROOT_FILENO) {
            None => rep.push(Finding::err("ROOT.MISSING", "Root record is not live")),
            Some(root) if !root.is_dir() => {
                rep.push(Finding::err("ROOT.KIND", "Root record is not a directory"))
            }
            Some(root) if root.parent != SLO_ROOT_FILENO => rep.push(Finding::err(
                "ROOT.PARENT",
                format!("Root parent is {}, expected itself", root.parent),
            )),
            Some(_) => rep.push(Finding::info("ROOT.OK", "Root directory present")),
        }
        Ok(())
    }

    fn check_cross_reference(
        &mut self,
        _opt: &Self::Options,
        rep: &mut VerifyReport,
    ) -> FsCheckerResult<()> {
        let Some(meta) = self.meta()? else {
            rep.push(Finding::err("XREF.SKIP", "Unusable superblock"));
            return Ok(());
        };
        let claimed = match self.claimed.clone() {
            Some(c) => c,
            None => {
                let records = self.load_records(&meta, rep)?;
                Self::claim_blocks(&meta, &records, &mut VerifyReport::default())
            }
        };

        let alloc = SloAllocator::load(self.io, &meta)?;
        let (mut leaked, mut unmarked) = (0u32, 0u32);
        for b in meta.layout.data_start..meta.block_count {
            match (alloc.is_allocated(b), claimed.get_bit(b as usize)) {
                (true, false) => leaked += 1,
                (false, true) => unmarked += 1,
                _ => {}
            }
        }
        if unmarked > 0 {
            rep.push(Finding::err(
                "XREF.FREE",
                format!("{unmarked} referenced block(s) marked free in bitmap"),
            ));
        }
        if leaked > 0 {
            rep.push(Finding::warn(
                "XREF.LEAK",
                format!("{leaked} block(s) marked used but referenced by no record"),
            ));
        }

        let sb = self.superblock()?;
        let (sb_free, free) = (sb.s_free_blocks, alloc.free_blocks());
        if sb_free != free {
            rep.push(Finding::warn(
                "XREF.FREECNT",
                format!("Superblock free blocks {sb_free}, bitmap says {free}"),
            ));
        }
        if unmarked == 0 && leaked == 0 {
            rep.push(Finding::info("XREF.OK", format!("{free} free block(s)")));
        }
        Ok(())
    }

    fn check_content(&mut self, opt: &Self::Options, rep: &mut VerifyReport) -> FsCheckerResult<()> {
        let Some(meta) = self.meta()? else {
            rep.push(Finding::err("DIR.SKIP", "Unusable superblock"));
            return Ok(());
        };
        let records = self.load_records(&meta, rep)?;
        let Some(root) = records.get(&SLO_ROOT_FILENO).filter(|r| r.is_dir()) else {
            return Ok(());
        };

        let mut reached = BTreeSet::from([SLO_ROOT_FILENO]);
        let mut queue = VecDeque::from([root.fileno]);

        while let Some(dir_no) = queue.pop_front() {
            let Some(dir) = records.get(&dir_no) else {
                continue;
            };
            let entries = match read_dir_table(self.io, &meta, dir) {
                Ok(entries) => entries,
                Err(FsError::IO(e)) => return Err(e.into()),
                Err(e) => {
                    rep.push(Finding::err(
                        "DIR.DECODE",
                        format!("directory {dir_no}: {}", e.msg()),
                    ));
                    continue;
                }
            };

            for entry in entries.entries() {
                let Some(child) = records.get(&entry.fileno) else {
                    rep.push(Finding::err(
                        "DIR.DANGLING",
                        format!("directory {dir_no}: {:?} names free record {}", entry.name, entry.fileno),
                    ));
                    continue;
                };
                if child.kind != entry.kind {
                    rep.push(Finding::err(
                        "DIR.KIND",
                        format!("directory {dir_no}: {:?} kind differs from its record", entry.name),
                    ));
                }
                if child.parent != dir_no {
                    rep.push(Finding::err(
                        "DIR.PARENT",
                        format!("record {} parent {} but listed in {dir_no}", child.fileno, child.parent),
                    ));
                }
                if !reached.insert(child.fileno) {
                    rep.push(Finding::err(
                        "DIR.MULTI",
                        format!("record {} reachable more than once", child.fileno),
                    ));
                    continue;
                }
                if child.is_dir() {
                    queue.push_back(child.fileno);
                }
            }
        }

        let orphans: Vec<u32> = records
            .keys()
            .copied()
            .filter(|f| !reached.contains(f))
            .collect();
        for fileno in orphans.iter().take(opt.orphan_sample_limit) {
            rep.push(Finding::warn(
                "DIR.ORPHAN",
                format!("record {fileno} not reachable from root"),
            ));
        }
        if orphans.len() > opt.orphan_sample_limit {
            rep.push(Finding::warn(
                "DIR.ORPHAN",
                format!("... and {} more", orphans.len() - opt.orphan_sample_limit),
            ));
        }

        rep.push(Finding::info(
            "DIR.OK",
            format!("{} of {} record(s) reachable", reached.len(), records.len()),
        ));
        Ok(())
    }
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::fs::slofs::{formatter::SloFormatOptions, volume::*};
    use zerocopy::IntoBytes;

    fn image() -> Vec<u8> {
        let mut buf = vec![0u8; 256 * 1024];
        let meta = SloMeta::new_custom(256 * 1024, Some("chk"), None, 512, Some(32));
        mkfs(&mut MemBlockIO::new(&mut buf), &meta, &SloFormatOptions::default()).unwrap();
        {
            let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();
            vol.mkdir("/d").unwrap();
            let fh = vol.open("/d/f", "w").unwrap();
            vol.write(fh, &[3u8; 1500]).unwrap();
            vol.unmount().unwrap();
        }
        buf
    }

    #[test]
    fn test_clean_image_passes() {
        let mut buf = image();
        let rep = SloChecker::new(&mut MemBlockIO::new(&mut buf)).check_all().unwrap();
        assert!(rep.ok(), "{}", rep.errors_only());
        assert!(rep.has_code("DIR.OK"));
        assert!(!rep.has_code("SB.DIRTY"));
    }

    #[test]
    fn test_bad_magic_reported() {
        let mut buf = image();
        buf[0] = b'X';
        let rep = SloChecker::new(&mut MemBlockIO::new(&mut buf)).check_all().unwrap();
        assert!(rep.has_code("SB.MAGIC"));
        assert!(rep.has_code("CHAIN.SKIP"));
    }

    #[test]
    fn test_cleared_bitmap_bit_is_an_error() {
        let mut buf = image();
        let meta = SloMeta::from_io(&mut MemBlockIO::new(&mut buf)).unwrap();
        let bitmap = meta.block_offset(meta.layout.bitmap_start) as usize;
        let first = meta.layout.data_start as usize;
        buf[bitmap + first / 8] &= !(1 << (first % 8));

        let rep = SloChecker::new(&mut MemBlockIO::new(&mut buf)).check_all().unwrap();
        assert!(rep.has_code("XREF.FREE"));
    }

    #[test]
    fn test_orphan_record_is_a_warning() {
        let mut buf = image();
        let meta = SloMeta::from_io(&mut MemBlockIO::new(&mut buf)).unwrap();

        // A live record no directory names.
        let mut io = MemBlockIO::new(&mut buf);
        let rec = SloRecord::new(20, SloNodeKind::File, SLO_ROOT_FILENO, 1, crate::core::now_utc());
        io.write_at(meta.record_offset(20), rec.to_raw().as_bytes()).unwrap();

        let opts = SloCheckOptions {
            phases: VerifyPhases::CONTENT,
            ..SloCheckOptions::default()
        };
        let rep = SloChecker::new(&mut io).check_with(&opts).unwrap();
        assert!(rep.ok());
        assert!(rep.has_code("DIR.ORPHAN"));
    }

    #[test]
    fn test_fail_fast_stops_after_first_failing_phase() {
        let mut buf = image();
        buf[0] = b'X';
        let opts = SloCheckOptions {
            fail_fast: true,
            ..SloCheckOptions::default()
        };
        let rep = SloChecker::new(&mut MemBlockIO::new(&mut buf)).check_with(&opts).unwrap();
        assert!(rep.has_code("SB.MAGIC"));
        assert!(!rep.has_code("GEO.OK"));
        assert!(!rep.has_code("CHAIN.SKIP"));
    }
}
