// SPDX-License-Identifier: MIT

//! Mounted volume: lifecycle, path operations and open handles.
//!
//! Every on-disk change is ordered so that the last write publishes it:
//! blocks are marked used in the bitmap before a record points at them,
//! a record is written before a directory entry names it, and blocks are
//! released only once no record references them anymore.

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec::Vec};
use alloc::collections::BTreeMap;

use sloio::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::core::{
    FsAllocatorError, FsError, FsResult, FsTableError,
    checker::{FsChecker, VerifyReport},
    traits::FsAllocator,
    utils::{
        time_utils::{datetime_to_parts, now_utc},
        volume_utils::next_instance_id,
    },
};
use crate::fs::slofs::{
    allocator::SloAllocator,
    attr::{SloStat, SloStatFs},
    checker::{SloCheckOptions, SloChecker},
    constant::*,
    content::{read_content, write_content, zero_content},
    dir::{DirEntry, DirTable, validate_name},
    formatter::{SloFormatOptions, SloFormatter},
    handle::*,
    meta::SloMeta,
    resolver::SloResolver,
    table::SloTable,
    types::*,
};

/// Formats `io` as an empty volume holding only the root directory.
pub fn mkfs<IO: BlockIO + ?Sized>(
    io: &mut IO,
    meta: &SloMeta,
    opts: &SloFormatOptions,
) -> FsResult {
    SloFormatter::new(io, meta).format_with(opts)?;
    Ok(())
}

/// A mounted slofs volume.
///
/// Owns its backing store (pass `&mut store` to get it back after
/// unmount) and every handle opened through it. Dropping a mounted volume
/// unmounts it.
pub struct SloVolume<IO: BlockIO> {
    io: IO,
    meta: SloMeta,
    sb: SloSuperblock,
    alloc: SloAllocator,
    table: SloTable,
    cwd: u32,
    clean_at_mount: bool,
    files: BTreeMap<u32, FileState>,
    dirs: BTreeMap<u32, DirState>,
    next_handle: u32,
    instance: u32,
    mounted: bool,
}

impl<IO: BlockIO> SloVolume<IO> {
    /* ------------------------------ lifecycle ------------------------------ */

    /// Mounts a formatted store.
    ///
    /// A volume that was not cleanly unmounted still mounts; see
    /// [`is_clean`](Self::is_clean). The clean flag is cleared on disk
    /// before this returns.
    pub fn mount(mut io: IO) -> FsResult<Self> {
        let sb: SloSuperblock = io.read_struct(SLO_SUPERBLOCK_OFFSET)?;
        if let Err(reason) = sb.validate() {
            warn!(reason, "mount rejected");
            return Err(FsError::BadMagicOrVersion);
        }

        let meta = SloMeta::from_superblock(&sb);
        let alloc = SloAllocator::load(&mut io, &meta)?;
        let table = SloTable::load(&mut io, &meta)?;
        let root = table.lookup(&mut io, SLO_ROOT_FILENO)?;
        crate::ensure!(root.is_dir(), FsError::Table(FsTableError::Corrupted));

        let mut vol = Self {
            io,
            meta,
            sb,
            alloc,
            table,
            cwd: SLO_ROOT_FILENO,
            clean_at_mount: sb.is_clean(),
            files: BTreeMap::new(),
            dirs: BTreeMap::new(),
            next_handle: 1,
            instance: next_instance_id(),
            mounted: false,
        };

        if !vol.clean_at_mount {
            warn!(label = %vol.sb.label(), "volume was not cleanly unmounted");
        }

        let (now, _) = datetime_to_parts(now_utc());
        vol.sb.s_clean = 0;
        vol.sb.s_mount_count = vol.sb.s_mount_count.wrapping_add(1);
        vol.sb.s_mount_time = now;
        vol.write_superblock()?;
        vol.io.flush()?;
        vol.mounted = true;

        let mount_count = vol.sb.s_mount_count;
        info!(
            label = %vol.sb.label(),
            mount_count,
            free_blocks = vol.alloc.free_blocks(),
            free_records = vol.table.free_records(),
            clean = vol.clean_at_mount,
            "slofs volume mounted"
        );
        Ok(vol)
    }

    /// Clean flag as found on disk at mount time.
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.clean_at_mount
    }

    /// Flushes everything, marks the volume clean and releases it.
    ///
    /// Handles issued by this volume are rejected by any later volume.
    pub fn unmount(mut self) -> FsResult {
        self.mounted = false;
        self.shutdown()
    }

    fn shutdown(&mut self) -> FsResult {
        self.files.clear();
        self.dirs.clear();
        self.alloc.commit(&mut self.io)?;
        self.sb.s_clean = 1;
        self.write_superblock()?;
        self.io.flush()?;
        info!(label = %self.sb.label(), "slofs volume unmounted");
        Ok(())
    }

    /// Persists the bitmap and superblock counters; the volume stays dirty.
    pub fn sync(&mut self) -> FsResult {
        self.alloc.commit(&mut self.io)?;
        self.write_superblock()?;
        self.io.flush()?;
        trace!("volume synced");
        Ok(())
    }

    fn write_superblock(&mut self) -> FsResult {
        let (now, _) = datetime_to_parts(now_utc());
        self.sb.s_free_blocks = self.alloc.free_blocks();
        self.sb.s_free_records = self.table.free_records();
        self.sb.s_write_time = now;
        self.sb.seal();
        self.io.write_struct(SLO_SUPERBLOCK_OFFSET, &self.sb)?;
        Ok(())
    }

    pub fn statfs(&self) -> SloStatFs {
        SloStatFs {
            label: self.sb.label(),
            version: self.sb.s_version,
            volume_id: self.sb.s_uuid,
            block_size: self.meta.block_size,
            total_blocks: self.meta.block_count,
            free_blocks: self.alloc.free_blocks(),
            total_records: self.table.record_count(),
            free_records: self.table.free_records(),
            mount_count: self.sb.s_mount_count,
        }
    }

    /// Syncs, then runs the read-only consistency checker over the store.
    pub fn check(&mut self, opts: &SloCheckOptions) -> FsResult<VerifyReport> {
        self.sync()?;
        let report = SloChecker::new(&mut self.io).check_with(opts)?;
        Ok(report)
    }

    /* -------------------------------- paths -------------------------------- */

    #[inline]
    fn resolver(&mut self) -> SloResolver<'_, IO> {
        SloResolver::new(&mut self.io, &self.meta, &self.table)
    }

    fn read_dir(&mut self, dir: &DirRecord) -> FsResult<DirTable> {
        self.resolver().read_dir(dir)
    }

    pub fn getcwd(&mut self) -> FsResult<String> {
        let cwd = self.cwd;
        self.resolver().path_of(cwd)
    }

    /// Changes the working directory; on failure it is left unchanged.
    pub fn setcwd(&mut self, path: &str) -> FsResult {
        let cwd = self.cwd;
        let dir = self.resolver().resolve(cwd, path)?.into_dir()?;
        self.cwd = dir.fileno();
        Ok(())
    }

    pub fn exists(&mut self, path: &str) -> FsResult<bool> {
        let cwd = self.cwd;
        match self.resolver().resolve(cwd, path) {
            Ok(_) => Ok(true),
            Err(FsError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn stat(&mut self, path: &str) -> FsResult<SloStat> {
        let cwd = self.cwd;
        let mut resolver = self.resolver();
        let rec = resolver.resolve(cwd, path)?;
        let name = resolver.name_of(&rec)?;
        Ok(SloStat::from_record(name, &rec))
    }

    /// Creates an empty directory.
    pub fn mkdir(&mut self, path: &str) -> FsResult {
        self.create_node(path, SloNodeKind::Dir)?;
        Ok(())
    }

    /// Creates a record and publishes it under `path`.
    fn create_node(&mut self, path: &str, kind: SloNodeKind) -> FsResult<SloRecord> {
        let cwd = self.cwd;
        let (mut parent, name) = self.resolver().resolve_parent(cwd, path)?;
        validate_name(name).map_err(|_| FsError::InvalidPath)?;

        let mut entries = self.read_dir(&parent)?;
        crate::ensure!(
            entries.find(name).is_none(),
            crate::core::FsDirError::DuplicateName
        );

        let rec = self
            .table
            .create(&mut self.io, kind, Some(parent.fileno()), now_utc())?;
        entries.insert(DirEntry::new(name, rec.fileno, kind))?;

        if let Err(e) = self.write_dir(&mut parent, &entries) {
            // Nothing names the record yet.
            if let Err(undo) = self.table.delete(&mut self.io, &mut self.alloc, &rec) {
                warn!(fileno = rec.fileno, error = %FsError::from(undo), "cannot drop unpublished record");
            }
            return Err(e);
        }

        debug!(path, fileno = rec.fileno, ?kind, "node created");
        Ok(rec)
    }

    /// Removes a file or an empty directory.
    pub fn unlink(&mut self, path: &str) -> FsResult {
        let cwd = self.cwd;
        let (mut parent, name) = self.resolver().resolve_parent(cwd, path)?;
        crate::ensure!(name != "." && name != "..", FsError::InvalidPath);

        let mut entries = self.read_dir(&parent)?;
        let entry = entries.find(name).cloned().ok_or(FsError::NotFound)?;
        let rec = self.table.lookup(&mut self.io, entry.fileno)?;

        if rec.is_dir() {
            let dir = rec.clone().into_dir()?;
            crate::ensure!(self.read_dir(&dir)?.is_empty(), FsError::IsADirectory);
        }

        entries.remove(name);
        self.write_dir(&mut parent, &entries)?;
        self.table.delete(&mut self.io, &mut self.alloc, &rec)?;

        if self.cwd == rec.fileno {
            self.cwd = SLO_ROOT_FILENO;
        }
        debug!(path, fileno = rec.fileno, "node unlinked");
        Ok(())
    }

    /// Moves or renames an entry; the record itself keeps its fileno.
    ///
    /// An existing target of the same kind is replaced (directories only
    /// when empty).
    pub fn rename(&mut self, old: &str, new: &str) -> FsResult {
        let cwd = self.cwd;
        let (mut src_parent, src_name) = self.resolver().resolve_parent(cwd, old)?;
        crate::ensure!(src_name != "." && src_name != "..", FsError::InvalidPath);
        let (mut dst_parent, dst_name) = self.resolver().resolve_parent(cwd, new)?;
        validate_name(dst_name).map_err(|_| FsError::InvalidPath)?;

        let mut src_entries = self.read_dir(&src_parent)?;
        let entry = src_entries.find(src_name).cloned().ok_or(FsError::NotFound)?;
        let mut moving = self.table.lookup(&mut self.io, entry.fileno)?;

        let same_dir = src_parent.fileno() == dst_parent.fileno();
        if same_dir && src_name == dst_name {
            return Ok(());
        }
        if moving.is_dir() && !same_dir {
            let target_dir = dst_parent.fileno();
            crate::ensure!(
                !self.resolver().is_within(moving.fileno, target_dir)?,
                FsError::InvalidPath
            );
        }

        let mut dst_entries = if same_dir {
            src_entries.clone()
        } else {
            self.read_dir(&dst_parent)?
        };

        let replaced = match dst_entries.find(dst_name).cloned() {
            Some(existing) => {
                let target = self.table.lookup(&mut self.io, existing.fileno)?;
                crate::ensure!(target.kind == moving.kind, FsError::TypeMismatch);
                if target.is_dir() {
                    let dir = target.clone().into_dir()?;
                    crate::ensure!(self.read_dir(&dir)?.is_empty(), FsError::TypeMismatch);
                }
                Some(target)
            }
            None => None,
        };

        if same_dir {
            if replaced.is_some() {
                src_entries.remove(dst_name);
            }
            src_entries.rename(src_name, dst_name)?;
            self.write_dir(&mut src_parent, &src_entries)?;
        } else {
            if replaced.is_some() {
                dst_entries.remove(dst_name);
            }
            dst_entries.insert(DirEntry::new(dst_name, entry.fileno, entry.kind))?;
            self.write_dir(&mut dst_parent, &dst_entries)?;

            src_entries.remove(src_name);
            self.write_dir(&mut src_parent, &src_entries)?;

            if moving.parent != dst_parent.fileno() {
                moving.parent = dst_parent.fileno();
                self.table.store(&mut self.io, &mut self.alloc, &mut moving)?;
            }
        }

        if let Some(target) = replaced {
            self.table.delete(&mut self.io, &mut self.alloc, &target)?;
            if self.cwd == target.fileno {
                self.cwd = SLO_ROOT_FILENO;
            }
        }

        debug!(old, new, fileno = entry.fileno, "node renamed");
        Ok(())
    }

    /* ------------------------------ content IO ----------------------------- */

    fn write_dir(&mut self, dir: &mut DirRecord, entries: &DirTable) -> FsResult {
        let bytes = entries.encode();
        self.write_record(dir.record_mut(), 0, &bytes, true)?;
        trace!(fileno = dir.fileno(), entries = entries.len(), "directory written");
        Ok(())
    }

    /// Writes `data` at `pos` of `rec`.
    ///
    /// With `replace` the content ends right after `data`; otherwise the
    /// length only grows. All space is reserved up front, so on failure the
    /// record, its content and the free map are as before.
    fn write_record(
        &mut self,
        rec: &mut SloRecord,
        pos: u64,
        data: &[u8],
        replace: bool,
    ) -> FsResult {
        let bs = self.meta.block_size as u64;
        let end = pos
            .checked_add(data.len() as u64)
            .ok_or(FsError::InvalidSeek)?;
        let new_len = if replace { end } else { rec.length.max(end) };

        let mut next = rec.clone();
        let before = next.extents.block_count();
        let grown = new_len.div_ceil(bs).saturating_sub(before);
        if grown > 0 {
            self.alloc
                .grow(&mut next.extents, grown, self.meta.max_extents())?;
        }

        let staged = self
            .reserve_overflow(&mut next)
            .and_then(|()| self.publish(&mut next, pos, data, new_len));
        match staged {
            Ok(tail) => {
                if !tail.is_empty() {
                    self.alloc.release(&tail)?;
                    self.alloc.commit(&mut self.io)?;
                }
                *rec = next;
                Ok(())
            }
            Err(e) => {
                let mut undo = SloExtents::new();
                if grown > 0 {
                    undo = next.extents.split_off_blocks(before);
                }
                if next.overflow != 0 && next.overflow != rec.overflow {
                    undo.push_run(next.overflow, 1);
                }
                if !undo.is_empty() {
                    let rolled = self.alloc.release(&undo).map_err(FsError::from);
                    let rolled = rolled
                        .and_then(|()| self.alloc.commit(&mut self.io).map_err(FsError::from));
                    if let Err(undo_err) = rolled {
                        warn!(fileno = rec.fileno, error = %undo_err, "cannot roll back allocation");
                    }
                }
                Err(e)
            }
        }
    }

    /// Claims the overflow block up front when the runs spill past the
    /// inline array; storing the record then allocates nothing.
    fn reserve_overflow(&mut self, next: &mut SloRecord) -> FsResult {
        if next.extents.len() > SLO_INLINE_EXTENTS && next.overflow == 0 {
            let unit = self.alloc.allocate_unit()?;
            next.overflow = unit
                .as_slice()
                .first()
                .map(|run| run.start)
                .ok_or(FsAllocatorError::OutOfSpace)?;
        }
        Ok(())
    }

    /// Bitmap, gap, data, then the record. Returns blocks cut off the end.
    fn publish(
        &mut self,
        next: &mut SloRecord,
        pos: u64,
        data: &[u8],
        new_len: u64,
    ) -> FsResult<SloExtents> {
        let bs = self.meta.block_size;
        self.alloc.commit(&mut self.io)?;

        if pos > next.length {
            zero_content(&mut self.io, &next.extents, bs, next.length, pos - next.length)?;
        }
        write_content(&mut self.io, &next.extents, bs, pos, data)?;

        next.length = new_len;
        let keep = new_len.div_ceil(bs as u64);
        let tail = if next.extents.block_count() > keep {
            next.extents.split_off_blocks(keep)
        } else {
            SloExtents::new()
        };

        next.touch(now_utc());
        self.table.store(&mut self.io, &mut self.alloc, next)?;
        Ok(tail)
    }

    /* -------------------------------- files -------------------------------- */

    /// Opens a file; `mode` is one of `r`, `r+`, `w`, `w+`, `a`, `a+`.
    pub fn open(&mut self, path: &str, mode: &str) -> FsResult<SloFile> {
        let flags = OpenFlags::parse(mode)?;
        let cwd = self.cwd;

        let resolved = self.resolver().resolve(cwd, path);
        let mut rec = match resolved {
            Ok(rec) => rec,
            Err(FsError::NotFound) if flags.contains(OpenFlags::CREATE) => {
                self.create_node(path, SloNodeKind::File)?
            }
            Err(e) => return Err(e),
        };
        crate::ensure!(!rec.is_dir(), FsError::IsADirectory);

        if flags.contains(OpenFlags::TRUNCATE) && (rec.length > 0 || !rec.extents.is_empty()) {
            self.write_record(&mut rec, 0, &[], true)?;
        }

        let pos = if flags.contains(OpenFlags::APPEND) {
            rec.length
        } else {
            0
        };
        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.files.insert(
            id,
            FileState {
                fileno: rec.fileno,
                generation: rec.generation,
                flags,
                length: rec.length,
                pos,
            },
        );

        trace!(path, fileno = rec.fileno, mode, handle = id, "file opened");
        Ok(SloFile {
            volume: self.instance,
            id,
        })
    }

    /// Record behind `fileno` if it is still the one a handle was opened on.
    fn live_record(&mut self, fileno: u32, generation: u32) -> FsResult<SloRecord> {
        crate::ensure!(self.table.is_live(fileno), FsError::InvalidHandle);
        let rec = self.table.lookup(&mut self.io, fileno)?;
        crate::ensure!(rec.generation == generation, FsError::InvalidHandle);
        Ok(rec)
    }

    fn file(&mut self, h: SloFile) -> FsResult<(FileState, SloRecord)> {
        crate::ensure!(h.volume == self.instance, FsError::InvalidHandle);
        let state = self.files.get(&h.id).cloned().ok_or(FsError::InvalidHandle)?;
        let rec = self.live_record(state.fileno, state.generation)?;
        Ok((state, rec))
    }

    fn set_cursor(&mut self, h: SloFile, pos: u64, length: u64) {
        if let Some(state) = self.files.get_mut(&h.id) {
            state.pos = pos;
            state.length = length;
        }
    }

    /// Reads up to `buf.len()` bytes at the cursor; 0 at or past end of file.
    pub fn read(&mut self, h: SloFile, buf: &mut [u8]) -> FsResult<usize> {
        let (state, rec) = self.file(h)?;
        crate::ensure!(state.flags.contains(OpenFlags::READ), FsError::BadMode);

        let available = rec.length.saturating_sub(state.pos);
        let n = available.min(buf.len() as u64) as usize;
        if n > 0 {
            read_content(
                &mut self.io,
                &rec.extents,
                self.meta.block_size,
                state.pos,
                &mut buf[..n],
            )?;
        }

        self.set_cursor(h, state.pos + n as u64, rec.length);
        Ok(n)
    }

    /// Reads up to `max` bytes into a new buffer.
    pub fn read_vec(&mut self, h: SloFile, max: usize) -> FsResult<Vec<u8>> {
        let (state, rec) = self.file(h)?;
        let available = rec.length.saturating_sub(state.pos);
        let mut buf = vec![0u8; available.min(max as u64) as usize];
        let n = self.read(h, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes `data` at the cursor (at end of file in append mode).
    ///
    /// Either every byte lands or nothing changes.
    pub fn write(&mut self, h: SloFile, data: &[u8]) -> FsResult<usize> {
        let (state, mut rec) = self.file(h)?;
        crate::ensure!(state.flags.contains(OpenFlags::WRITE), FsError::BadMode);
        if data.is_empty() {
            return Ok(0);
        }

        let pos = if state.flags.contains(OpenFlags::APPEND) {
            rec.length
        } else {
            state.pos
        };
        self.write_record(&mut rec, pos, data, false)?;

        self.set_cursor(h, pos + data.len() as u64, rec.length);
        trace!(fileno = rec.fileno, pos, len = data.len(), length = rec.length, "file written");
        Ok(data.len())
    }

    /// Moves the cursor; positions past end of file are allowed.
    pub fn seek(&mut self, h: SloFile, whence: SeekWhence, loc: i64) -> FsResult<u64> {
        let (state, rec) = self.file(h)?;
        let pos = whence.apply(state.pos, loc)?;
        self.set_cursor(h, pos, rec.length);
        Ok(pos)
    }

    pub fn tell(&mut self, h: SloFile) -> FsResult<u64> {
        let (state, _) = self.file(h)?;
        Ok(state.pos)
    }

    pub fn close(&mut self, h: SloFile) -> FsResult {
        crate::ensure!(h.volume == self.instance, FsError::InvalidHandle);
        self.files.remove(&h.id).ok_or(FsError::InvalidHandle)?;
        trace!(handle = h.id, "file closed");
        Ok(())
    }

    /* ----------------------------- directories ----------------------------- */

    /// Opens a directory stream over a snapshot of its entry names.
    pub fn opendir(&mut self, path: &str) -> FsResult<SloDir> {
        let cwd = self.cwd;
        let dir = self.resolver().resolve(cwd, path)?.into_dir()?;
        let names = self.read_dir(&dir)?.names();

        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.dirs.insert(
            id,
            DirState {
                fileno: dir.fileno(),
                generation: dir.generation,
                names,
                pos: 0,
            },
        );
        Ok(SloDir {
            volume: self.instance,
            id,
        })
    }

    fn dir_state(&mut self, h: SloDir) -> FsResult<&mut DirState> {
        crate::ensure!(h.volume == self.instance, FsError::InvalidHandle);
        let (fileno, generation) = self
            .dirs
            .get(&h.id)
            .map(|s| (s.fileno, s.generation))
            .ok_or(FsError::InvalidHandle)?;
        self.live_record(fileno, generation)?;
        self.dirs.get_mut(&h.id).ok_or(FsError::InvalidHandle)
    }

    /// Next entry name, or `None` at the end of the stream.
    pub fn readdir(&mut self, h: SloDir) -> FsResult<Option<String>> {
        let state = self.dir_state(h)?;
        let name = state.names.get(state.pos).cloned();
        if name.is_some() {
            state.pos += 1;
        }
        Ok(name)
    }

    /// Sets the stream position to the `loc`-th entry.
    pub fn seekdir(&mut self, h: SloDir, loc: usize) -> FsResult {
        self.dir_state(h)?.pos = loc;
        Ok(())
    }

    /// Restarts the stream, picking up entries changed since it was opened.
    pub fn rewinddir(&mut self, h: SloDir) -> FsResult {
        let fileno = self.dir_state(h)?.fileno;
        let dir = self.table.lookup(&mut self.io, fileno)?.into_dir()?;
        let names = self.read_dir(&dir)?.names();

        let state = self.dir_state(h)?;
        state.names = names;
        state.pos = 0;
        Ok(())
    }

    pub fn telldir(&mut self, h: SloDir) -> FsResult<usize> {
        Ok(self.dir_state(h)?.pos)
    }

    pub fn closedir(&mut self, h: SloDir) -> FsResult {
        crate::ensure!(h.volume == self.instance, FsError::InvalidHandle);
        self.dirs.remove(&h.id).ok_or(FsError::InvalidHandle)?;
        Ok(())
    }
}

impl<IO: BlockIO> Drop for SloVolume<IO> {
    fn drop(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "implicit unmount failed");
        }
    }
}

#[cfg(all(test, feature = "mem"))]
mod tests {
    use super::*;
    use crate::core::FsErrorKind;

    const SIZE: usize = 512 * 1024;

    fn fresh(buf: &mut [u8]) {
        let meta = SloMeta::new_custom(buf.len() as u64, Some("unit"), None, 512, Some(64));
        let mut io = MemBlockIO::new(buf);
        mkfs(&mut io, &meta, &SloFormatOptions::default()).unwrap();
    }

    #[test]
    fn test_write_past_end_zero_fills_gap() {
        let mut buf = vec![0xAAu8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        let fh = vol.open("/gap", "w+").unwrap();
        vol.seek(fh, SeekWhence::Absolute, 1000).unwrap();
        vol.write(fh, b"tail").unwrap();
        assert_eq!(vol.tell(fh).unwrap(), 1004);

        vol.seek(fh, SeekWhence::Absolute, 0).unwrap();
        let data = vol.read_vec(fh, 2000).unwrap();
        assert_eq!(data.len(), 1004);
        assert!(data[..1000].iter().all(|&b| b == 0));
        assert_eq!(&data[1000..], b"tail");
    }

    #[test]
    fn test_truncate_releases_blocks() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();
        let fh = vol.open("/big", "w").unwrap();
        let free = vol.statfs().free_blocks;
        vol.write(fh, &[7u8; 5000]).unwrap();
        vol.close(fh).unwrap();
        assert_eq!(vol.statfs().free_blocks, free - 10);

        let fh = vol.open("/big", "w").unwrap();
        vol.close(fh).unwrap();
        assert_eq!(vol.stat("/big").unwrap().length, 0);
        assert_eq!(vol.statfs().free_blocks, free);
    }

    #[test]
    fn test_out_of_space_leaves_file_unchanged() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        let fh = vol.open("/f", "w+").unwrap();
        vol.write(fh, b"keep").unwrap();
        let free = vol.statfs().free_blocks;

        let huge = vec![1u8; SIZE];
        let err = vol.write(fh, &huge).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::OutOfSpace);
        assert_eq!(vol.statfs().free_blocks, free);
        assert_eq!(vol.stat("/f").unwrap().length, 4);

        vol.seek(fh, SeekWhence::Absolute, 0).unwrap();
        assert_eq!(vol.read_vec(fh, 16).unwrap(), b"keep");
    }

    #[test]
    fn test_failed_spilling_write_keeps_old_content() {
        let mut buf = vec![0u8; 128 * 1024];
        let meta = SloMeta::new_custom(128 * 1024, None, None, 512, Some(128));
        mkfs(&mut MemBlockIO::new(&mut buf), &meta, &SloFormatOptions::default()).unwrap();
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        for i in 0..90 {
            let fh = vol.open(&format!("/f{i:02}"), "w").unwrap();
            vol.write(fh, &[i as u8]).unwrap();
            vol.close(fh).unwrap();
        }
        for i in (0..90).step_by(2) {
            vol.unlink(&format!("/f{i:02}")).unwrap();
        }

        let fh = vol.open("/big", "w+").unwrap();
        vol.write(fh, &[b'A'; 4 * 512]).unwrap();
        let free = vol.statfs().free_blocks;

        // Exactly the free blocks for data, scattered over the holes, and
        // none left for the spilled run list.
        let wanted = (4 + free as usize) * 512;
        vol.seek(fh, SeekWhence::Absolute, 0).unwrap();
        let err = vol.write(fh, &vec![b'B'; wanted]).unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::OutOfSpace);

        assert_eq!(vol.statfs().free_blocks, free);
        assert_eq!(vol.stat("/big").unwrap().length, 4 * 512);
        vol.seek(fh, SeekWhence::Absolute, 0).unwrap();
        let back = vol.read_vec(fh, wanted).unwrap();
        assert_eq!(back.len(), 4 * 512);
        assert!(back.iter().all(|&b| b == b'A'));

        // One block short of that fits, overflow block included.
        vol.seek(fh, SeekWhence::Absolute, 0).unwrap();
        vol.write(fh, &vec![b'C'; wanted - 512]).unwrap();
        assert_eq!(vol.statfs().free_blocks, 0);
        let report = vol.check(&SloCheckOptions::default()).unwrap();
        assert!(report.ok(), "{}", report.errors_only());
    }

    #[test]
    fn test_read_only_handle_rejects_writes() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        let created = vol.open("/ro", "w").unwrap();
        vol.close(created).unwrap();
        let fh = vol.open("/ro", "r").unwrap();
        assert_eq!(vol.write(fh, b"x"), Err(FsError::BadMode));

        let wo = vol.open("/ro", "a").unwrap();
        let mut scratch = [0u8; 4];
        assert_eq!(vol.read(wo, &mut scratch), Err(FsError::BadMode));
    }

    #[test]
    fn test_append_always_lands_at_end() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        let w = vol.open("/log", "w").unwrap();
        vol.write(w, b"one ").unwrap();
        let a = vol.open("/log", "a+").unwrap();
        assert_eq!(vol.tell(a).unwrap(), 4);

        vol.write(w, b"two ").unwrap();
        vol.seek(a, SeekWhence::Absolute, 0).unwrap();
        vol.write(a, b"three").unwrap();

        vol.seek(a, SeekWhence::Absolute, 0).unwrap();
        assert_eq!(vol.read_vec(a, 64).unwrap(), b"one two three");
    }

    #[test]
    fn test_handles_of_unlinked_file_are_invalid() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        let fh = vol.open("/gone", "w").unwrap();
        vol.unlink("/gone").unwrap();
        assert_eq!(vol.write(fh, b"x"), Err(FsError::InvalidHandle));

        // Slot reuse must not revive the old handle.
        let again = vol.open("/again", "w").unwrap();
        assert_eq!(vol.tell(fh), Err(FsError::InvalidHandle));
        assert_eq!(vol.tell(again), Ok(0));
        vol.close(fh).unwrap();
        assert_eq!(vol.close(fh), Err(FsError::InvalidHandle));
    }

    #[test]
    fn test_rename_directory_updates_parent_link() {
        let mut buf = vec![0u8; SIZE];
        fresh(&mut buf);
        let mut vol = SloVolume::mount(MemBlockIO::new(&mut buf)).unwrap();

        vol.mkdir("/a").unwrap();
        vol.mkdir("/b").unwrap();
        vol.mkdir("/a/inner").unwrap();
        vol.rename("/a/inner", "/b/moved").unwrap();

        vol.setcwd("/b/moved").unwrap();
        assert_eq!(vol.getcwd().unwrap(), "/b/moved");
        vol.setcwd("..").unwrap();
        assert_eq!(vol.getcwd().unwrap(), "/b");

        assert_eq!(vol.rename("/b", "/b/moved/x"), Err(FsError::InvalidPath));
    }
}
