// SPDX-License-Identifier: MIT

//! Path resolution.
//!
//! `.` and `..` are never stored: `.` stays on the current directory and
//! `..` follows the record's parent link (the root is its own parent).

#[cfg(not(feature = "std"))]
use alloc::{string::String, vec, vec::Vec};

use sloio::BlockIO;

use crate::core::{FsDirError, FsError, FsResult, FsTableError, utils::path_utils::*};
use crate::fs::slofs::{
    constant::*, content::read_content, dir::DirTable, meta::SloMeta, table::SloTable, types::*,
};

/// Decodes the entry table of a directory record.
pub fn read_dir_table<IO: BlockIO + ?Sized>(
    io: &mut IO,
    meta: &SloMeta,
    dir: &SloRecord,
) -> FsResult<DirTable> {
    let capacity = dir.extents.block_count() * meta.block_size as u64;
    crate::ensure!(dir.length <= capacity, FsDirError::Corrupted);
    let len = usize::try_from(dir.length).map_err(|_| FsDirError::Corrupted)?;

    let mut bytes = vec![0u8; len];
    read_content(io, &dir.extents, meta.block_size, 0, &mut bytes)?;
    Ok(DirTable::decode(&bytes)?)
}

pub struct SloResolver<'a, IO: BlockIO + ?Sized> {
    io: &'a mut IO,
    meta: &'a SloMeta,
    table: &'a SloTable,
}

impl<'a, IO: BlockIO + ?Sized> SloResolver<'a, IO> {
    pub fn new(io: &'a mut IO, meta: &'a SloMeta, table: &'a SloTable) -> Self {
        Self { io, meta, table }
    }

    #[inline]
    pub fn record(&mut self, fileno: u32) -> FsResult<SloRecord> {
        Ok(self.table.lookup(self.io, fileno)?)
    }

    pub fn read_dir(&mut self, dir: &DirRecord) -> FsResult<DirTable> {
        read_dir_table(self.io, self.meta, dir)
    }

    /// Resolves `path` from the root (absolute) or from `cwd` (relative).
    ///
    /// The final component may be of either kind; every component before it
    /// must be a directory.
    pub fn resolve(&mut self, cwd: u32, path: &str) -> FsResult<SloRecord> {
        crate::ensure!(!path.is_empty(), FsError::InvalidPath);

        let start = if is_absolute(path) { SLO_ROOT_FILENO } else { cwd };
        let mut cur = self.record(start)?;

        for comp in split_path(path) {
            let dir = cur.into_dir()?;
            cur = match comp {
                "." => dir.into_inner(),
                ".." => {
                    let parent = dir.parent;
                    self.record(parent)?
                }
                name => {
                    let entries = self.read_dir(&dir)?;
                    let entry = entries.find(name).ok_or(FsError::NotFound)?;
                    self.record(entry.fileno)?
                }
            };
        }
        Ok(cur)
    }

    /// Resolves everything but the final component, which is returned as is.
    pub fn resolve_parent<'p>(
        &mut self,
        cwd: u32,
        path: &'p str,
    ) -> FsResult<(DirRecord, &'p str)> {
        let (parent, name) = split_parent(path).ok_or(FsError::InvalidPath)?;
        let dir = if parent.is_empty() {
            self.record(cwd)?
        } else {
            self.resolve(cwd, parent)?
        };
        Ok((dir.into_dir()?, name))
    }

    /// Name of `rec` inside its parent directory.
    pub fn name_of(&mut self, rec: &SloRecord) -> FsResult<String> {
        if rec.fileno == SLO_ROOT_FILENO {
            return Ok(String::from("/"));
        }
        let parent = self.record(rec.parent)?.into_dir()?;
        let entries = self.read_dir(&parent)?;
        entries
            .find_fileno(rec.fileno)
            .map(|e| e.name.clone())
            .ok_or(FsError::Table(FsTableError::Corrupted))
    }

    /// Absolute path of `fileno`, rebuilt from parent links.
    pub fn path_of(&mut self, fileno: u32) -> FsResult<String> {
        let mut parts = Vec::new();
        let mut cur = self.record(fileno)?;

        while cur.fileno != SLO_ROOT_FILENO {
            // A parent cycle would never reach the root.
            crate::ensure!(
                parts.len() < self.table.record_count() as usize,
                FsError::Table(FsTableError::Corrupted)
            );
            parts.push(self.name_of(&cur)?);
            cur = self.record(cur.parent)?;
        }

        Ok(parts
            .iter()
            .rev()
            .fold(String::from("/"), |acc, part| join_paths(&acc, part)))
    }

    /// `true` if `fileno` is `ancestor` or lies below it.
    pub fn is_within(&mut self, ancestor: u32, fileno: u32) -> FsResult<bool> {
        let mut cur = fileno;
        for _ in 0..=self.table.record_count() {
            if cur == ancestor {
                return Ok(true);
            }
            if cur == SLO_ROOT_FILENO {
                return Ok(false);
            }
            cur = self.record(cur)?.parent;
        }
        Err(FsError::Table(FsTableError::Corrupted))
    }
}
