// SPDX-License-Identifier: MIT

#[cfg(not(feature = "std"))]
use alloc::string::String;

use time::OffsetDateTime;

use crate::fs::slofs::types::{SloNodeKind, SloRecord};

/// Result of `stat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloStat {
    /// Final path component (`/` for the root).
    pub filename: String,
    pub fileno: u32,
    /// Bytes for files, encoded entry table size for directories.
    pub length: u64,
    pub ctime: OffsetDateTime,
    pub mtime: OffsetDateTime,
    pub kind: SloNodeKind,
}

impl SloStat {
    pub fn from_record(filename: String, rec: &SloRecord) -> Self {
        Self {
            filename,
            fileno: rec.fileno,
            length: rec.length,
            ctime: rec.ctime,
            mtime: rec.mtime,
            kind: rec.kind,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == SloNodeKind::Dir
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == SloNodeKind::File
    }
}

/// Volume-wide counters returned by `statfs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SloStatFs {
    pub label: String,
    /// (major, minor, teeny)
    pub version: [u8; 3],
    pub volume_id: [u8; 16],
    pub block_size: u32,
    pub total_blocks: u32,
    /// Free blocks of the data region.
    pub free_blocks: u32,
    pub total_records: u32,
    pub free_records: u32,
    pub mount_count: u32,
}

impl SloStatFs {
    pub fn free_bytes(&self) -> u64 {
        self.free_blocks as u64 * self.block_size as u64
    }
}
